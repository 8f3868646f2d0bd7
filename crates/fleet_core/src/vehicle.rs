use serde::{Deserialize, Serialize};

use crate::define_id_newtype;

define_id_newtype!(VehicleId);
define_id_newtype!(VehicleClass);
define_id_newtype!(LocationId);
define_id_newtype!(EdgeId);
define_id_newtype!(RouteId);

impl RouteId {
    /// Stable route identifier of a vehicle, reused across respawns.
    pub fn for_vehicle(vehicle_id: &VehicleId) -> Self {
        RouteId(format!("route_{vehicle_id}"))
    }
}

/// RGBA display color, serialized as `[r, g, b, a]`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(from = "[u8; 4]", into = "[u8; 4]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLUE
    }
}

impl From<[u8; 4]> for Color {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Color { r, g, b, a }
    }
}

impl From<Color> for [u8; 4] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b, color.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_id_for_vehicle() {
        let vehicle_id = VehicleId::new("veh_3");
        assert_eq!(RouteId::for_vehicle(&vehicle_id).as_str(), "route_veh_3");
    }

    #[test]
    fn test_color_serde() {
        let color: Color = serde_json::from_str("[255, 0, 0, 128]").unwrap();
        assert_eq!(color, Color::rgba(255, 0, 0, 128));
        assert_eq!(serde_json::to_string(&Color::BLUE).unwrap(), "[0,0,255,255]");
    }
}
