use serde::{Deserialize, Serialize};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Geographic anchor of the network's metric coordinates.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeoOrigin {
    pub lat: f64,
    pub lon: f64,
}

impl GeoOrigin {
    /// Equirectangular projection of `(x, y)` metres east/north of the origin.
    /// Returns a `(lon, lat)` point.
    pub fn to_geo(&self, x: f64, y: f64) -> geo::Point {
        let lat = self.lat + (y / EARTH_RADIUS_METERS).to_degrees();
        let lon = self.lon + (x / (EARTH_RADIUS_METERS * self.lat.to_radians().cos())).to_degrees();

        geo::Point::new(lon, lat)
    }
}

/// Heading of the vector `(dx, dy)` in degrees, clockwise from north, in
/// `[0, 360)`.
pub fn heading(dx: f64, dy: f64) -> f64 {
    let degrees = dx.atan2(dy).to_degrees();
    if degrees < 0.0 { degrees + 360.0 } else { degrees }
}

#[cfg(test)]
mod tests {
    use geo::{Distance, Haversine};

    use super::*;

    const MEDELLIN: GeoOrigin = GeoOrigin {
        lat: 6.2442,
        lon: -75.5812,
    };

    #[test]
    fn test_origin_maps_to_itself() {
        let point = MEDELLIN.to_geo(0.0, 0.0);

        assert_eq!(point.x(), MEDELLIN.lon);
        assert_eq!(point.y(), MEDELLIN.lat);
    }

    #[test]
    fn test_projection_preserves_distances() {
        let origin = MEDELLIN.to_geo(0.0, 0.0);

        let north = MEDELLIN.to_geo(0.0, 1000.0);
        let east = MEDELLIN.to_geo(1000.0, 0.0);

        assert!((Haversine.distance(origin, north) - 1000.0).abs() < 1.0);
        assert!((Haversine.distance(origin, east) - 1000.0).abs() < 1.0);
        assert!(north.y() > origin.y());
        assert!(east.x() > origin.x());
    }

    #[test]
    fn test_heading() {
        for (dx, dy, expected) in [
            (0.0, 1.0, 0.0),
            (1.0, 0.0, 90.0),
            (0.0, -1.0, 180.0),
            (-1.0, 0.0, 270.0),
            (1.0, 1.0, 45.0),
        ] {
            assert!((heading(dx, dy) - expected).abs() < 1e-9, "{dx} {dy}");
        }
    }
}
