use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Kmh(f64);

impl Kmh {
    pub const ZERO: Kmh = Kmh(0.0);

    pub fn new(value: f64) -> Self {
        Kmh(value)
    }

    pub fn from_meters_per_second(value: f64) -> Self {
        Kmh(value * 3.6)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn meters_per_second(&self) -> f64 {
        self.0 / 3.6
    }

    /// Saturating subtraction, never below zero.
    pub fn saturating_sub(self, other: Kmh) -> Kmh {
        Kmh((self.0 - other.0).max(0.0))
    }
}

impl Sub for Kmh {
    type Output = Kmh;

    fn sub(self, other: Kmh) -> Kmh {
        Kmh(self.0 - other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Meters(f64);

impl Meters {
    pub const ZERO: Meters = Meters(0.0);

    pub fn new(value: f64) -> Self {
        Meters(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Meters {
    fn from(value: f64) -> Self {
        Meters::new(value)
    }
}

impl Add for Meters {
    type Output = Meters;

    fn add(self, other: Meters) -> Meters {
        Meters(self.0 + other.0)
    }
}

impl AddAssign for Meters {
    fn add_assign(&mut self, other: Meters) {
        self.0 += other.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kmh_conversions() {
        let speed = Kmh::from_meters_per_second(10.0);
        assert_eq!(speed.value(), 36.0);
        assert_eq!(speed.meters_per_second(), 10.0);
    }

    #[test]
    fn test_kmh_saturating_sub() {
        assert_eq!(Kmh::new(5.0).saturating_sub(Kmh::new(8.0)), Kmh::ZERO);
        assert_eq!(Kmh::new(8.0).saturating_sub(Kmh::new(5.0)), Kmh::new(3.0));
    }
}
