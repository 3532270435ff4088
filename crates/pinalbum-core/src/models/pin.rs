use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns a description of the problem if the coordinate can't be searched on.
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(format!(
                "coordinate must be finite (lat={}, lon={})",
                self.latitude, self.longitude
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range [-90, 90]", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range [-180, 180]", self.longitude));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A user-placed point of interest that owns one photo album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: String,
    pub coordinate: Coordinate,
    pub created_at: DateTime<Utc>,
}

impl Pin {
    pub fn new(coordinate: Coordinate) -> Result<Self, String> {
        coordinate.validate()?;
        Ok(Self {
            id: Self::id_for(&coordinate),
            coordinate,
            created_at: Utc::now(),
        })
    }

    /// Stable identifier derived from the coordinate at 6 decimal places.
    ///
    /// Safe to use as a file name: no separators, `-` kept for sign.
    pub fn id_for(coordinate: &Coordinate) -> String {
        format!("{:.6}_{:.6}", coordinate.latitude, coordinate.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(Coordinate::new(-2.197755, -74.669197).is_valid());

        assert!(!Coordinate::new(90.5, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.1).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_pin_id_is_stable() {
        let a = Pin::new(Coordinate::new(-2.197755516486268, -74.66919744058595)).expect("valid");
        let b = Pin::new(Coordinate::new(-2.1977558, -74.6691972)).expect("valid");
        assert_eq!(a.id, "-2.197756_-74.669197");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_pin_rejects_invalid_coordinate() {
        assert!(Pin::new(Coordinate::new(123.0, 0.0)).is_err());
    }
}
