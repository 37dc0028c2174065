use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Reasons a coordinate is rejected at input time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("Invalid input: {0}. Correct format: 12.3456,98.7654")]
    InvalidFormat(String),
    #[error("Latitude must be between -90 and 90, got {0}")]
    LatitudeOutOfRange(f64),
    #[error("Longitude must be between -180 and 180, got {0}")]
    LongitudeOutOfRange(f64),
}

/// A validated WGS84 position in decimal degrees
///
/// The only way to obtain one is through [`Coordinate::new`] (or parsing),
/// so every value in circulation is within range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range (or NaN) components
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Round both components to the given number of decimal places
    pub fn rounded(&self, places: u32) -> Self {
        Self {
            latitude: round_to(self.latitude, places),
            longitude: round_to(self.longitude, places),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Parses "latitude,longitude", e.g. "47.6062,-122.3321"
impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(CoordinateError::InvalidFormat(format!(
                "expected 2 comma-separated values, got {}",
                parts.len()
            )));
        }

        let latitude = parse_component(parts[0])?;
        let longitude = parse_component(parts[1])?;
        Self::new(latitude, longitude)
    }
}

// Deserialization goes through validation too
impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            latitude: f64,
            longitude: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Coordinate::new(raw.latitude, raw.longitude).map_err(serde::de::Error::custom)
    }
}

fn parse_component(value: &str) -> Result<f64, CoordinateError> {
    value
        .parse::<f64>()
        .map_err(|e| CoordinateError::InvalidFormat(format!("{:?}: {}", value, e)))
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    // + 0.0 turns -0.0 into 0.0
    (value * factor).round() / factor + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(
            Coordinate::new(90.0001, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.0001))
        );
        assert_eq!(
            Coordinate::new(-91.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(-91.0))
        );
        assert_eq!(
            Coordinate::new(0.0, 180.5),
            Err(CoordinateError::LongitudeOutOfRange(180.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -200.0),
            Err(CoordinateError::LongitudeOutOfRange(-200.0))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_parse() {
        let c: Coordinate = " 47.6062 , -122.3321 ".parse().unwrap();
        assert_eq!(c.latitude(), 47.6062);
        assert_eq!(c.longitude(), -122.3321);

        assert!(matches!(
            "47.6062".parse::<Coordinate>(),
            Err(CoordinateError::InvalidFormat(_))
        ));
        assert!(matches!(
            "1,2,3".parse::<Coordinate>(),
            Err(CoordinateError::InvalidFormat(_))
        ));
        assert!(matches!(
            "north,west".parse::<Coordinate>(),
            Err(CoordinateError::InvalidFormat(_))
        ));
        assert!(matches!(
            "95,10".parse::<Coordinate>(),
            Err(CoordinateError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_display_and_rounding() {
        let c = Coordinate::new(51.507351, -0.127758).unwrap();
        assert_eq!(c.to_string(), "51.5074, -0.1278");

        let r = c.rounded(4);
        assert_eq!(r.latitude(), 51.5074);
        assert_eq!(r.longitude(), -0.1278);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude":1.5,"longitude":2.5}"#).unwrap();
        assert_eq!(ok, Coordinate::new(1.5, 2.5).unwrap());

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude":100.0,"longitude":2.5}"#);
        assert!(bad.is_err());
    }
}
