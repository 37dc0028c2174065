//! Spherical Mercator projection
//!
//! Forward projection maps degrees to metres on a sphere of radius `R`:
//! `x = R * lon`, `y = R * ln(tan(pi/4 + lat/2))`. Projected values are
//! rounded to [`PROJECTION_DECIMALS`] places.

use crate::coordinate::{round_to, Coordinate};
use serde::Serialize;
use std::f64::consts::FRAC_PI_4;
use thiserror::Error;

/// WGS84 semi-major axis, as used by web maps
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitudes are clamped to this before projecting; `y` diverges at the poles
pub const MAX_PROJECTED_LATITUDE: f64 = 89.999_999_9;

pub const PROJECTION_DECIMALS: u32 = 6;

/// Smallest sphere whose 6-place projected values still reverse to within
/// 1e-6 degrees
pub const MIN_RADIUS_M: f64 = 1_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("Invalid sphere radius {0}: must be finite and at least 1000 m")]
    InvalidRadius(f64),
}

/// A point in projected (planar) space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    radius: f64,
}

impl Default for Mercator {
    fn default() -> Self {
        Self {
            radius: EARTH_RADIUS_M,
        }
    }
}

impl Mercator {
    /// Mercator on a sphere with a custom radius
    pub fn with_radius(radius: f64) -> Result<Self, ProjectionError> {
        if !radius.is_finite() || radius < MIN_RADIUS_M {
            return Err(ProjectionError::InvalidRadius(radius));
        }
        Ok(Self { radius })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn project(&self, coordinate: &Coordinate) -> ProjectedPoint {
        let lat = coordinate
            .latitude()
            .clamp(-MAX_PROJECTED_LATITUDE, MAX_PROJECTED_LATITUDE)
            .to_radians();
        let lon = coordinate.longitude().to_radians();

        ProjectedPoint {
            x: round_to(self.radius * lon, PROJECTION_DECIMALS),
            y: round_to(
                self.radius * (FRAC_PI_4 + lat / 2.0).tan().ln(),
                PROJECTION_DECIMALS,
            ),
        }
    }

    /// Inverse projection
    ///
    /// Points outside the projected world (|x| > pi * R) have no coordinate.
    pub fn unproject(&self, point: &ProjectedPoint) -> Option<Coordinate> {
        let lat = (2.0 * (point.y / self.radius).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
        let lon = (point.x / self.radius).to_degrees();

        // Rounding of x can push +/-180 a hair past the bound
        let lon = if (lon.abs() - 180.0).abs() < 1e-9 {
            lon.clamp(-180.0, 180.0)
        } else {
            lon
        };

        Coordinate::new(lat, lon).ok()
    }
}
