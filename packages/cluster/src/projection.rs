//! Planar projections used to measure distances between detections.

use std::f64::consts::FRAC_PI_4;

use geo::Coord;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// WGS84 semi-major axis in meters, as used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude bound of the web mercator square.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// How detections are projected before distances are compared.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Projection {
    /// Spherical web mercator (EPSG:3857). Distances are inflated by
    /// `1 / cos(latitude)` away from the equator; this matches how
    /// historical clusters were formed.
    #[default]
    WebMercator,
    /// Web mercator with distances scaled by `cos(latitude)` at the
    /// running centroid, approximating ground distance.
    ScaledMercator,
}

impl Projection {
    /// Projects a (lon, lat) position into planar meters.
    #[must_use]
    pub fn project(self, lon: f64, lat: f64) -> Coord<f64> {
        let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        Coord {
            x: EARTH_RADIUS_M * lon.to_radians(),
            y: EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
        }
    }

    /// Converts a projected position back to (lon, lat).
    #[must_use]
    pub fn unproject(self, point: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (point.x / EARTH_RADIUS_M).to_degrees(),
            y: 2.0f64
                .mul_add((point.y / EARTH_RADIUS_M).exp().atan(), -std::f64::consts::FRAC_PI_2)
                .to_degrees(),
        }
    }

    /// Distance in meters between a cluster centroid and a candidate point,
    /// both already projected.
    #[must_use]
    pub fn distance_m(self, centroid: Coord<f64>, candidate: Coord<f64>) -> f64 {
        let planar = (candidate.x - centroid.x).hypot(candidate.y - centroid.y);
        match self {
            Self::WebMercator => planar,
            Self::ScaledMercator => planar * self.unproject(centroid).y.to_radians().cos(),
        }
    }
}
