#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Disaster type taxonomy and severity definitions.
//!
//! This crate defines the canonical disaster types and the ordered severity
//! scale shared by every feed. All sources normalize their source-specific
//! vocabularies into these types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity of a disaster event, ordered `Minor < Moderate < Severe < Extreme`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Small or well-contained events, informational statements
    Minor = 1,
    /// Events worth watching, the default for unrecognized input
    #[default]
    Moderate = 2,
    /// Warning-level events
    Severe = 3,
    /// The largest or most energetic events
    Extreme = 4,
}

impl Severity {
    /// Returns the numeric rank of this severity level (1-4).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Raises the severity by exactly one step for `Minor` and `Moderate`.
    ///
    /// `Severe` and `Extreme` are returned unchanged.
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            Self::Minor => Self::Moderate,
            Self::Moderate => Self::Severe,
            Self::Severe | Self::Extreme => self,
        }
    }

    /// Returns all variants in ascending order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Minor, Self::Moderate, Self::Severe, Self::Extreme]
    }
}

/// Kind of natural hazard a disaster event describes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisasterType {
    /// Wildland fire, from registries or satellite detections
    Wildfire,
    /// Tornadoes and funnel clouds
    Tornado,
    /// Floods and high water
    Flood,
    /// Snow, blizzards, ice storms
    WinterStorm,
    /// Hurricanes and tropical storms
    Hurricane,
    /// Thunderstorms, heat, wind, rain and anything unclassified
    SevereWeather,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn severity_is_ordered() {
        let all = Severity::all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should be below {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn escalation_stops_at_severe() {
        assert_eq!(Severity::Minor.escalate(), Severity::Moderate);
        assert_eq!(Severity::Moderate.escalate(), Severity::Severe);
        assert_eq!(Severity::Severe.escalate(), Severity::Severe);
        assert_eq!(Severity::Extreme.escalate(), Severity::Extreme);
    }

    #[test]
    fn snake_case_names() {
        assert_eq!(DisasterType::WinterStorm.as_ref(), "winter_storm");
        assert_eq!(
            DisasterType::from_str("severe_weather").unwrap(),
            DisasterType::SevereWeather
        );
        assert_eq!(Severity::Extreme.to_string(), "extreme");
        assert_eq!(
            serde_json::to_string(&Severity::Minor).unwrap(),
            "\"minor\""
        );
    }
}
