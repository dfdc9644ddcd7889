#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feed provenance types and the canonical disaster event format.
//!
//! Every hazard feed (fire registry, satellite detections, weather alerts)
//! produces [`DisasterEvent`] records that conform to the shared taxonomy in
//! [`disaster_map_disaster_models`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use disaster_map_disaster_models::{DisasterType, Severity};
use disaster_map_geometry::DisasterGeometry;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Open, source-specific key/value data attached to an event.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// The feed a disaster event was ingested from.
///
/// The string form is the `source_api` provenance tag persisted with each
/// event.
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
pub enum SourceApi {
    /// Canadian Wildland Fire Information System active fire registry
    #[strum(serialize = "CWFIS")]
    #[serde(rename = "CWFIS")]
    Cwfis,
    /// Environment Canada weather alert bulletins
    #[strum(serialize = "Environment_Canada")]
    #[serde(rename = "Environment_Canada")]
    EnvironmentCanada,
    /// NASA FIRMS satellite fire detections
    #[strum(serialize = "NASA_FIRMS")]
    #[serde(rename = "NASA_FIRMS")]
    NasaFirms,
}

impl SourceApi {
    /// Returns the identifier prefix embedded in every `disaster_id` from
    /// this source. Changing these breaks update-in-place for stored rows.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Cwfis => "cwfis",
            Self::EnvironmentCanada => "envcan",
            Self::NasaFirms => "firms",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Cwfis, Self::EnvironmentCanada, Self::NasaFirms]
    }

    /// Builds `{prefix}_{native_id}` for registry and alert sources.
    #[must_use]
    pub fn native_disaster_id(self, native_id: &str) -> String {
        format!("{}_{native_id}", self.prefix())
    }

    /// Builds `{prefix}_{YYYYMMDD}_{sequence}` for clustered sources.
    ///
    /// `sequence` is the 0-based index of the cluster within one run. It is
    /// not stable across runs whose clustering order or membership differs,
    /// so re-ingesting overlapping data can orphan or duplicate rows.
    #[must_use]
    pub fn cluster_disaster_id(self, event_date: NaiveDate, sequence: usize) -> String {
        format!("{}_{}_{sequence}", self.prefix(), event_date.format("%Y%m%d"))
    }

    /// Returns `true` if `disaster_id` carries this source's prefix.
    #[must_use]
    pub fn owns_disaster_id(self, disaster_id: &str) -> bool {
        disaster_id
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|rest| !rest.is_empty())
    }
}

/// One satellite fire detection as read from the feed.
///
/// Coordinates are `None` when the raw value was missing or unparsable; the
/// clustering engine drops such detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Acquisition date and time, `None` when unparsable.
    pub acquired_at: Option<DateTime<Utc>>,
    /// Brightness temperature in Kelvin.
    pub brightness: Option<f64>,
    /// Fire radiative power in megawatts.
    pub frp: Option<f64>,
    /// Satellite identifier (e.g. `"N"` for NOAA-20).
    pub satellite: Option<String>,
    /// Detection confidence label.
    pub confidence: Option<String>,
}

impl RawDetection {
    /// Returns the brightness, treating a missing value as zero.
    #[must_use]
    pub fn brightness_or_zero(&self) -> f64 {
        self.brightness.unwrap_or(0.0)
    }

    /// Returns the radiative power, treating a missing value as zero.
    #[must_use]
    pub fn frp_or_zero(&self) -> f64 {
        self.frp.unwrap_or(0.0)
    }
}

/// A disaster event normalized to the canonical schema.
///
/// `disaster_id` is the merge key: repeated sightings of the same event
/// update the stored row instead of inserting a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterEvent {
    /// Deterministic `{source_prefix}_{...}` identifier.
    pub disaster_id: String,
    /// Kind of hazard.
    pub disaster_type: DisasterType,
    /// Human-readable name.
    pub name: String,
    /// Severity on the shared scale.
    pub severity: Severity,
    /// Location in EPSG:4326.
    pub geometry: DisasterGeometry,
    /// Affected area in square kilometres.
    pub area_sq_km: Option<f64>,
    /// Mean detection temperature (satellite sources only).
    pub temperature_celsius: Option<f64>,
    /// When the event started (or was first reported).
    pub start_time: DateTime<Utc>,
    /// When the event ended. `None` means still active.
    pub end_time: Option<DateTime<Utc>>,
    /// Whether the event is ongoing.
    pub is_active: bool,
    /// Provenance tag.
    pub source_api: SourceApi,
    /// Source-specific fields, opaque to the pipeline.
    pub metadata: Metadata,
}

/// A [`DisasterEvent`] as stored, with bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterRecord {
    /// The stored event.
    #[serde(flatten)]
    pub event: DisasterEvent,
    /// When the row was first inserted.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}
