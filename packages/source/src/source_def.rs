//! Config-driven hazard feed definition.
//!
//! [`SourceDefinition`] captures everything unique about a feed in a
//! serializable config struct: its provenance tag, payload layout, which
//! normalizer applies, and the fallback chain of raw field names behind
//! every canonical field.

use std::collections::BTreeMap;

use disaster_map_source_models::{DisasterEvent, Metadata, SourceApi};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::parsing::{field_f64, field_text};
use crate::sources::{detection_cluster, fire_registry, weather_alert};
use crate::{NormalizeContext, NormalizeError, NormalizedPage};

// ── Top-level source definition ──────────────────────────────────────────

/// A complete, config-driven feed definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier; also the `disaster_id` prefix (e.g. `"cwfis"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Provenance tag stamped on every event.
    pub source_api: SourceApi,
    /// Which normalizer turns raw records into events.
    pub normalizer: NormalizerKind,
    /// How the raw payload is laid out.
    pub feed: FeedConfig,
    /// Constant metadata added to every event (e.g. `country`).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Canonical field name to raw field fallback chain.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldChain>,
}

/// Normalization strategy for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NormalizerKind {
    /// One record per fire, with area and stage of control.
    FireRegistry,
    /// One record per weather alert bulletin.
    WeatherAlert,
    /// Point detections grouped into clusters before normalizing.
    DetectionCluster,
}

/// Payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedConfig {
    /// Delimited text with a header row.
    Csv {
        /// Field delimiter, `,` when omitted.
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// A `GeoJSON` `FeatureCollection`, or a bare array of features.
    GeojsonFeatures,
    /// A JSON array of flat objects.
    JsonArray,
}

const fn default_delimiter() -> char {
    ','
}

impl FeedConfig {
    /// File extension used for this payload in an input directory.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv { .. } => "csv",
            Self::GeojsonFeatures | Self::JsonArray => "json",
        }
    }
}

/// Raw field names tried in order for one canonical field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldChain {
    /// Raw names, highest priority first.
    pub names: Vec<String>,
    /// Value used when no name yields a non-empty value.
    #[serde(default)]
    pub default: Option<String>,
}

impl FieldChain {
    /// First non-empty text value, else the default.
    #[must_use]
    pub fn text(&self, record: &serde_json::Value) -> Option<String> {
        self.names
            .iter()
            .find_map(|name| field_text(record, name))
            .or_else(|| self.default.clone())
    }

    /// First parsable numeric value, else the default parsed as a number.
    #[must_use]
    pub fn number(&self, record: &serde_json::Value) -> Option<f64> {
        self.names
            .iter()
            .find_map(|name| field_f64(record, name))
            .or_else(|| self.default.as_deref()?.trim().parse().ok())
    }
}

type RecordNormalizer =
    fn(&SourceDefinition, &serde_json::Value, &NormalizeContext<'_>) -> Result<DisasterEvent, NormalizeError>;

impl SourceDefinition {
    /// Returns the unique source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads a canonical text field through its fallback chain.
    ///
    /// Returns `None` when the field is not configured for this source.
    #[must_use]
    pub fn text(&self, record: &serde_json::Value, field: &str) -> Option<String> {
        self.fields.get(field)?.text(record)
    }

    /// Reads a canonical numeric field through its fallback chain.
    #[must_use]
    pub fn number(&self, record: &serde_json::Value, field: &str) -> Option<f64> {
        self.fields.get(field)?.number(record)
    }

    /// Seeds event metadata with this source's constant entries.
    #[must_use]
    pub fn base_metadata(&self) -> Metadata {
        self.metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }

    /// Normalizes one page of raw records into canonical events.
    ///
    /// Records that fail normalization or produce no geometry are logged
    /// and counted as skipped; they never fail the page.
    #[must_use]
    pub fn normalize_page(
        &self,
        records: &[serde_json::Value],
        ctx: &NormalizeContext<'_>,
    ) -> NormalizedPage {
        let page = match self.normalizer {
            NormalizerKind::DetectionCluster => detection_cluster::normalize_page(self, records, ctx),
            NormalizerKind::FireRegistry => self.normalize_each(records, ctx, fire_registry::normalize),
            NormalizerKind::WeatherAlert => self.normalize_each(records, ctx, weather_alert::normalize),
        };

        log::info!(
            "{}: normalized {} events from {} records ({} skipped)",
            self.id,
            page.events.len(),
            records.len(),
            page.skipped
        );
        page
    }

    fn normalize_each(
        &self,
        records: &[serde_json::Value],
        ctx: &NormalizeContext<'_>,
        normalize: RecordNormalizer,
    ) -> NormalizedPage {
        let mut page = NormalizedPage {
            events: Vec::with_capacity(records.len()),
            skipped: 0,
        };
        for (index, record) in records.iter().enumerate() {
            match normalize(self, record, ctx) {
                Ok(event) => page.events.push(event),
                Err(e) => {
                    log::warn!("{}: skipping record {index}: {e}", self.id);
                    page.skipped += 1;
                }
            }
        }
        page
    }
}

/// Parses a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}
