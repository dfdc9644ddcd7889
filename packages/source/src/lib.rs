#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Hazard feed definitions and normalization logic.
//!
//! Each feed is described by a TOML [`source_def::SourceDefinition`]
//! embedded at compile time. The definition says how the payload is laid
//! out and which raw field names map to each canonical field; the
//! per-source modules under [`sources`] turn raw records into
//! [`DisasterEvent`]s.

pub mod feed;
pub mod parsing;
pub mod regions;
pub mod registry;
pub mod severity;
pub mod source_def;
pub mod sources;
pub mod type_mapping;

use chrono::{DateTime, Utc};
use disaster_map_cluster::ClusterStrategy;
use disaster_map_source_models::DisasterEvent;

/// Errors that can occur while reading a feed payload.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload or definition was structurally wrong.
    #[error("Format error: {message}")]
    Format {
        /// Description of what went wrong.
        message: String,
    },

    /// No source is registered under the requested id.
    #[error("Unknown source: {id}")]
    UnknownSource {
        /// The requested id.
        id: String,
    },
}

/// Errors that exclude a single record from a batch.
///
/// These never abort a batch; the caller logs them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// A field with no fallback default was absent or empty.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Canonical name of the field.
        field: String,
    },

    /// The record produced no usable geometry.
    #[error("no usable geometry for {disaster_id}")]
    MissingGeometry {
        /// Id of the excluded event.
        disaster_id: String,
    },
}

impl NormalizeError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }
}

/// Shared inputs for normalizing one batch.
pub struct NormalizeContext<'a> {
    /// Fallback timestamp for records with missing or unparsable dates.
    pub now: DateTime<Utc>,
    /// Clustering applied to detection feeds.
    pub clustering: &'a dyn ClusterStrategy,
}

/// Result of normalizing one page of raw records.
#[derive(Debug, Default)]
pub struct NormalizedPage {
    /// Events ready to merge.
    pub events: Vec<DisasterEvent>,
    /// Records (or clusters) that were excluded.
    pub skipped: u64,
}
