#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Storage for normalized disaster events.
//!
//! Events live in a single `DuckDB` file (`data/disasters.duckdb` by
//! default) keyed by `disaster_id`. Writers go through the
//! [`DisasterStore`] trait so the merge logic can be exercised against the
//! in-memory [`memory::InMemoryStore`] as well.

pub mod disaster_db;
pub mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use disaster_map_source_models::{DisasterEvent, DisasterRecord};

pub use disaster_db::DuckDbStore;
pub use memory::InMemoryStore;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// JSON (metadata or geometry) encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Persistent keyed storage for disaster events.
pub trait DisasterStore {
    /// Inserts or updates a batch of events atomically.
    ///
    /// New ids are inserted with `created_at = updated_at`. Existing ids
    /// get their mutable fields replaced (name, severity, geometry, area,
    /// temperature, activity, end time, metadata) and `updated_at` set;
    /// type, provenance, start time and `created_at` are kept. Either the
    /// whole batch is applied or none of it is.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails; nothing is committed.
    fn upsert_batch(
        &mut self,
        events: &[DisasterEvent],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DbError>;

    /// Loads a stored event by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    fn get(&self, disaster_id: &str) -> Result<Option<DisasterRecord>, DbError>;

    /// Returns the number of stored events.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    fn count(&self) -> Result<u64, DbError>;

    /// Returns the number of active events keyed by provenance tag
    /// (e.g. `"CWFIS"`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    fn count_active_by_source(&self) -> Result<BTreeMap<String, u64>, DbError>;
}
