#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion configuration and result types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use disaster_map_cluster::{CentroidClustering, DEFAULT_DISTANCE_KM, Projection};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`IngestConfig::database_path`].
pub const DB_PATH_ENV: &str = "DISASTER_MAP_DB_PATH";
/// Environment variable overriding [`IngestConfig::cluster_distance_km`].
pub const CLUSTER_KM_ENV: &str = "DISASTER_MAP_CLUSTER_KM";
/// Environment variable overriding [`IngestConfig::sources`].
pub const SOURCES_ENV: &str = "DISASTER_MAP_SOURCES";
/// Environment variable overriding [`IngestConfig::input_dir`].
pub const INPUT_DIR_ENV: &str = "DISASTER_MAP_INPUT_DIR";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`IngestConfig`].
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An override value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Config key or environment variable.
        key: String,
        /// The rejected value.
        value: String,
    },
}

/// Settings for an ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// `DuckDB` file holding stored events.
    pub database_path: PathBuf,
    /// Maximum distance from a cluster's running centroid, in kilometres.
    pub cluster_distance_km: f64,
    /// Projection used for clustering distances.
    pub projection: Projection,
    /// Source ids to sync; `None` means every registered source.
    pub sources: Option<Vec<String>>,
    /// Directory holding `{source_id}.{csv|json}` feed payloads.
    pub input_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/disasters.duckdb"),
            cluster_distance_km: DEFAULT_DISTANCE_KM,
            projection: Projection::default(),
            sources: None,
            input_dir: PathBuf::from("data/feeds"),
        }
    }
}

impl IngestConfig {
    /// Parses a config from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the TOML is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Loads the config file (when given) and applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// environment override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the cluster distance is not
    /// a number.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(km) = lookup(CLUSTER_KM_ENV) {
            self.cluster_distance_km =
                km.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: CLUSTER_KM_ENV.to_string(),
                    value: km.clone(),
                })?;
        }
        if let Some(sources) = lookup(SOURCES_ENV) {
            self.sources = Some(parse_source_list(&sources));
        }
        if let Some(dir) = lookup(INPUT_DIR_ENV) {
            self.input_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Builds the clustering strategy these settings describe.
    #[must_use]
    pub const fn clustering(&self) -> CentroidClustering {
        CentroidClustering {
            distance_threshold_km: self.cluster_distance_km,
            projection: self.projection,
        }
    }
}

/// Splits a comma-separated source list, dropping blanks.
#[must_use]
pub fn parse_source_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Result of a completed import operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Id of the source that was imported.
    pub source_name: String,
    /// Raw records read from the feed.
    pub records_fetched: u64,
    /// Events produced by normalization.
    pub records_normalized: u64,
    /// Records, detections or clusters excluded along the way.
    pub records_skipped: u64,
    /// Rows written to the store.
    pub records_upserted: u64,
    /// How long the import took.
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.database_path, PathBuf::from("data/disasters.duckdb"));
        assert!((config.cluster_distance_km - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.projection, Projection::WebMercator);
        assert_eq!(config.sources, None);
        assert_eq!(config.input_dir, PathBuf::from("data/feeds"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = IngestConfig::from_toml_str(
            r#"
            cluster_distance_km = 2.5
            projection = "scaled_mercator"
            sources = ["firms"]
            "#,
        )
        .unwrap();
        assert!((config.cluster_distance_km - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.projection, Projection::ScaledMercator);
        assert_eq!(config.sources, Some(vec!["firms".to_string()]));
        assert_eq!(config.database_path, PathBuf::from("data/disasters.duckdb"));
    }

    #[test]
    fn rejects_unknown_projection() {
        assert!(matches!(
            IngestConfig::from_toml_str(r#"projection = "lambert""#),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn env_overrides_win() {
        let env: BTreeMap<&str, &str> = [
            (DB_PATH_ENV, "/tmp/x.duckdb"),
            (CLUSTER_KM_ENV, " 10 "),
            (SOURCES_ENV, "cwfis, envcan,,"),
            (INPUT_DIR_ENV, "/srv/feeds"),
        ]
        .into_iter()
        .collect();

        let config = IngestConfig::default()
            .with_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/x.duckdb"));
        assert!((config.cluster_distance_km - 10.0).abs() < f64::EPSILON);
        assert_eq!(
            config.sources,
            Some(vec!["cwfis".to_string(), "envcan".to_string()])
        );
        assert_eq!(config.input_dir, PathBuf::from("/srv/feeds"));
    }

    #[test]
    fn bad_distance_override_is_an_error() {
        let result = IngestConfig::default()
            .with_overrides(|k| (k == CLUSTER_KM_ENV).then(|| "five".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn builds_clustering() {
        let config = IngestConfig {
            cluster_distance_km: 3.0,
            projection: Projection::ScaledMercator,
            ..IngestConfig::default()
        };
        let clustering = config.clustering();
        assert!((clustering.distance_threshold_km - 3.0).abs() < f64::EPSILON);
        assert_eq!(clustering.projection, Projection::ScaledMercator);
    }
}
