#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting natural-hazard feeds into the disaster store.
//!
//! A sync reads a feed, normalizes (and for detection feeds, clusters) its
//! records on a blocking thread, then merges the resulting events through
//! [`merge::upsert`] as one atomic batch per source.

pub mod merge;

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use disaster_map_cluster::CentroidClustering;
use disaster_map_database::{DbError, DisasterStore};
use disaster_map_ingest_models::ImportResult;
use disaster_map_source::feed::{FileFeed, SourceFeed};
use disaster_map_source::source_def::SourceDefinition;
use disaster_map_source::{NormalizeContext, SourceError};
use disaster_map_source_models::DisasterEvent;

use crate::merge::MergeError;

/// Errors that fail a single source sync.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Reading or parsing the feed failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Writing the batch failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Opening or querying the store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The normalization task panicked or was cancelled.
    #[error("normalization task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// One or more sources in a multi-source run failed.
    #[error("{} source(s) failed: {}", sources.len(), sources.join(", "))]
    SourcesFailed {
        /// Ids of the failed sources.
        sources: Vec<String>,
    },
}

/// Returns all configured sources from the TOML registry.
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    disaster_map_source::registry::all_sources()
}

/// Returns the sources to sync, filtered by `filter` (from `--sources` or
/// the config/environment). `None` returns every source.
#[must_use]
pub fn enabled_sources(filter: Option<&[String]>) -> Vec<SourceDefinition> {
    let all = all_sources();

    let Some(ids) = filter else {
        return all;
    };

    let filtered: Vec<SourceDefinition> = all
        .into_iter()
        .filter(|s| ids.iter().any(|id| id == s.id()))
        .collect();

    if filtered.is_empty() {
        log::warn!(
            "No matching sources found for filter {:?}. Available: {}",
            ids,
            all_sources()
                .iter()
                .map(|s| s.id().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    filtered
}

/// Events from one source, ready to merge.
#[derive(Debug)]
pub struct PreparedBatch {
    /// Source id.
    pub source_id: String,
    /// Normalized events.
    pub events: Vec<DisasterEvent>,
    /// Raw records read.
    pub fetched: u64,
    /// Records excluded during normalization.
    pub skipped: u64,
    /// Time spent fetching and normalizing.
    pub elapsed: Duration,
}

/// Fetches a source's feed and normalizes it on a blocking thread.
///
/// # Errors
///
/// Returns [`IngestError`] if the feed cannot be read or the
/// normalization task fails.
pub async fn prepare_source(
    source: &SourceDefinition,
    feed: &dyn SourceFeed,
    clustering: CentroidClustering,
    now: DateTime<Utc>,
) -> Result<PreparedBatch, IngestError> {
    let start = Instant::now();
    let records = feed.fetch().await?;
    let fetched = records.len() as u64;

    let definition = source.clone();
    let page = tokio::task::spawn_blocking(move || {
        let ctx = NormalizeContext {
            now,
            clustering: &clustering,
        };
        definition.normalize_page(&records, &ctx)
    })
    .await?;

    Ok(PreparedBatch {
        source_id: source.id().to_string(),
        events: page.events,
        fetched,
        skipped: page.skipped,
        elapsed: start.elapsed(),
    })
}

/// Merges a prepared batch and reports the outcome.
///
/// # Errors
///
/// Returns [`IngestError::Merge`] if the store rejects the batch.
pub fn commit_batch<S: DisasterStore + ?Sized>(
    store: &mut S,
    batch: PreparedBatch,
) -> Result<ImportResult, IngestError> {
    let start = Instant::now();
    let upserted = merge::upsert(store, &batch.events)?;

    let result = ImportResult {
        source_name: batch.source_id,
        records_fetched: batch.fetched,
        records_normalized: batch.events.len() as u64,
        records_skipped: batch.skipped,
        records_upserted: upserted,
        duration: batch.elapsed + start.elapsed(),
    };

    log::info!(
        "{}: fetched {}, normalized {}, skipped {}, upserted {} in {:.1}s",
        result.source_name,
        result.records_fetched,
        result.records_normalized,
        result.records_skipped,
        result.records_upserted,
        result.duration.as_secs_f64()
    );

    Ok(result)
}

/// Runs one source through fetch, normalize and merge.
///
/// # Errors
///
/// Returns [`IngestError`] if any stage fails.
pub async fn sync_source<S: DisasterStore + ?Sized>(
    store: &mut S,
    source: &SourceDefinition,
    feed: &dyn SourceFeed,
    clustering: CentroidClustering,
) -> Result<ImportResult, IngestError> {
    log::info!("Syncing source: {} ({})", source.name(), source.id());
    let batch = prepare_source(source, feed, clustering, Utc::now()).await?;
    commit_batch(store, batch)
}

/// Syncs every given source from `{input_dir}/{source_id}.{csv|json}`.
///
/// Feeds are read and normalized concurrently, one task per source; the
/// store writes then run one source at a time. A failing source does not
/// stop the others.
pub async fn sync_all<S: DisasterStore + ?Sized>(
    store: &mut S,
    sources: &[SourceDefinition],
    input_dir: &Path,
    clustering: CentroidClustering,
) -> Vec<(String, Result<ImportResult, IngestError>)> {
    let now = Utc::now();

    let tasks = sources.iter().map(|source| {
        let source = source.clone();
        let feed = FileFeed::in_dir(&source, input_dir);
        tokio::spawn(async move { prepare_source(&source, &feed, clustering, now).await })
    });
    let prepared = futures::future::join_all(tasks).await;

    sources
        .iter()
        .zip(prepared)
        .map(|(source, joined)| {
            let result = joined
                .map_err(IngestError::from)
                .and_then(|prepared| prepared)
                .and_then(|batch| commit_batch(store, batch));
            if let Err(e) = &result {
                log::error!("Failed to sync {}: {e}", source.id());
            }
            (source.id().to_string(), result)
        })
        .collect()
}

/// Turns the per-source outcomes of [`sync_all`] into a run-level result.
///
/// # Errors
///
/// Returns [`IngestError::SourcesFailed`] naming every source that failed.
pub fn check_results(
    results: &[(String, Result<ImportResult, IngestError>)],
) -> Result<(), IngestError> {
    let failed: Vec<String> = results
        .iter()
        .filter(|(_, result)| result.is_err())
        .map(|(id, _)| id.clone())
        .collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(IngestError::SourcesFailed { sources: failed })
    }
}

/// Returns the `(lon, lat)` centroid recorded on a clustered event.
///
/// This is the centroid averaged in projected space during clustering,
/// which differs from a plain degree mean of the geometry at high
/// latitudes.
#[must_use]
pub fn cluster_centroid(event: &DisasterEvent) -> Option<(f64, f64)> {
    let centroid = event.metadata.get("centroid")?;
    Some((centroid.get(0)?.as_f64()?, centroid.get(1)?.as_f64()?))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use disaster_map_database::{DuckDbStore, InMemoryStore};
    use disaster_map_source::registry::find_source;
    use serde_json::Value;

    use super::*;

    /// Feed that returns fixed records.
    struct StaticFeed {
        id: String,
        records: Vec<Value>,
    }

    #[async_trait::async_trait]
    impl SourceFeed for StaticFeed {
        fn source_id(&self) -> &str {
            &self.id
        }

        async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
            Ok(self.records.clone())
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "disaster_map_ingest_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn filters_enabled_sources() {
        assert_eq!(enabled_sources(None).len(), 3);
        let ids = vec!["firms".to_string(), "usgs".to_string()];
        let sources = enabled_sources(Some(ids.as_slice()));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id(), "firms");
        assert!(enabled_sources(Some(&["nope".to_string()][..])).is_empty());
    }

    #[tokio::test]
    async fn syncs_alerts_end_to_end() {
        let source = find_source("envcan").unwrap();
        let feed = StaticFeed {
            id: "envcan".to_string(),
            records: vec![
                serde_json::json!({"id": "a1", "title": "Tornado Warning", "province": "SK"}),
                serde_json::json!({"id": "a2", "title": "Heat Advisory", "province": "ON"}),
                serde_json::json!({"title": "No id"}),
            ],
        };
        let mut store = InMemoryStore::new();

        let result = sync_source(&mut store, &source, &feed, CentroidClustering::default())
            .await
            .unwrap();

        assert_eq!(result.source_name, "envcan");
        assert_eq!(result.records_fetched, 3);
        assert_eq!(result.records_normalized, 2);
        assert_eq!(result.records_skipped, 1);
        assert_eq!(result.records_upserted, 2);
        assert!(store.get("envcan_a1").unwrap().is_some());
    }

    #[tokio::test]
    async fn sync_all_reads_input_dir() {
        let dir = scratch_dir("sync_all");
        std::fs::write(
            dir.join("firms.csv"),
            "latitude,longitude,bright_ti4,frp,acq_date,acq_time\n\
             50.0,-120.0,330,5,2024-07-03,0930\n\
             50.01,-120.01,340,60,2024-07-03,1015\n\
             51.0,-121.0,310,150,2024-07-02,2200\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("cwfis.json"),
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[-120.5,50.25]},
                 "properties":{"FIRE_ID":"K1","SIZE_HA":5,"STAGE_OF_CONTROL":"OC"}}
            ]}"#,
        )
        .unwrap();

        let sources = enabled_sources(None);
        let mut store = InMemoryStore::new();
        let results = sync_all(&mut store, &sources, &dir, CentroidClustering::new(5.0)).await;

        let by_id: std::collections::BTreeMap<_, _> = results.into_iter().collect();
        assert_eq!(by_id["firms"].as_ref().unwrap().records_upserted, 2);
        assert_eq!(by_id["cwfis"].as_ref().unwrap().records_upserted, 1);
        // No envcan.json in the directory.
        assert!(matches!(
            by_id["envcan"],
            Err(IngestError::Source(SourceError::Io(_)))
        ));

        assert_eq!(store.count().unwrap(), 3);
        assert!(store.get("firms_20240703_0").unwrap().is_some());
        assert!(store.get("firms_20240702_1").unwrap().is_some());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn reported_failures_fail_the_run() {
        let dir = scratch_dir("check_results");
        let sources = enabled_sources(None);
        let mut store = InMemoryStore::new();
        let results = sync_all(&mut store, &sources, &dir, CentroidClustering::default()).await;

        let err = check_results(&results).unwrap_err();
        let IngestError::SourcesFailed { sources: failed } = err else {
            panic!("expected SourcesFailed, got {err:?}");
        };
        assert_eq!(failed.len(), 3);

        let ok = vec![("cwfis".to_string(), Ok(ImportResult::default()))];
        assert!(check_results(&ok).is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    fn cwfis_feature(stage: &str, report_date: &str) -> Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [-120.5, 50.25]},
            "properties": {
                "FIRE_ID": "BC-K1",
                "FIRE_NAME": "Bush Creek",
                "PROVINCE": "BC",
                "SIZE_HA": 250,
                "STAGE_OF_CONTROL": stage,
                "REP_DATE": report_date,
            }
        })
    }

    #[tokio::test]
    async fn same_fire_synced_twice_keeps_one_row() {
        let source = find_source("cwfis").unwrap();
        let mut store = DuckDbStore::open_in_memory().unwrap();

        let feed = StaticFeed {
            id: "cwfis".to_string(),
            records: vec![cwfis_feature("OC", "2024-07-03")],
        };
        sync_source(&mut store, &source, &feed, CentroidClustering::default())
            .await
            .unwrap();
        sync_source(&mut store, &source, &feed, CentroidClustering::default())
            .await
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let first = store.get("cwfis_BC-K1").unwrap().unwrap();
        assert!(first.event.is_active);

        let extinguished = StaticFeed {
            id: "cwfis".to_string(),
            records: vec![cwfis_feature("EX", "2024-07-09")],
        };
        sync_source(&mut store, &source, &extinguished, CentroidClustering::default())
            .await
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let record = store.get("cwfis_BC-K1").unwrap().unwrap();
        assert!(!record.event.is_active);
        assert_eq!(
            record.event.start_time,
            "2024-07-03T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            record.event.end_time,
            Some("2024-07-09T00:00:00Z".parse::<DateTime<Utc>>().unwrap())
        );
        assert_eq!(record.created_at, first.created_at);
    }

    #[tokio::test]
    async fn cluster_centroid_comes_from_projected_mean() {
        let source = find_source("firms").unwrap();
        let feed = StaticFeed {
            id: "firms".to_string(),
            records: vec![
                serde_json::json!({"latitude": "70.0", "longitude": "-120.0", "frp": "20", "acq_date": "2024-07-03"}),
                serde_json::json!({"latitude": "70.04", "longitude": "-120.0", "frp": "20", "acq_date": "2024-07-03"}),
            ],
        };

        let batch = prepare_source(&source, &feed, CentroidClustering::new(20.0), Utc::now())
            .await
            .unwrap();

        assert_eq!(batch.events.len(), 1);
        let event = &batch.events[0];
        let (lon, lat) = cluster_centroid(event).unwrap();
        assert_eq!(event.metadata["centroid"], serde_json::json!([lon, lat]));
        assert!((lon + 120.0).abs() < 1e-9);
        assert!(lat > 70.0 && lat < 70.04);

        let mut plain = event.clone();
        plain.metadata.remove("centroid");
        assert_eq!(cluster_centroid(&plain), None);
    }
}
