//! Merge of normalized events into the store.
//!
//! The coordinator is the only writer. It screens a batch, stamps one
//! `updated_at` for all of it, and hands it to the store as a single
//! atomic upsert.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use disaster_map_database::{DbError, DisasterStore};
use disaster_map_source_models::DisasterEvent;

/// Errors that fail a whole merge batch.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The store rejected the batch; nothing was committed.
    #[error("store rejected batch: {0}")]
    Store(#[from] DbError),
}

/// Upserts `events`, stamping them with the current time.
///
/// See [`upsert_at`].
///
/// # Errors
///
/// Returns [`MergeError::Store`] if the store write fails.
pub fn upsert<S: DisasterStore + ?Sized>(
    store: &mut S,
    events: &[DisasterEvent],
) -> Result<u64, MergeError> {
    upsert_at(store, events, Utc::now().trunc_subsecs(6))
}

/// Upserts `events` with an explicit `updated_at`.
///
/// * An empty batch returns 0 without touching the store.
/// * Events whose `disaster_id` lacks their source's prefix are logged
///   and excluded.
/// * When an id repeats, the last occurrence wins.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`MergeError::Store`] if the store write fails. The store
/// commits nothing in that case.
pub fn upsert_at<S: DisasterStore + ?Sized>(
    store: &mut S,
    events: &[DisasterEvent],
    updated_at: DateTime<Utc>,
) -> Result<u64, MergeError> {
    if events.is_empty() {
        log::debug!("Nothing to merge");
        return Ok(0);
    }

    let mut last_seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, event) in events.iter().enumerate() {
        if event.source_api.owns_disaster_id(&event.disaster_id) {
            last_seen.insert(&event.disaster_id, i);
        } else {
            log::warn!(
                "Excluding {:?}: id does not carry the {}_ prefix of {}",
                event.disaster_id,
                event.source_api.prefix(),
                event.source_api
            );
        }
    }

    let batch: Vec<DisasterEvent> = events
        .iter()
        .enumerate()
        .filter(|(i, e)| last_seen.get(e.disaster_id.as_str()) == Some(i))
        .map(|(_, e)| e.clone())
        .collect();

    if batch.is_empty() {
        log::warn!("All {} events were excluded; nothing merged", events.len());
        return Ok(0);
    }

    let written = store.upsert_batch(&batch, updated_at)?;
    log::info!(
        "Merged {} events ({} submitted, {} rows written)",
        batch.len(),
        events.len(),
        written
    );

    Ok(written)
}
