//! In-memory [`DisasterStore`] with the same merge semantics as the
//! `DuckDB` store. Backs `--dry-run` syncs and tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use disaster_map_source_models::{DisasterEvent, DisasterRecord};

use crate::{DbError, DisasterStore};

/// Events held in a map keyed by `disaster_id`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    records: BTreeMap<String, DisasterRecord>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates stored records in id order.
    pub fn records(&self) -> impl Iterator<Item = &DisasterRecord> {
        self.records.values()
    }
}

impl DisasterStore for InMemoryStore {
    fn upsert_batch(
        &mut self,
        events: &[DisasterEvent],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let mut batch: BTreeMap<&str, &DisasterEvent> = BTreeMap::new();
        for event in events {
            batch.insert(&event.disaster_id, event);
        }

        for (id, event) in &batch {
            match self.records.get_mut(*id) {
                Some(existing) => {
                    let stored = &mut existing.event;
                    stored.name.clone_from(&event.name);
                    stored.severity = event.severity;
                    stored.geometry.clone_from(&event.geometry);
                    stored.area_sq_km = event.area_sq_km;
                    stored.temperature_celsius = event.temperature_celsius;
                    stored.end_time = event.end_time;
                    stored.is_active = event.is_active;
                    stored.metadata.clone_from(&event.metadata);
                    existing.updated_at = updated_at;
                }
                None => {
                    self.records.insert(
                        (*id).to_string(),
                        DisasterRecord {
                            event: (*event).clone(),
                            created_at: updated_at,
                            updated_at,
                        },
                    );
                }
            }
        }

        Ok(batch.len() as u64)
    }

    fn get(&self, disaster_id: &str) -> Result<Option<DisasterRecord>, DbError> {
        Ok(self.records.get(disaster_id).cloned())
    }

    fn count(&self) -> Result<u64, DbError> {
        Ok(self.records.len() as u64)
    }

    fn count_active_by_source(&self) -> Result<BTreeMap<String, u64>, DbError> {
        let mut counts = BTreeMap::new();
        for record in self.records.values().filter(|r| r.event.is_active) {
            *counts
                .entry(record.event.source_api.as_ref().to_string())
                .or_insert(0) += 1;
        }
        Ok(counts)
    }
}
