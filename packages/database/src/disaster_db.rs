//! `DuckDB` disaster event storage.
//!
//! All sources share one `disasters` table keyed by `disaster_id`. Geometry
//! is kept twice, as WKT and as `GeoJSON` text, both in EPSG:4326, so it
//! can be loaded into a spatial extension without re-parsing metadata.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use disaster_map_disaster_models::{DisasterType, Severity};
use disaster_map_geometry::DisasterGeometry;
use disaster_map_source_models::{DisasterEvent, DisasterRecord, Metadata, SourceApi};
use duckdb::Connection;

use crate::{DbError, DisasterStore};

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 2_000;

/// Columns bound per row in [`upsert_disasters`].
const COLUMNS_PER_ROW: usize = 16;

/// Opens (or creates) the events database and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection or schema creation
/// fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    log::debug!("Opened disaster database at {}", path.display());

    Ok(conn)
}

/// Opens a transient in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS disasters (
            disaster_id TEXT NOT NULL PRIMARY KEY,
            disaster_type TEXT NOT NULL,
            name TEXT NOT NULL,
            severity TEXT NOT NULL,
            severity_level SMALLINT NOT NULL CHECK (severity_level BETWEEN 1 AND 4),
            geometry_wkt TEXT NOT NULL,
            geometry_geojson TEXT NOT NULL,
            area_sq_km DOUBLE CHECK (area_sq_km IS NULL OR area_sq_km >= 0),
            temperature_celsius DOUBLE,
            start_time TIMESTAMPTZ NOT NULL,
            end_time TIMESTAMPTZ,
            is_active BOOLEAN NOT NULL,
            source_api TEXT NOT NULL,
            metadata TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        );",
    )?;

    Ok(())
}

/// Formats a timestamp for binding into a `TIMESTAMPTZ` column.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string()
}

/// Upserts a batch of events inside one transaction.
///
/// Uses multi-row INSERT with ON CONFLICT. Within the batch, the last
/// occurrence of each `disaster_id` wins. On any failure the transaction
/// is rolled back and the error returned.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if encoding or any database operation fails.
pub fn upsert_disasters(
    conn: &Connection,
    events: &[DisasterEvent],
    updated_at: DateTime<Utc>,
) -> Result<u64, DbError> {
    if events.is_empty() {
        return Ok(0);
    }

    let mut last_seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, event) in events.iter().enumerate() {
        last_seen.insert(&event.disaster_id, i);
    }
    let deduped: Vec<&DisasterEvent> = events
        .iter()
        .enumerate()
        .filter(|(i, e)| last_seen.get(e.disaster_id.as_str()) == Some(i))
        .map(|(_, e)| e)
        .collect();

    if deduped.len() < events.len() {
        log::info!(
            "Deduplicated upsert batch: {} -> {} rows ({} duplicates removed)",
            events.len(),
            deduped.len(),
            events.len() - deduped.len(),
        );
    }

    conn.execute_batch("BEGIN TRANSACTION")?;
    match insert_chunks(conn, &deduped, updated_at) {
        Ok(total) => {
            conn.execute_batch("COMMIT")?;
            Ok(total)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::error!("Rollback failed after upsert error: {rollback}");
            }
            Err(e)
        }
    }
}

fn insert_chunks(
    conn: &Connection,
    events: &[&DisasterEvent],
    updated_at: DateTime<Utc>,
) -> Result<u64, DbError> {
    let updated_at = format_timestamp(&updated_at);
    let mut total = 0u64;

    let placeholders = vec!["?"; COLUMNS_PER_ROW].join(", ");

    for chunk in events.chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO disasters (
                disaster_id, disaster_type, name, severity, severity_level,
                geometry_wkt, geometry_geojson, area_sq_km, temperature_celsius,
                start_time, end_time, is_active, source_api, metadata,
                created_at, updated_at
            ) VALUES ",
        );

        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            sql.push_str(&placeholders);
            sql.push(')');
        }

        sql.push_str(
            " ON CONFLICT (disaster_id) DO UPDATE SET
                name = EXCLUDED.name,
                severity = EXCLUDED.severity,
                severity_level = EXCLUDED.severity_level,
                geometry_wkt = EXCLUDED.geometry_wkt,
                geometry_geojson = EXCLUDED.geometry_geojson,
                area_sq_km = EXCLUDED.area_sq_km,
                temperature_celsius = EXCLUDED.temperature_celsius,
                end_time = EXCLUDED.end_time,
                is_active = EXCLUDED.is_active,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at",
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for event in chunk {
            let geojson = serde_json::to_string(&event.geometry)?;
            let metadata = serde_json::to_string(&event.metadata)?;

            stmt.raw_bind_parameter(param_idx, &event.disaster_id)?;
            stmt.raw_bind_parameter(param_idx + 1, event.disaster_type.as_ref())?;
            stmt.raw_bind_parameter(param_idx + 2, &event.name)?;
            stmt.raw_bind_parameter(param_idx + 3, event.severity.as_ref())?;
            stmt.raw_bind_parameter(param_idx + 4, i16::from(event.severity.value()))?;
            stmt.raw_bind_parameter(param_idx + 5, event.geometry.to_wkt())?;
            stmt.raw_bind_parameter(param_idx + 6, geojson)?;
            stmt.raw_bind_parameter(param_idx + 7, event.area_sq_km)?;
            stmt.raw_bind_parameter(param_idx + 8, event.temperature_celsius)?;
            stmt.raw_bind_parameter(param_idx + 9, format_timestamp(&event.start_time))?;
            stmt.raw_bind_parameter(param_idx + 10, event.end_time.as_ref().map(format_timestamp))?;
            stmt.raw_bind_parameter(param_idx + 11, event.is_active)?;
            stmt.raw_bind_parameter(param_idx + 12, event.source_api.as_ref())?;
            stmt.raw_bind_parameter(param_idx + 13, metadata)?;
            // created_at only takes effect on insert
            stmt.raw_bind_parameter(param_idx + 14, &updated_at)?;
            stmt.raw_bind_parameter(param_idx + 15, &updated_at)?;

            param_idx += COLUMNS_PER_ROW;
        }

        let rows = stmt.raw_execute()?;
        total += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total)
}

/// Raw column values of one `disasters` row, before conversion.
struct StoredRow {
    disaster_id: String,
    disaster_type: String,
    name: String,
    severity: String,
    geometry_geojson: String,
    area_sq_km: Option<f64>,
    temperature_celsius: Option<f64>,
    start_time: String,
    end_time: Option<String>,
    is_active: bool,
    source_api: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

/// Loads one stored event by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// converted back.
pub fn get_disaster(conn: &Connection, disaster_id: &str) -> Result<Option<DisasterRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT disaster_id, disaster_type, name, severity, geometry_geojson,
                area_sq_km, temperature_celsius, start_time::TEXT, end_time::TEXT,
                is_active, source_api, metadata, created_at::TEXT, updated_at::TEXT
         FROM disasters WHERE disaster_id = ?",
    )?;

    let result = stmt.query_row([disaster_id], |row| {
        Ok(StoredRow {
            disaster_id: row.get(0)?,
            disaster_type: row.get(1)?,
            name: row.get(2)?,
            severity: row.get(3)?,
            geometry_geojson: row.get(4)?,
            area_sq_km: row.get(5)?,
            temperature_celsius: row.get(6)?,
            start_time: row.get(7)?,
            end_time: row.get(8)?,
            is_active: row.get(9)?,
            source_api: row.get(10)?,
            metadata: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    });

    match result {
        Ok(row) => row.into_record().map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

impl StoredRow {
    fn into_record(self) -> Result<DisasterRecord, DbError> {
        let geometry: DisasterGeometry = serde_json::from_str(&self.geometry_geojson)?;
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;

        Ok(DisasterRecord {
            event: DisasterEvent {
                disaster_type: parse_enum::<DisasterType>("disaster_type", &self.disaster_type)?,
                severity: parse_enum::<Severity>("severity", &self.severity)?,
                source_api: parse_enum::<SourceApi>("source_api", &self.source_api)?,
                start_time: required_timestamp("start_time", &self.start_time)?,
                end_time: self
                    .end_time
                    .as_deref()
                    .map(|s| required_timestamp("end_time", s))
                    .transpose()?,
                disaster_id: self.disaster_id,
                name: self.name,
                geometry,
                area_sq_km: self.area_sq_km,
                temperature_celsius: self.temperature_celsius,
                is_active: self.is_active,
                metadata,
            },
            created_at: required_timestamp("created_at", &self.created_at)?,
            updated_at: required_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

fn parse_enum<T: FromStr>(column: &str, value: &str) -> Result<T, DbError> {
    T::from_str(value).map_err(|_| DbError::Conversion {
        message: format!("unrecognized {column} value {value:?}"),
    })
}

fn required_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
    parse_timestamp(value).ok_or_else(|| DbError::Conversion {
        message: format!("unparsable {column} timestamp {value:?}"),
    })
}

/// Returns the number of stored events.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_record_count(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM disasters")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}

/// Returns the number of active events per provenance tag.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_active_by_source(conn: &Connection) -> Result<BTreeMap<String, u64>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT source_api, COUNT(*) FROM disasters WHERE is_active GROUP BY source_api",
    )?;
    let rows = stmt.query_map([], |row| {
        let source: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((source, count))
    })?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (source, count) = row?;
        #[allow(clippy::cast_sign_loss)]
        counts.insert(source, count as u64);
    }
    Ok(counts)
}

/// Parses a `DuckDB` timestamp text representation into a UTC `DateTime`.
///
/// `DuckDB`'s `::TEXT` cast can produce several formats depending on the
/// stored precision and session time zone:
/// - `2024-01-15 10:30:00+00`
/// - `2024-01-15 10:30:00.123+00`
/// - `2024-01-15 10:30:00-07:00`
/// - `2024-01-15 10:30:00` (assumed UTC)
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}

/// A [`DisasterStore`] backed by a `DuckDB` connection.
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Ok(Self { conn: open(path)? })
    }

    /// Opens a transient in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self {
            conn: open_in_memory()?,
        })
    }

    /// Borrows the underlying connection for ad-hoc queries.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl DisasterStore for DuckDbStore {
    fn upsert_batch(
        &mut self,
        events: &[DisasterEvent],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        upsert_disasters(&self.conn, events, updated_at)
    }

    fn get(&self, disaster_id: &str) -> Result<Option<DisasterRecord>, DbError> {
        get_disaster(&self.conn, disaster_id)
    }

    fn count(&self) -> Result<u64, DbError> {
        get_record_count(&self.conn)
    }

    fn count_active_by_source(&self) -> Result<BTreeMap<String, u64>, DbError> {
        count_active_by_source(&self.conn)
    }
}
