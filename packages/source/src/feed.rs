//! Feed payload readers.
//!
//! A [`SourceFeed`] yields the raw records of one source as JSON values,
//! whatever the payload layout. [`FileFeed`] reads a payload that has
//! already been downloaded to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::SourceError;
use crate::source_def::{FeedConfig, SourceDefinition};

/// Something that can produce the raw records of one source.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Returns the id of the source this feed serves.
    fn source_id(&self) -> &str;

    /// Reads every raw record currently available.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the payload cannot be read or parsed.
    async fn fetch(&self) -> Result<Vec<serde_json::Value>, SourceError>;
}

/// A feed backed by a payload file.
#[derive(Debug, Clone)]
pub struct FileFeed {
    source_id: String,
    format: FeedConfig,
    path: PathBuf,
}

impl FileFeed {
    /// Creates a feed reading `path` with the source's payload layout.
    #[must_use]
    pub fn new(def: &SourceDefinition, path: impl Into<PathBuf>) -> Self {
        Self {
            source_id: def.id.clone(),
            format: def.feed,
            path: path.into(),
        }
    }

    /// Creates a feed reading `{dir}/{source_id}.{csv|json}`.
    #[must_use]
    pub fn in_dir(def: &SourceDefinition, dir: &Path) -> Self {
        Self::new(def, dir.join(format!("{}.{}", def.id, def.feed.extension())))
    }

    /// Returns the payload path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceFeed for FileFeed {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        log::debug!("Read {} bytes from {}", text.len(), self.path.display());

        let records = parse_payload(self.format, &text)?;
        log::info!(
            "{}: read {} records from {}",
            self.source_id,
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Parses a payload into raw records.
///
/// CSV rows become objects of string values keyed by the trimmed header.
/// `GeoJSON` payloads may be a `FeatureCollection` or a bare array of
/// features. Blank payloads yield no records.
///
/// # Errors
///
/// Returns [`SourceError`] if the payload is malformed or has the wrong
/// shape.
pub fn parse_payload(format: FeedConfig, text: &str) -> Result<Vec<serde_json::Value>, SourceError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    match format {
        FeedConfig::Csv { delimiter } => parse_csv(text, delimiter),
        FeedConfig::GeojsonFeatures => {
            let value: serde_json::Value = serde_json::from_str(text)?;
            match value {
                serde_json::Value::Array(features) => Ok(features),
                serde_json::Value::Object(mut collection) => match collection.remove("features") {
                    Some(serde_json::Value::Array(features)) => Ok(features),
                    _ => Err(SourceError::Format {
                        message: "GeoJSON object has no `features` array".to_string(),
                    }),
                },
                _ => Err(SourceError::Format {
                    message: "expected a FeatureCollection or an array of features".to_string(),
                }),
            }
        }
        FeedConfig::JsonArray => match serde_json::from_str(text)? {
            serde_json::Value::Array(records) => Ok(records),
            _ => Err(SourceError::Format {
                message: "expected a JSON array".to_string(),
            }),
        },
    }
}

fn parse_csv(text: &str, delimiter: char) -> Result<Vec<serde_json::Value>, SourceError> {
    let delimiter = u8::try_from(delimiter).map_err(|_| SourceError::Format {
        message: format!("CSV delimiter {delimiter:?} is not a single byte"),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = row.get(i).unwrap_or("").trim().to_owned();
            map.insert(header.clone(), serde_json::Value::String(value));
        }
        records.push(serde_json::Value::Object(map));
    }

    Ok(records)
}
