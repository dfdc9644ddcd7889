//! Satellite fire detections, grouped into clusters before normalizing.
//!
//! One event is produced per cluster rather than per detection. Cluster
//! ids are `{prefix}_{YYYYMMDD}_{n}` where `n` is the cluster's position
//! in this run, so they are only stable while the input is.

use chrono::{DateTime, Utc};
use disaster_map_cluster::Cluster;
use disaster_map_disaster_models::DisasterType;
use disaster_map_source_models::{DisasterEvent, RawDetection};
use serde_json::json;

use crate::parsing::parse_acquisition;
use crate::severity::classify_fire_radiative_power;
use crate::source_def::SourceDefinition;
use crate::{NormalizeContext, NormalizeError, NormalizedPage};

/// Offset between Kelvin and Celsius.
const KELVIN_OFFSET: f64 = 273.15;

/// Reads one raw detection row.
///
/// Unparsable values become `None`; the clustering engine drops
/// detections without valid coordinates.
#[must_use]
pub fn parse_detection(def: &SourceDefinition, record: &serde_json::Value) -> RawDetection {
    let acquired_at = def.text(record, "acq_date").and_then(|date| {
        let time = def.text(record, "acq_time");
        let parsed = parse_acquisition(&date, time.as_deref());
        if parsed.is_none() {
            log::warn!("{}: unparsable acquisition {date:?} {time:?}", def.id);
        }
        parsed
    });

    RawDetection {
        latitude: def.number(record, "latitude"),
        longitude: def.number(record, "longitude"),
        acquired_at,
        brightness: def.number(record, "brightness"),
        frp: def.number(record, "frp"),
        satellite: def.text(record, "satellite"),
        confidence: def.text(record, "confidence"),
    }
}

/// Normalizes one cluster.
///
/// `sequence` is the cluster's 0-based position in this run. The event
/// time is the most recent acquisition, or `now` when no member has one.
///
/// # Errors
///
/// Returns [`NormalizeError::MissingGeometry`] if no member has a usable
/// position.
pub fn normalize_cluster(
    def: &SourceDefinition,
    cluster: &Cluster,
    sequence: usize,
    now: DateTime<Utc>,
) -> Result<DisasterEvent, NormalizeError> {
    let start_time = cluster.latest_acquisition().unwrap_or(now);
    let disaster_id = def
        .source_api
        .cluster_disaster_id(start_time.date_naive(), sequence);

    let geometry = cluster
        .geometry()
        .ok_or_else(|| NormalizeError::MissingGeometry {
            disaster_id: disaster_id.clone(),
        })?;

    let max_frp = cluster.max_frp();
    let avg_brightness = cluster.mean_brightness();
    let has_brightness = cluster.members().iter().any(|d| d.brightness.is_some());
    let representative = cluster.representative();
    let centroid = cluster.centroid();

    let mut metadata = def.base_metadata();
    metadata.insert("fire_count".to_string(), json!(cluster.len()));
    metadata.insert("max_frp".to_string(), json!(max_frp));
    metadata.insert("avg_brightness".to_string(), json!(avg_brightness));
    metadata.insert(
        "satellite".to_string(),
        json!(representative.satellite.as_deref().unwrap_or("Unknown")),
    );
    metadata.insert(
        "confidence".to_string(),
        json!(representative.confidence.as_deref().unwrap_or("nominal")),
    );
    metadata.insert("cluster_id".to_string(), json!(sequence));
    metadata.insert("centroid".to_string(), json!([centroid.x, centroid.y]));

    Ok(DisasterEvent {
        disaster_id,
        disaster_type: DisasterType::Wildfire,
        name: format!("Wildfire cluster {sequence}"),
        severity: classify_fire_radiative_power(max_frp),
        geometry,
        area_sq_km: None,
        temperature_celsius: has_brightness.then(|| avg_brightness - KELVIN_OFFSET),
        start_time,
        end_time: None,
        is_active: true,
        source_api: def.source_api,
        metadata,
    })
}

/// Parses, clusters and normalizes a page of detection rows.
///
/// Detections dropped by clustering and clusters that fail to normalize
/// are both counted as skipped.
#[must_use]
pub fn normalize_page(
    def: &SourceDefinition,
    records: &[serde_json::Value],
    ctx: &NormalizeContext<'_>,
) -> NormalizedPage {
    let detections: Vec<RawDetection> = records.iter().map(|r| parse_detection(def, r)).collect();
    let clusters = ctx.clustering.cluster(&detections);

    let clustered: usize = clusters.iter().map(Cluster::len).sum();
    let mut page = NormalizedPage {
        events: Vec::with_capacity(clusters.len()),
        skipped: (detections.len() - clustered) as u64,
    };

    for (sequence, cluster) in clusters.iter().enumerate() {
        match normalize_cluster(def, cluster, sequence, ctx.now) {
            Ok(event) => {
                log::debug!(
                    "{}: {} detections, max FRP {:.1} MW, {}",
                    event.disaster_id,
                    cluster.len(),
                    cluster.max_frp(),
                    event.severity
                );
                page.events.push(event);
            }
            Err(e) => {
                log::warn!("{}: skipping cluster {sequence}: {e}", def.id);
                page.skipped += 1;
            }
        }
    }

    page
}

#[cfg(test)]
mod tests {
    use disaster_map_cluster::CentroidClustering;
    use disaster_map_disaster_models::Severity;
    use disaster_map_source_models::SourceApi;

    use super::*;
    use crate::registry::find_source;

    fn now() -> DateTime<Utc> {
        "2025-08-01T12:00:00Z".parse().unwrap()
    }

    fn row(lat: &str, lon: &str, bright: &str, frp: &str, date: &str, time: &str) -> serde_json::Value {
        json!({
            "latitude": lat,
            "longitude": lon,
            "bright_ti4": bright,
            "frp": frp,
            "acq_date": date,
            "acq_time": time,
            "satellite": "N",
            "confidence": "h",
        })
    }

    fn run(records: &[serde_json::Value]) -> NormalizedPage {
        let def = find_source("firms").unwrap();
        let clustering = CentroidClustering::new(5.0);
        let ctx = NormalizeContext {
            now: now(),
            clustering: &clustering,
        };
        def.normalize_page(records, &ctx)
    }

    #[test]
    fn parses_detection_row() {
        let def = find_source("firms").unwrap();
        let detection = parse_detection(&def, &row("50.0", "-120.0", "330.5", "12.3", "2024-07-03", "945"));

        assert_eq!(detection.latitude, Some(50.0));
        assert_eq!(detection.longitude, Some(-120.0));
        assert_eq!(detection.brightness, Some(330.5));
        assert_eq!(detection.frp, Some(12.3));
        assert_eq!(detection.satellite.as_deref(), Some("N"));
        assert_eq!(
            detection.acquired_at.unwrap().to_string(),
            "2024-07-03 09:45:00 UTC"
        );
    }

    #[test]
    fn missing_optional_columns_use_defaults() {
        let def = find_source("firms").unwrap();
        let detection = parse_detection(&def, &json!({"latitude": "50", "longitude": "-120"}));
        assert_eq!(detection.acquired_at, None);
        assert_eq!(detection.brightness, None);
        assert_eq!(detection.satellite.as_deref(), Some("Unknown"));
        assert_eq!(detection.confidence.as_deref(), Some("nominal"));
    }

    #[test]
    fn three_detections_become_two_wildfires() {
        let page = run(&[
            row("50.0", "-120.0", "330", "5", "2024-07-03", "0930"),
            row("50.01", "-120.01", "340", "60", "2024-07-03", "1015"),
            row("51.0", "-121.0", "310", "150", "2024-07-02", "2200"),
        ]);

        assert_eq!(page.skipped, 0);
        assert_eq!(page.events.len(), 2);

        let first = &page.events[0];
        assert_eq!(first.disaster_id, "firms_20240703_0");
        assert_eq!(first.name, "Wildfire cluster 0");
        assert_eq!(first.severity, Severity::Severe);
        assert_eq!(first.geometry.to_wkt(), "MULTIPOINT((-120 50), (-120.01 50.01))");
        assert_eq!(first.start_time.to_string(), "2024-07-03 10:15:00 UTC");
        assert_eq!(first.metadata["fire_count"], json!(2));
        assert_eq!(first.metadata["max_frp"], json!(60.0));
        assert_eq!(first.metadata["avg_brightness"], json!(335.0));
        assert_eq!(first.metadata["cluster_id"], json!(0));
        assert_eq!(first.source_api, SourceApi::NasaFirms);
        let celsius = first.temperature_celsius.unwrap();
        assert!((celsius - 61.85).abs() < 1e-9);

        let second = &page.events[1];
        assert_eq!(second.disaster_id, "firms_20240702_1");
        assert_eq!(second.severity, Severity::Extreme);
        assert_eq!(second.geometry.to_wkt(), "POINT(-121 51)");
        assert_eq!(second.metadata["fire_count"], json!(1));
    }

    #[test]
    fn representative_is_brightest() {
        let page = run(&[
            json!({"latitude": "50", "longitude": "-120", "bright_ti4": "300", "satellite": "N"}),
            json!({"latitude": "50", "longitude": "-120", "bright_ti4": "360", "satellite": "1"}),
        ]);
        assert_eq!(page.events[0].metadata["satellite"], json!("1"));
    }

    #[test]
    fn undated_cluster_uses_now() {
        let page = run(&[json!({"latitude": "50", "longitude": "-120"})]);
        let event = &page.events[0];
        assert_eq!(event.disaster_id, "firms_20250801_0");
        assert_eq!(event.start_time, now());
        assert_eq!(event.temperature_celsius, None);
        assert_eq!(event.severity, Severity::Minor);
    }

    #[test]
    fn invalid_coordinates_are_skipped() {
        let page = run(&[
            row("", "-120.0", "330", "5", "2024-07-03", "0930"),
            row("95.0", "-120.0", "330", "5", "2024-07-03", "0930"),
            row("50.0", "-120.0", "330", "5", "2024-07-03", "0930"),
        ]);
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.skipped, 2);
    }

    #[test]
    fn empty_page() {
        let page = run(&[]);
        assert!(page.events.is_empty());
        assert_eq!(page.skipped, 0);
    }
}
