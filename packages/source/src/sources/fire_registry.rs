//! Active fire registry records (one `GeoJSON` feature per fire).

use disaster_map_disaster_models::DisasterType;
use disaster_map_geometry::DisasterGeometry;
use disaster_map_source_models::DisasterEvent;
use serde_json::json;

use crate::parsing::{parse_or_now, parse_report_date};
use crate::severity::{classify_wildfire_area, is_active_stage};
use crate::source_def::SourceDefinition;
use crate::{NormalizeContext, NormalizeError};

const UNKNOWN: &str = "Unknown";

/// Normalizes one registry feature.
///
/// Fields are read from the feature's `properties` (or the record itself
/// when it is a flat object). Geometry comes from the feature's `geometry`,
/// falling back to latitude/longitude properties.
///
/// # Errors
///
/// * [`NormalizeError::MissingField`] if the fire id is absent.
/// * [`NormalizeError::MissingGeometry`] if no usable location exists.
pub fn normalize(
    def: &SourceDefinition,
    record: &serde_json::Value,
    ctx: &NormalizeContext<'_>,
) -> Result<DisasterEvent, NormalizeError> {
    let props = record
        .get("properties")
        .filter(|p| p.is_object())
        .unwrap_or(record);

    let fire_id = def
        .text(props, "fire_id")
        .ok_or_else(|| NormalizeError::missing("fire_id"))?;
    let disaster_id = def.source_api.native_disaster_id(&fire_id);

    let text_or_unknown = |field: &str| def.text(props, field).unwrap_or_else(|| UNKNOWN.to_string());
    let fire_number = text_or_unknown("fire_number");
    let province = text_or_unknown("province");
    let fire_type = text_or_unknown("fire_type");
    let stage_of_control = text_or_unknown("stage_of_control");
    let agency = def
        .text(props, "agency")
        .unwrap_or_else(|| def.source_api.to_string());
    let fire_name = def
        .text(props, "fire_name")
        .unwrap_or_else(|| format!("Fire {fire_number}"));
    let size_ha = def
        .number(props, "size_ha")
        .filter(|s| s.is_finite())
        .unwrap_or(0.0);

    let geometry = registry_geometry(def, record, props).ok_or_else(|| {
        NormalizeError::MissingGeometry {
            disaster_id: disaster_id.clone(),
        }
    })?;

    let report_date = parse_or_now(
        def.text(props, "report_date").as_deref(),
        parse_report_date,
        ctx.now,
        &disaster_id,
    );

    let is_active = is_active_stage(&stage_of_control);

    let mut metadata = def.base_metadata();
    metadata.insert("fire_id".to_string(), json!(fire_id));
    metadata.insert("fire_number".to_string(), json!(fire_number));
    metadata.insert("province".to_string(), json!(province));
    metadata.insert("agency".to_string(), json!(agency));
    metadata.insert("size_ha".to_string(), json!(size_ha));
    metadata.insert("fire_type".to_string(), json!(fire_type));
    metadata.insert("stage_of_control".to_string(), json!(stage_of_control));

    Ok(DisasterEvent {
        disaster_id,
        disaster_type: DisasterType::Wildfire,
        name: format!("{fire_name} - {province}"),
        severity: classify_wildfire_area(size_ha, &stage_of_control),
        geometry,
        area_sq_km: (size_ha > 0.0).then(|| size_ha / 100.0),
        temperature_celsius: None,
        start_time: report_date,
        end_time: (!is_active).then_some(report_date),
        is_active,
        source_api: def.source_api,
        metadata,
    })
}

fn registry_geometry(
    def: &SourceDefinition,
    record: &serde_json::Value,
    props: &serde_json::Value,
) -> Option<DisasterGeometry> {
    record
        .get("geometry")
        .and_then(disaster_map_geometry::from_geojson_value)
        .or_else(|| {
            let lon = def.number(props, "longitude")?;
            let lat = def.number(props, "latitude")?;
            disaster_map_geometry::point(lon, lat)
        })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use disaster_map_cluster::CentroidClustering;
    use disaster_map_disaster_models::Severity;
    use disaster_map_source_models::SourceApi;

    use super::*;
    use crate::registry::find_source;

    fn now() -> DateTime<Utc> {
        "2025-08-01T12:00:00Z".parse().unwrap()
    }

    fn run(record: &serde_json::Value) -> Result<DisasterEvent, NormalizeError> {
        let def = find_source("cwfis").unwrap();
        let clustering = CentroidClustering::default();
        let ctx = NormalizeContext {
            now: now(),
            clustering: &clustering,
        };
        normalize(&def, record, &ctx)
    }

    fn feature(props: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [-120.5, 50.25]},
            "properties": props,
        })
    }

    #[test]
    fn normalizes_full_feature() {
        let event = run(&feature(json!({
            "FIRE_ID": "K71234",
            "FIRE_NUMBER": "K71234",
            "FIRE_NAME": "Bush Creek",
            "PROVINCE": "BC",
            "AGENCY": "BC Wildfire",
            "SIZE_HA": 250.0,
            "FIRE_TYPE": "Wildfire",
            "STAGE_OF_CONTROL": "OC",
            "REP_DATE": "2024-07-03",
        })))
        .unwrap();

        assert_eq!(event.disaster_id, "cwfis_K71234");
        assert_eq!(event.name, "Bush Creek - BC");
        assert_eq!(event.disaster_type, DisasterType::Wildfire);
        assert_eq!(event.severity, Severity::Severe);
        assert_eq!(event.geometry.to_wkt(), "POINT(-120.5 50.25)");
        assert_eq!(event.area_sq_km, Some(2.5));
        assert!(event.is_active);
        assert_eq!(event.end_time, None);
        assert_eq!(event.start_time.to_string(), "2024-07-03 00:00:00 UTC");
        assert_eq!(event.source_api, SourceApi::Cwfis);
        assert_eq!(event.metadata["country"], json!("Canada"));
        assert_eq!(event.metadata["agency"], json!("BC Wildfire"));
        assert_eq!(event.metadata["size_ha"], json!(250.0));
    }

    #[test]
    fn small_out_of_control_fire_is_moderate() {
        let event = run(&feature(json!({
            "FIRE_ID": "1",
            "SIZE_HA": 5,
            "STAGE_OF_CONTROL": "out of control",
        })))
        .unwrap();
        assert_eq!(event.severity, Severity::Moderate);
        assert!(event.is_active);
    }

    #[test]
    fn applies_fallbacks() {
        let event = run(&feature(json!({"id": 77, "STAGE_OF_CONTROL": "UC"}))).unwrap();

        assert_eq!(event.disaster_id, "cwfis_77");
        assert_eq!(event.name, "Fire Unknown - Unknown");
        assert_eq!(event.severity, Severity::Minor);
        assert_eq!(event.area_sq_km, None);
        assert_eq!(event.start_time, now());
        assert_eq!(event.metadata["agency"], json!("CWFIS"));
        assert_eq!(event.metadata["fire_type"], json!("Unknown"));
    }

    #[test]
    fn controlled_fire_ends_at_report_date() {
        let event = run(&feature(json!({
            "FIRE_ID": "2",
            "STAGE_OF_CONTROL": "EXTINGUISHED",
            "REP_DATE": "20240815",
        })))
        .unwrap();
        assert!(!event.is_active);
        assert_eq!(event.end_time, Some(event.start_time));
        assert_eq!(event.start_time.to_string(), "2024-08-15 00:00:00 UTC");
    }

    #[test]
    fn unparsable_report_date_uses_now() {
        let event = run(&feature(json!({"FIRE_ID": "3", "REP_DATE": "last tuesday"}))).unwrap();
        assert_eq!(event.start_time, now());
    }

    #[test]
    fn reads_polygon_geometry() {
        let record = json!({
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
            },
            "properties": {"FIRE_ID": "4"},
        });
        let event = run(&record).unwrap();
        assert_eq!(event.geometry.to_wkt(), "POLYGON((0 0, 1 0, 1 1, 0 0))");
    }

    #[test]
    fn flat_record_with_coordinates() {
        let record = json!({"FIRE_ID": "5", "LATITUDE": "55.1", "LONGITUDE": "-115.2"});
        let event = run(&record).unwrap();
        assert_eq!(event.geometry.to_wkt(), "POINT(-115.2 55.1)");
    }

    #[test]
    fn missing_id_is_rejected() {
        let err = run(&feature(json!({"FIRE_NAME": "Nameless"}))).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingField {
                field: "fire_id".to_string()
            }
        );
    }

    #[test]
    fn missing_geometry_is_rejected() {
        let err = run(&json!({"properties": {"FIRE_ID": "6"}, "geometry": null})).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingGeometry { disaster_id } if disaster_id == "cwfis_6"));
    }
}
