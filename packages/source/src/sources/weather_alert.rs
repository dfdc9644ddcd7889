//! Weather alert bulletins.

use disaster_map_source_models::DisasterEvent;
use serde_json::json;

use crate::parsing::{parse_alert_timestamp, parse_or_now};
use crate::regions::province_point;
use crate::source_def::SourceDefinition;
use crate::type_mapping::classify_alert;
use crate::{NormalizeContext, NormalizeError};

/// Normalizes one alert.
///
/// Alerts carry no geometry of their own; the event is placed at the
/// reference point of its province. Alerts are always active.
///
/// # Errors
///
/// Returns [`NormalizeError::MissingField`] if the alert id or title is
/// absent.
pub fn normalize(
    def: &SourceDefinition,
    record: &serde_json::Value,
    ctx: &NormalizeContext<'_>,
) -> Result<DisasterEvent, NormalizeError> {
    let alert_id = def
        .text(record, "alert_id")
        .ok_or_else(|| NormalizeError::missing("alert_id"))?;
    let title = def
        .text(record, "title")
        .ok_or_else(|| NormalizeError::missing("title"))?;
    let disaster_id = def.source_api.native_disaster_id(&alert_id);

    let summary = def.text(record, "summary").unwrap_or_default();
    let province = def.text(record, "province");
    let updated = parse_or_now(
        def.text(record, "updated").as_deref(),
        parse_alert_timestamp,
        ctx.now,
        &disaster_id,
    );

    let location = province_point(province.as_deref());
    let geometry = disaster_map_geometry::point(location.x, location.y).ok_or_else(|| {
        NormalizeError::MissingGeometry {
            disaster_id: disaster_id.clone(),
        }
    })?;

    let (disaster_type, severity) = classify_alert(&title);

    let mut metadata = def.base_metadata();
    metadata.insert("alert_id".to_string(), json!(alert_id));
    metadata.insert("province".to_string(), json!(province));
    metadata.insert("summary".to_string(), json!(summary));

    Ok(DisasterEvent {
        disaster_id,
        disaster_type,
        name: title,
        severity,
        geometry,
        area_sq_km: None,
        temperature_celsius: None,
        start_time: updated,
        end_time: None,
        is_active: true,
        source_api: def.source_api,
        metadata,
    })
}
