//! Weather alert classification.
//!
//! Maps free-text alert titles to the canonical [`DisasterType`] and a
//! [`Severity`]. Alert bulletins have no structured hazard code, so
//! classification is keyword-based and case-insensitive. Rules are checked
//! in order and the first match wins.

use disaster_map_disaster_models::{DisasterType, Severity};

/// Ordered hazard keyword rules.
const HAZARD_RULES: &[(&[&str], DisasterType)] = &[
    (&["tornado", "funnel cloud"], DisasterType::Tornado),
    (&["flood", "flooding", "high water"], DisasterType::Flood),
    (
        &["winter storm", "blizzard", "snow", "ice storm"],
        DisasterType::WinterStorm,
    ),
    (&["hurricane", "tropical storm"], DisasterType::Hurricane),
    (&["thunderstorm", "lightning"], DisasterType::SevereWeather),
    (&["heat"], DisasterType::SevereWeather),
    (&["wind", "gale"], DisasterType::SevereWeather),
    (&["rain", "rainfall"], DisasterType::SevereWeather),
];

/// Classifies an alert title into a disaster type and severity.
///
/// Unrecognized hazards map to [`DisasterType::SevereWeather`]. Severity
/// comes from the alert level: `warning` is severe, `watch` moderate,
/// `advisory` and `statement` minor, anything else moderate.
#[must_use]
pub fn classify_alert(title: &str) -> (DisasterType, Severity) {
    let lower = title.to_lowercase();

    let disaster_type = HAZARD_RULES
        .iter()
        .find(|(keywords, _)| contains_any(&lower, keywords))
        .map_or(DisasterType::SevereWeather, |(_, t)| *t);

    let severity = if lower.contains("warning") {
        Severity::Severe
    } else if lower.contains("watch") {
        Severity::Moderate
    } else if contains_any(&lower, &["advisory", "statement"]) {
        Severity::Minor
    } else {
        Severity::Moderate
    };

    (disaster_type, severity)
}

/// Returns `true` if `haystack` contains any of the given `needles`.
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severe_thunderstorm_warning() {
        assert_eq!(
            classify_alert("Severe Thunderstorm Warning for Region X"),
            (DisasterType::SevereWeather, Severity::Severe)
        );
    }

    #[test]
    fn hazard_keywords() {
        assert_eq!(classify_alert("Tornado Watch").0, DisasterType::Tornado);
        assert_eq!(classify_alert("Funnel cloud advisory").0, DisasterType::Tornado);
        assert_eq!(classify_alert("Flood Warning").0, DisasterType::Flood);
        assert_eq!(classify_alert("HIGH WATER statement").0, DisasterType::Flood);
        assert_eq!(classify_alert("Blizzard Warning").0, DisasterType::WinterStorm);
        assert_eq!(classify_alert("Snowfall warning").0, DisasterType::WinterStorm);
        assert_eq!(classify_alert("Tropical Storm Watch").0, DisasterType::Hurricane);
        assert_eq!(classify_alert("Heat Warning").0, DisasterType::SevereWeather);
        assert_eq!(classify_alert("Gale warning").0, DisasterType::SevereWeather);
        assert_eq!(classify_alert("Fog advisory").0, DisasterType::SevereWeather);
    }

    #[test]
    fn first_rule_wins() {
        // "snow" appears but the tornado rule is checked first.
        assert_eq!(classify_alert("Tornado and snow squall warning").0, DisasterType::Tornado);
        // "rainfall" would match the rain rule, but flood is checked first.
        assert_eq!(classify_alert("Rainfall flooding statement").0, DisasterType::Flood);
    }

    #[test]
    fn alert_levels() {
        assert_eq!(classify_alert("Wind Warning").1, Severity::Severe);
        assert_eq!(classify_alert("Wind Watch").1, Severity::Moderate);
        assert_eq!(classify_alert("Wind Advisory").1, Severity::Minor);
        assert_eq!(classify_alert("Special weather statement").1, Severity::Minor);
        assert_eq!(classify_alert("Wind").1, Severity::Moderate);
        assert_eq!(classify_alert("").1, Severity::Moderate);
    }

    #[test]
    fn warning_outranks_watch() {
        assert_eq!(classify_alert("Watch upgraded to warning").1, Severity::Severe);
    }
}
