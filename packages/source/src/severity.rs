//! Severity rules for registry fires and satellite detections.
//!
//! Every function here is total: missing, negative or non-finite metrics
//! classify as [`Severity::Minor`], unrecognized stages as active.

use disaster_map_disaster_models::Severity;

/// Stage-of-control codes meaning a fire is not contained.
const OUT_OF_CONTROL_STAGES: &[&str] = &["OC", "OUT OF CONTROL"];

/// Stage-of-control codes meaning a fire no longer needs tracking.
const INACTIVE_STAGES: &[&str] = &["UC", "UNDER CONTROL", "EX", "EXTINGUISHED", "OUT"];

/// Uppercases and folds underscores to spaces so `under_control`,
/// `UNDER_CONTROL` and `Under Control` compare equal.
fn normalize_stage(stage: &str) -> String {
    stage
        .trim()
        .to_uppercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns `true` if the stage of control marks the fire out of control.
#[must_use]
pub fn is_out_of_control(stage: &str) -> bool {
    OUT_OF_CONTROL_STAGES.contains(&normalize_stage(stage).as_str())
}

/// Returns `false` for under-control and extinguished stages.
///
/// Unknown stages count as active.
#[must_use]
pub fn is_active_stage(stage: &str) -> bool {
    !INACTIVE_STAGES.contains(&normalize_stage(stage).as_str())
}

/// Classifies a registry fire by burned area in hectares.
///
/// Cutoffs: `< 10` minor, `< 100` moderate, `< 1000` severe, else extreme.
/// An out-of-control stage escalates the result by one step.
#[must_use]
pub fn classify_wildfire_area(hectares: f64, stage_of_control: &str) -> Severity {
    let base = by_cutoffs(hectares, [10.0, 100.0, 1000.0]);
    if is_out_of_control(stage_of_control) {
        base.escalate()
    } else {
        base
    }
}

/// Classifies a detection cluster by its peak fire radiative power (MW).
///
/// Cutoffs: `< 10` minor, `< 50` moderate, `< 100` severe, else extreme.
#[must_use]
pub fn classify_fire_radiative_power(frp_mw: f64) -> Severity {
    by_cutoffs(frp_mw, [10.0, 50.0, 100.0])
}

fn by_cutoffs(value: f64, [moderate, severe, extreme]: [f64; 3]) -> Severity {
    if !value.is_finite() || value < moderate {
        Severity::Minor
    } else if value < severe {
        Severity::Moderate
    } else if value < extreme {
        Severity::Severe
    } else {
        Severity::Extreme
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_cutoffs() {
        assert_eq!(classify_wildfire_area(0.0, "UC"), Severity::Minor);
        assert_eq!(classify_wildfire_area(9.99, "UC"), Severity::Minor);
        assert_eq!(classify_wildfire_area(10.0, "UC"), Severity::Moderate);
        assert_eq!(classify_wildfire_area(100.0, "UC"), Severity::Severe);
        assert_eq!(classify_wildfire_area(999.9, "UC"), Severity::Severe);
        assert_eq!(classify_wildfire_area(1000.0, "UC"), Severity::Extreme);
    }

    #[test]
    fn small_out_of_control_fire_is_moderate() {
        assert_eq!(classify_wildfire_area(5.0, "out of control"), Severity::Moderate);
    }

    #[test]
    fn out_of_control_escalates_once() {
        for stage in ["OC", "oc", "OUT_OF_CONTROL", "Out of Control"] {
            assert_eq!(classify_wildfire_area(50.0, stage), Severity::Severe, "{stage}");
            assert_eq!(classify_wildfire_area(500.0, stage), Severity::Severe, "{stage}");
            assert_eq!(classify_wildfire_area(5000.0, stage), Severity::Extreme, "{stage}");
        }
    }

    #[test]
    fn area_is_monotonic_for_fixed_stage() {
        for stage in ["OC", "BH", "UC", "Unknown"] {
            let mut previous = Severity::Minor;
            for step in 0..3000 {
                let severity = classify_wildfire_area(f64::from(step) * 0.5, stage);
                assert!(severity >= previous, "{stage} regressed at {step}");
                previous = severity;
            }
        }
    }

    #[test]
    fn frp_cutoffs() {
        assert_eq!(classify_fire_radiative_power(5.0), Severity::Minor);
        assert_eq!(classify_fire_radiative_power(10.0), Severity::Moderate);
        assert_eq!(classify_fire_radiative_power(49.9), Severity::Moderate);
        assert_eq!(classify_fire_radiative_power(50.0), Severity::Severe);
        assert_eq!(classify_fire_radiative_power(100.0), Severity::Extreme);
    }

    #[test]
    fn bad_metrics_are_minor() {
        assert_eq!(classify_fire_radiative_power(f64::NAN), Severity::Minor);
        assert_eq!(classify_fire_radiative_power(-3.0), Severity::Minor);
        assert_eq!(classify_wildfire_area(f64::INFINITY, "UC"), Severity::Minor);
        assert_eq!(classify_wildfire_area(f64::NAN, "OC"), Severity::Moderate);
    }

    #[test]
    fn stage_activity() {
        for stage in ["UC", "under_control", "Under Control", "EX", "extinguished", "OUT"] {
            assert!(!is_active_stage(stage), "{stage}");
        }
        for stage in ["OC", "BH", "Being Held", "Unknown", ""] {
            assert!(is_active_stage(stage), "{stage}");
        }
    }
}
