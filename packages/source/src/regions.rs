//! Reference points for Canadian provinces and territories.
//!
//! Weather alerts carry a province code but no geometry, so each alert is
//! placed at its province's reference city.

use geo::Coord;

/// Province code and the (lon, lat) of its reference city.
pub const PROVINCE_REFERENCE_POINTS: &[(&str, f64, f64)] = &[
    ("AB", -114.0719, 51.0447),
    ("BC", -123.1207, 49.2827),
    ("MB", -97.1384, 49.8951),
    ("NB", -66.6431, 45.9636),
    ("NL", -52.7126, 47.5615),
    ("NS", -63.5752, 44.6488),
    ("NT", -114.3718, 62.4540),
    ("NU", -68.5170, 63.7467),
    ("ON", -79.3832, 43.6532),
    ("PE", -63.1311, 46.2382),
    ("QC", -71.2080, 46.8139),
    ("SK", -104.6189, 50.4452),
    ("YT", -135.0568, 60.7212),
];

/// Point used when the province is missing or unrecognized.
pub const NATIONAL_FALLBACK: Coord<f64> = Coord { x: -95.0, y: 56.0 };

/// Returns the reference point for a province code (case-insensitive),
/// or [`NATIONAL_FALLBACK`].
#[must_use]
pub fn province_point(province: Option<&str>) -> Coord<f64> {
    province
        .map(str::trim)
        .and_then(|code| {
            PROVINCE_REFERENCE_POINTS
                .iter()
                .find(|(p, _, _)| p.eq_ignore_ascii_case(code))
        })
        .map_or(NATIONAL_FALLBACK, |&(_, x, y)| Coord { x, y })
}
