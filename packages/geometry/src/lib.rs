#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geometry descriptors for disaster events.
//!
//! Every persisted disaster carries a [`DisasterGeometry`] in EPSG:4326 with
//! longitude first. The builders in this crate never fail: empty coordinate
//! sets, non-finite coordinates and unrecognized geometry kinds all produce
//! `None`, which callers treat as "exclude this record".
//!
//! Two serialized forms are provided: well-known text via
//! [`DisasterGeometry::to_wkt`] and `GeoJSON` via
//! [`DisasterGeometry::to_geojson`].

use std::fmt::Write as _;
use std::str::FromStr;

use geo::{Centroid, MultiPoint};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

pub use geo::Coord;

/// Geometry kinds understood by [`build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "PascalCase", ascii_case_insensitive)]
pub enum GeometryKind {
    /// A single position
    Point,
    /// An unordered bag of positions
    MultiPoint,
    /// One exterior ring
    Polygon,
}

/// A disaster location in EPSG:4326.
///
/// Coordinates use `x = longitude`, `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
pub enum DisasterGeometry {
    /// A single (lon, lat) position.
    Point(Coord<f64>),
    /// Positions in input order.
    MultiPoint(Vec<Coord<f64>>),
    /// Exterior ring in source order. Not closed by this crate.
    Polygon(Vec<Coord<f64>>),
}

/// Builds a point geometry. Returns `None` for non-finite coordinates.
#[must_use]
pub fn point(lon: f64, lat: f64) -> Option<DisasterGeometry> {
    let coord = Coord { x: lon, y: lat };
    is_finite(&coord).then_some(DisasterGeometry::Point(coord))
}

/// Builds a multi-point geometry, preserving input order.
#[must_use]
pub fn multi_point(coords: &[Coord<f64>]) -> Option<DisasterGeometry> {
    if coords.is_empty() || !coords.iter().all(is_finite) {
        return None;
    }
    Some(DisasterGeometry::MultiPoint(coords.to_vec()))
}

/// Builds a polygon from one exterior ring.
///
/// The ring is expected to be closed by the source (first == last); it is
/// used as given.
#[must_use]
pub fn polygon(ring: &[Coord<f64>]) -> Option<DisasterGeometry> {
    if ring.is_empty() || !ring.iter().all(is_finite) {
        return None;
    }
    Some(DisasterGeometry::Polygon(ring.to_vec()))
}

/// Builds a `Point` for a single position and a `MultiPoint` otherwise.
#[must_use]
pub fn from_points(coords: &[Coord<f64>]) -> Option<DisasterGeometry> {
    match coords {
        [] => None,
        [single] => point(single.x, single.y),
        _ => multi_point(coords),
    }
}

/// Builds a geometry from a kind name (case-insensitive) and its coordinates.
///
/// A `Point` uses the first coordinate. Unknown kinds yield `None`.
#[must_use]
pub fn build(kind: &str, coords: &[Coord<f64>]) -> Option<DisasterGeometry> {
    let Ok(kind) = GeometryKind::from_str(kind.trim()) else {
        return None;
    };

    match kind {
        GeometryKind::Point => coords.first().and_then(|c| point(c.x, c.y)),
        GeometryKind::MultiPoint => multi_point(coords),
        GeometryKind::Polygon => polygon(coords),
    }
}

/// Builds a geometry from a raw `GeoJSON` geometry object
/// (`{"type": ..., "coordinates": ...}`).
///
/// Polygons use their exterior ring only. Anything else that cannot be
/// represented yields `None`.
#[must_use]
pub fn from_geojson_value(value: &serde_json::Value) -> Option<DisasterGeometry> {
    let kind = value.get("type")?.as_str()?;
    let coordinates = value.get("coordinates")?;

    let coords = match GeometryKind::from_str(kind).ok()? {
        GeometryKind::Point => parse_position(coordinates).into_iter().collect(),
        GeometryKind::MultiPoint => parse_positions(coordinates)?,
        GeometryKind::Polygon => parse_positions(coordinates.as_array()?.first()?)?,
    };

    build(kind, &coords)
}

fn parse_position(value: &serde_json::Value) -> Option<Coord<f64>> {
    let arr = value.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    Some(Coord {
        x: arr[0].as_f64()?,
        y: arr[1].as_f64()?,
    })
}

fn parse_positions(value: &serde_json::Value) -> Option<Vec<Coord<f64>>> {
    value.as_array()?.iter().map(parse_position).collect()
}

const fn is_finite(coord: &Coord<f64>) -> bool {
    coord.x.is_finite() && coord.y.is_finite()
}

impl DisasterGeometry {
    /// Returns the kind of this geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// Returns all coordinates of this geometry in stored order.
    #[must_use]
    pub fn coords(&self) -> &[Coord<f64>] {
        match self {
            Self::Point(c) => std::slice::from_ref(c),
            Self::MultiPoint(coords) | Self::Polygon(coords) => coords,
        }
    }

    /// Returns the mean position of all stored coordinates.
    #[must_use]
    pub fn centroid(&self) -> Option<Coord<f64>> {
        MultiPoint::from(self.coords().to_vec())
            .centroid()
            .map(|p| p.0)
    }

    /// Renders this geometry as well-known text, longitude first.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        match self {
            Self::Point(c) => format!("POINT({} {})", c.x, c.y),
            Self::MultiPoint(coords) => {
                let mut out = String::from("MULTIPOINT(");
                for (i, c) in coords.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "({} {})", c.x, c.y);
                }
                out.push(')');
                out
            }
            Self::Polygon(ring) => {
                let body = ring
                    .iter()
                    .map(|c| format!("{} {}", c.x, c.y))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("POLYGON(({body}))")
            }
        }
    }

    /// Converts this geometry to a `GeoJSON` geometry.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Geometry {
        let position = |c: &Coord<f64>| vec![c.x, c.y];
        let value = match self {
            Self::Point(c) => geojson::Value::Point(position(c)),
            Self::MultiPoint(coords) => {
                geojson::Value::MultiPoint(coords.iter().map(position).collect())
            }
            Self::Polygon(ring) => {
                geojson::Value::Polygon(vec![ring.iter().map(position).collect()])
            }
        };
        geojson::Geometry::new(value)
    }

    /// Converts a `GeoJSON` geometry back into a [`DisasterGeometry`].
    ///
    /// Returns `None` for geometry types other than `Point`, `MultiPoint`
    /// and `Polygon`.
    #[must_use]
    pub fn from_geojson(geometry: &geojson::Geometry) -> Option<Self> {
        let coord = |p: &Vec<f64>| -> Option<Coord<f64>> {
            Some(Coord {
                x: *p.first()?,
                y: *p.get(1)?,
            })
        };
        match &geometry.value {
            geojson::Value::Point(p) => {
                let c = coord(p)?;
                point(c.x, c.y)
            }
            geojson::Value::MultiPoint(ps) => {
                multi_point(&ps.iter().map(coord).collect::<Option<Vec<_>>>()?)
            }
            geojson::Value::Polygon(rings) => {
                polygon(&rings.first()?.iter().map(coord).collect::<Option<Vec<_>>>()?)
            }
            _ => None,
        }
    }
}

impl Serialize for DisasterGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DisasterGeometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let geometry = geojson::Geometry::deserialize(deserializer)?;
        Self::from_geojson(&geometry)
            .ok_or_else(|| serde::de::Error::custom("unsupported or empty geometry"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn point_is_lon_first() {
        let g = point(-120.5, 50.25).unwrap();
        assert_eq!(g.to_wkt(), "POINT(-120.5 50.25)");
    }

    #[test]
    fn multi_point_preserves_order() {
        let g = multi_point(&[c(-120.0, 50.0), c(-120.01, 50.01)]).unwrap();
        assert_eq!(g.to_wkt(), "MULTIPOINT((-120 50), (-120.01 50.01))");
    }

    #[test]
    fn polygon_is_not_auto_closed() {
        let ring = [c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)];
        let g = polygon(&ring).unwrap();
        assert_eq!(g.to_wkt(), "POLYGON((0 0, 1 0, 1 1))");
        assert_eq!(g.coords().len(), 3);
    }

    #[test]
    fn empty_input_is_no_geometry() {
        assert!(multi_point(&[]).is_none());
        assert!(polygon(&[]).is_none());
        assert!(from_points(&[]).is_none());
        assert!(build("Point", &[]).is_none());
    }

    #[test]
    fn unknown_kind_is_no_geometry() {
        assert!(build("LineString", &[c(1.0, 2.0)]).is_none());
        assert!(build("", &[c(1.0, 2.0)]).is_none());
    }

    #[test]
    fn kind_is_case_insensitive() {
        let g = build("multipoint", &[c(1.0, 2.0)]).unwrap();
        assert_eq!(g.kind(), GeometryKind::MultiPoint);
        assert_eq!(build("POINT", &[c(1.0, 2.0)]).unwrap().kind(), GeometryKind::Point);
    }

    #[test]
    fn non_finite_is_no_geometry() {
        assert!(point(f64::NAN, 1.0).is_none());
        assert!(multi_point(&[c(1.0, 2.0), c(f64::INFINITY, 2.0)]).is_none());
    }

    #[test]
    fn from_points_picks_kind_by_count() {
        assert_eq!(
            from_points(&[c(1.0, 2.0)]).unwrap().kind(),
            GeometryKind::Point
        );
        assert_eq!(
            from_points(&[c(1.0, 2.0), c(3.0, 4.0)]).unwrap().kind(),
            GeometryKind::MultiPoint
        );
    }

    #[test]
    fn reads_raw_geojson_polygon_exterior_ring() {
        let value = serde_json::json!({
            "type": "Polygon",
            "coordinates": [
                [[-120.0, 50.0], [-119.0, 50.0], [-119.0, 51.0], [-120.0, 50.0]],
                [[-119.8, 50.2], [-119.7, 50.2], [-119.8, 50.2]]
            ]
        });
        let g = from_geojson_value(&value).unwrap();
        assert_eq!(g.kind(), GeometryKind::Polygon);
        assert_eq!(g.coords().len(), 4);
    }

    #[test]
    fn reads_raw_geojson_point() {
        let value = serde_json::json!({"type": "Point", "coordinates": [-114.07, 51.04]});
        assert_eq!(from_geojson_value(&value).unwrap().to_wkt(), "POINT(-114.07 51.04)");
    }

    #[test]
    fn rejects_empty_raw_polygon() {
        let value = serde_json::json!({"type": "Polygon", "coordinates": []});
        assert!(from_geojson_value(&value).is_none());
    }

    #[test]
    fn geojson_conversion_keeps_coordinates() {
        let g = multi_point(&[c(-120.0, 50.0), c(-121.0, 51.0)]).unwrap();
        let back = DisasterGeometry::from_geojson(&g.to_geojson()).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn centroid_is_mean_of_coords() {
        let g = multi_point(&[c(0.0, 0.0), c(2.0, 4.0)]).unwrap();
        let centroid = g.centroid().unwrap();
        assert!((centroid.x - 1.0).abs() < 1e-9);
        assert!((centroid.y - 2.0).abs() < 1e-9);
    }
}
