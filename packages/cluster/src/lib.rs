#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point clustering for satellite fire detections.
//!
//! Raw detections are grouped into [`Cluster`]s, each representing one
//! physical wildfire. Callers go through the [`ClusterStrategy`] trait so
//! the algorithm can be replaced without touching them.
//!
//! [`CentroidClustering`] is a greedy grouping: a seed point grows into a
//! cluster by absorbing every unassigned point within the threshold of the
//! cluster's **running centroid**. Membership is therefore order-dependent
//! and differs from exact single-linkage clustering.

pub mod projection;

use chrono::{DateTime, Utc};
use disaster_map_geometry::DisasterGeometry;
use disaster_map_source_models::RawDetection;
use geo::Coord;

pub use projection::Projection;

/// Default clustering distance in kilometres.
pub const DEFAULT_DISTANCE_KM: f64 = 5.0;

/// Groups detections into clusters.
pub trait ClusterStrategy {
    /// Partitions the detections with valid coordinates into clusters.
    ///
    /// Detections with missing or out-of-range coordinates belong to no
    /// cluster. Empty input yields no clusters.
    fn cluster(&self, detections: &[RawDetection]) -> Vec<Cluster>;
}

/// Greedy running-centroid clustering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidClustering {
    /// Maximum distance from the running centroid for absorption.
    pub distance_threshold_km: f64,
    /// Projection used to measure distance.
    pub projection: Projection,
}

impl Default for CentroidClustering {
    fn default() -> Self {
        Self {
            distance_threshold_km: DEFAULT_DISTANCE_KM,
            projection: Projection::default(),
        }
    }
}

impl CentroidClustering {
    /// Creates a clustering with the given threshold and web mercator
    /// distances.
    #[must_use]
    pub fn new(distance_threshold_km: f64) -> Self {
        Self {
            distance_threshold_km,
            projection: Projection::WebMercator,
        }
    }

    /// Overrides the projection.
    #[must_use]
    pub const fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

impl ClusterStrategy for CentroidClustering {
    fn cluster(&self, detections: &[RawDetection]) -> Vec<Cluster> {
        if detections.is_empty() {
            return Vec::new();
        }

        let threshold_m = self.distance_threshold_km * 1000.0;
        let projection = self.projection;

        let mut unassigned: Vec<(usize, Coord<f64>)> = Vec::with_capacity(detections.len());
        for (index, detection) in detections.iter().enumerate() {
            match valid_position(detection) {
                Some((lon, lat)) => unassigned.push((index, projection.project(lon, lat))),
                None => log::warn!(
                    "Dropping detection {index}: invalid coordinates (lat={:?}, lng={:?})",
                    detection.latitude,
                    detection.longitude
                ),
            }
        }

        let valid_count = unassigned.len();
        let mut clusters = Vec::new();

        while !unassigned.is_empty() {
            let (seed_index, seed_point) = unassigned.remove(0);
            let mut indices = vec![seed_index];
            let mut sum = seed_point;

            loop {
                let mut absorbed = false;
                let mut i = 0;

                while i < unassigned.len() {
                    #[allow(clippy::cast_precision_loss)]
                    let n = indices.len() as f64;
                    let centroid = Coord {
                        x: sum.x / n,
                        y: sum.y / n,
                    };
                    let (index, point) = unassigned[i];

                    if projection.distance_m(centroid, point) < threshold_m {
                        unassigned.remove(i);
                        indices.push(index);
                        sum.x += point.x;
                        sum.y += point.y;
                        absorbed = true;
                    } else {
                        i += 1;
                    }
                }

                if !absorbed {
                    break;
                }
            }

            #[allow(clippy::cast_precision_loss)]
            let n = indices.len() as f64;
            let centroid = projection.unproject(Coord {
                x: sum.x / n,
                y: sum.y / n,
            });

            log::debug!(
                "Closed cluster {} with {} detection(s) around ({:.4}, {:.4})",
                clusters.len(),
                indices.len(),
                centroid.x,
                centroid.y
            );

            clusters.push(Cluster {
                members: indices.iter().map(|&i| detections[i].clone()).collect(),
                source_indices: indices,
                centroid,
            });
        }

        log::info!(
            "Clustered {valid_count} detections ({} dropped) into {} wildfires",
            detections.len() - valid_count,
            clusters.len()
        );

        clusters
    }
}

/// Clusters detections with [`CentroidClustering`] and web mercator
/// distances.
#[must_use]
pub fn cluster(detections: &[RawDetection], distance_threshold_km: f64) -> Vec<Cluster> {
    CentroidClustering::new(distance_threshold_km).cluster(detections)
}

/// Returns `(lon, lat)` when both coordinates are present, finite and in
/// range.
fn valid_position(detection: &RawDetection) -> Option<(f64, f64)> {
    let lat = detection.latitude?;
    let lon = detection.longitude?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lon, lat))
}

/// A group of detections judged to be one physical fire.
///
/// Always holds at least one member.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<RawDetection>,
    source_indices: Vec<usize>,
    centroid: Coord<f64>,
}

impl Cluster {
    /// Member detections in the order they joined the cluster.
    #[must_use]
    pub fn members(&self) -> &[RawDetection] {
        &self.members
    }

    /// Positions of the members in the input slice.
    #[must_use]
    pub fn source_indices(&self) -> &[usize] {
        &self.source_indices
    }

    /// Number of member detections.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; clusters are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Centroid (lon, lat) of the members, averaged in projected space.
    #[must_use]
    pub const fn centroid(&self) -> Coord<f64> {
        self.centroid
    }

    /// The member with the highest brightness. The first seen wins ties.
    #[must_use]
    pub fn representative(&self) -> &RawDetection {
        let mut best = &self.members[0];
        for detection in &self.members[1..] {
            if detection.brightness_or_zero() > best.brightness_or_zero() {
                best = detection;
            }
        }
        best
    }

    /// Mean brightness across members, missing values counted as zero.
    #[must_use]
    pub fn mean_brightness(&self) -> f64 {
        let total: f64 = self.members.iter().map(RawDetection::brightness_or_zero).sum();
        #[allow(clippy::cast_precision_loss)]
        let n = self.members.len() as f64;
        total / n
    }

    /// Highest fire radiative power across members.
    #[must_use]
    pub fn max_frp(&self) -> f64 {
        self.members
            .iter()
            .map(RawDetection::frp_or_zero)
            .fold(0.0, f64::max)
    }

    /// Most recent acquisition time. The first seen wins ties.
    #[must_use]
    pub fn latest_acquisition(&self) -> Option<DateTime<Utc>> {
        let mut latest: Option<DateTime<Utc>> = None;
        for acquired in self.members.iter().filter_map(|d| d.acquired_at) {
            if latest.is_none_or(|current| acquired > current) {
                latest = Some(acquired);
            }
        }
        latest
    }

    /// `Point` for a single member, `MultiPoint` of all members otherwise.
    #[must_use]
    pub fn geometry(&self) -> Option<DisasterGeometry> {
        let coords: Vec<Coord<f64>> = self
            .members
            .iter()
            .filter_map(valid_position)
            .map(|(x, y)| Coord { x, y })
            .collect();
        disaster_map_geometry::from_points(&coords)
    }
}
