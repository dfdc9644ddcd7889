//! Per-normalizer record mapping.
//!
//! Each module turns raw records of one feed layout into
//! [`disaster_map_source_models::DisasterEvent`]s, reading fields through
//! the owning [`crate::source_def::SourceDefinition`].

pub mod detection_cluster;
pub mod fire_registry;
pub mod weather_alert;
