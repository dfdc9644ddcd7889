#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the disaster feed ingestion tool.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};
use disaster_map_cluster::CentroidClustering;
use disaster_map_database::{DisasterStore, DuckDbStore, InMemoryStore};
use disaster_map_ingest::{
    all_sources, check_results, cluster_centroid, enabled_sources, prepare_source, sync_all, sync_source,
};
use disaster_map_ingest_models::{IngestConfig, parse_source_list};
use disaster_map_source::feed::FileFeed;
use disaster_map_source::registry::find_source;
use disaster_map_source::source_def::SourceDefinition;

#[derive(Parser)]
#[command(name = "disaster_map_ingest", about = "Natural-hazard feed ingestion tool")]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// `DuckDB` file to write (overrides the config and `DISASTER_MAP_DB_PATH`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured feed sources
    Sources,
    /// Sync one source from its feed payload
    Sync {
        /// Source identifier (e.g., "cwfis")
        source: String,
        /// Payload file. Defaults to `{input_dir}/{source}.{csv|json}`.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Merge into a throwaway in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Sync every enabled source from the input directory
    SyncAll {
        /// Comma-separated list of source IDs to sync (overrides `DISASTER_MAP_SOURCES`)
        #[arg(long)]
        sources: Option<String>,
        /// Merge into a throwaway in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Cluster a FIRMS detection file and print the clusters without storing them
    Cluster {
        /// FIRMS CSV payload
        #[arg(long)]
        input: PathBuf,
        /// Clustering distance in kilometres (overrides the config)
        #[arg(long)]
        distance_km: Option<f64>,
    },
    /// Print a stored disaster as JSON
    Show {
        /// Disaster identifier (e.g., "`cwfis_BC-K12345`")
        disaster_id: String,
    },
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = IngestConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command {
        Commands::Sources => {
            let sources = all_sources();
            println!("{:<10} {:<8} NAME", "ID", "PREFIX");
            println!("{}", "-".repeat(60));
            for source in &sources {
                println!(
                    "{:<10} {:<8} {}",
                    source.id(),
                    source.source_api.prefix(),
                    source.name()
                );
            }
        }
        Commands::Sync {
            source,
            input,
            dry_run,
        } => {
            let def = find_source(&source)?;
            let feed = match input {
                Some(path) => FileFeed::new(&def, path),
                None => FileFeed::in_dir(&def, &config.input_dir),
            };
            log::info!("Reading {}", feed.path().display());

            let result = if dry_run {
                let mut store = InMemoryStore::new();
                sync_source(&mut store, &def, &feed, config.clustering()).await?
            } else {
                let mut store = DuckDbStore::open(&config.database_path)?;
                sync_source(&mut store, &def, &feed, config.clustering()).await?
            };

            log::info!(
                "Sync complete{}: {} upserted, {} skipped in {:.1}s",
                if dry_run { " (dry run)" } else { "" },
                result.records_upserted,
                result.records_skipped,
                result.duration.as_secs_f64()
            );
        }
        Commands::SyncAll { sources, dry_run } => {
            if let Some(list) = sources {
                config.sources = Some(parse_source_list(&list));
            }
            let defs = enabled_sources(config.sources.as_deref());
            if defs.is_empty() {
                return Ok(());
            }

            if dry_run {
                log::info!("Dry run: nothing will be written to the database");
                let mut store = InMemoryStore::new();
                run_sync_all(&mut store, &defs, &config.input_dir, config.clustering()).await?;
            } else {
                let mut store = DuckDbStore::open(&config.database_path)?;
                run_sync_all(&mut store, &defs, &config.input_dir, config.clustering()).await?;
            }
        }
        Commands::Cluster { input, distance_km } => {
            if let Some(km) = distance_km {
                config.cluster_distance_km = km;
            }
            let def = find_source("firms")?;
            let feed = FileFeed::new(&def, input);
            let batch = prepare_source(&def, &feed, config.clustering(), Utc::now()).await?;

            println!(
                "{:<20} {:<9} {:>6} {:>9} CENTROID",
                "ID", "SEVERITY", "FIRES", "MAX FRP"
            );
            println!("{}", "-".repeat(70));
            for event in &batch.events {
                let centroid = cluster_centroid(event)
                    .map_or_else(String::new, |(lon, lat)| format!("{lat:.4}, {lon:.4}"));
                println!(
                    "{:<20} {:<9} {:>6} {:>9} {centroid}",
                    event.disaster_id,
                    event.severity.to_string(),
                    event.metadata.get("fire_count").map_or_else(String::new, ToString::to_string),
                    event.metadata.get("max_frp").map_or_else(String::new, ToString::to_string),
                );
            }
            log::info!(
                "{} detections formed {} clusters ({} skipped)",
                batch.fetched,
                batch.events.len(),
                batch.skipped
            );
        }
        Commands::Show { disaster_id } => {
            let store = DuckDbStore::open(&config.database_path)?;
            match store.get(&disaster_id)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => log::warn!("No disaster with id {disaster_id}"),
            }
        }
    }

    Ok(())
}

/// Runs every source into `store`, logs the run summary and fails if any
/// source failed.
async fn run_sync_all<S: DisasterStore>(
    store: &mut S,
    defs: &[SourceDefinition],
    input_dir: &Path,
    clustering: CentroidClustering,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let results = sync_all(store, defs, input_dir, clustering).await;

    let total_upserted: u64 = results
        .iter()
        .filter_map(|(_, result)| result.as_ref().ok())
        .map(|summary| summary.records_upserted)
        .sum();

    log::info!(
        "Sync-all complete: {} sources, {total_upserted} upserted in {:.1}s (store holds {})",
        results.len(),
        start.elapsed().as_secs_f64(),
        store.count()?
    );
    for (source_api, active) in store.count_active_by_source()? {
        log::info!("  {source_api}: {active} active");
    }

    check_results(&results)?;
    Ok(())
}
