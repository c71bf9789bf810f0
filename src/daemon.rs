/// Rebuild daemon for the sensor index service
///
/// This module implements the long-running loop that:
/// 1. Validates database connectivity and schema on startup
/// 2. Recovers the last published generation into the in-memory index
/// 3. Watches the serving generation's age
/// 4. Runs the builder when it goes stale, under the advisory lock
/// 5. Publishes the result atomically and swaps the index snapshot
///
/// A failed or aborted rebuild leaves the serving generation untouched;
/// the daemon just tries again next cycle.

use crate::builder::{Builder, BuilderConfig, next_generation_id};
use crate::geocode::CentroidGeocoder;
use crate::index::{IndexConfig, SensorIndex};
use crate::ingest::HttpSensorSource;
use crate::model::BuildReport;
use crate::store;
use crate::zipcodes::{self, ZipEntry};
use postgres::Client;
use std::error::Error;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// How often to check whether a rebuild is due (default: 15 minutes)
    pub poll_interval_minutes: u64,

    /// Maximum age of the serving generation before a rebuild is
    /// triggered (default: 1440 minutes)
    pub max_generation_age_minutes: i64,

    /// Base URL of the PurpleAir API
    pub purpleair_base_url: String,

    /// Builder settings used for every rebuild
    pub builder: BuilderConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 15,
            max_generation_age_minutes: 24 * 60,
            purpleair_base_url: "https://api.purpleair.com".to_string(),
            builder: BuilderConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Main daemon state
pub struct Daemon {
    config: DaemonConfig,
    zips: Vec<ZipEntry>,
    client: Option<Client>,
    source: Option<HttpSensorSource>,
    index: Arc<SensorIndex>,
}

impl Daemon {
    /// Create a new daemon instance with default configuration
    pub fn new() -> Self {
        Self::with_config(DaemonConfig::default())
    }

    /// Create daemon with custom configuration
    pub fn with_config(config: DaemonConfig) -> Self {
        let index = SensorIndex::with_config(IndexConfig {
            max_generation_age_minutes: config.max_generation_age_minutes,
            ..IndexConfig::default()
        });
        Self {
            config,
            zips: Vec::new(),
            client: None,
            source: None,
            index: Arc::new(index),
        }
    }

    /// Shared handle to the query index, e.g. for the operator endpoint.
    pub fn index(&self) -> Arc<SensorIndex> {
        Arc::clone(&self.index)
    }

    pub fn zip_count(&self) -> usize {
        self.zips.len()
    }

    /// Initialize daemon: validate database, load the zip registry,
    /// recover the published generation, and set up the listing source.
    pub fn initialize(&mut self) -> Result<(), Box<dyn Error>> {
        let mut client = store::connect_and_verify()?;

        self.zips = zipcodes::load_registry();
        if self.zips.is_empty() {
            return Err("No zip codes configured in zipcodes.toml".into());
        }

        if let Some(generation) = store::load_current(&mut client)? {
            println!(
                "   Recovered generation {} ({} sensors, {} zips mapped)",
                generation.id,
                generation.sensors.len(),
                generation.mappings.len()
            );
            self.index.install(generation);
        }

        let api_key = std::env::var("PURPLEAIR_API_KEY")
            .map_err(|_| "PURPLEAIR_API_KEY environment variable not set")?;
        self.source = Some(HttpSensorSource::new(
            reqwest::blocking::Client::new(),
            &self.config.purpleair_base_url,
            &api_key,
        ));

        self.client = Some(client);
        Ok(())
    }

    /// Age of the serving generation, `None` when nothing is installed.
    pub fn check_staleness(&self) -> Option<chrono::Duration> {
        self.index.current_generation_age()
    }

    /// True when the next cycle should rebuild.
    pub fn needs_rebuild(&self) -> bool {
        self.index.is_stale()
    }

    /// Run one complete build-publish-swap cycle under the builder lock.
    pub fn rebuild(&mut self) -> Result<BuildReport, Box<dyn Error>> {
        let client = self.client.as_mut().ok_or("Daemon not initialized")?;
        let source = self.source.as_ref().ok_or("Daemon not initialized")?;

        if !store::try_acquire_builder_lock(client)? {
            return Err("Another builder run holds the builder lock; skipping this cycle".into());
        }

        let generation_id = next_generation_id(self.index.snapshot().map(|g| g.id));
        let geocoder = CentroidGeocoder::with_default_radius(self.zips.clone());
        let builder =
            Builder::with_config(self.config.builder.clone(), source, &geocoder, &self.zips);
        let built = builder.run(generation_id);

        match built {
            Ok((generation, report)) => {
                let published = store::publish_generation(client, &generation, &report);
                store::release_builder_lock(client)?;
                published?;

                // Old generations are safe to drop only now that the new
                // one is committed and about to serve.
                store::prune_superseded(client, generation.id)?;
                self.index.install(generation);
                Ok(report)
            }
            Err(e) => {
                store::release_builder_lock(client)?;
                Err(Box::new(e))
            }
        }
    }

    /// Main daemon loop (runs indefinitely)
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        println!("🚀 Starting rebuild loop...");
        println!("   Poll interval: {} minutes", self.config.poll_interval_minutes);
        println!(
            "   Max generation age: {} minutes",
            self.config.max_generation_age_minutes
        );
        println!("   Zip registry: {} zip codes", self.zips.len());

        loop {
            if self.needs_rebuild() {
                match self.rebuild() {
                    Ok(report) => {
                        println!(
                            "✓ Rebuild complete: generation {}, {} of {} records valid ({} dropped), {} zips mapped",
                            report.generation_id,
                            report.valid,
                            report.fetched,
                            report.drops.total(),
                            report.zips_mapped
                        );
                    }
                    Err(e) => {
                        eprintln!("✗ Rebuild failed: {}", e);
                    }
                }
            } else if let Some(age) = self.check_staleness() {
                println!("   Generation fresh ({} min old), no rebuild needed", age.num_minutes());
            }

            std::thread::sleep(std::time::Duration::from_secs(
                self.config.poll_interval_minutes * 60,
            ));
        }
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
