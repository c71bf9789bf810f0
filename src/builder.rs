/// Sensor data builder: turns one raw provider listing into a complete,
/// self-consistent generation.
///
/// A run is a batch job:
/// 1. Fetch the full listing (retried with backoff on transient failure)
/// 2. Validate records, dropping and counting malformed ones
/// 3. Assign each sensor a containing zip via the injected geocoder
/// 4. Rank the nearest sensors for every registry zip, bounded to top-K
/// 5. Emit an immutable `Generation` plus an operator `BuildReport`
///
/// A run that cannot produce a trustworthy generation (fetch exhausted,
/// empty listing, too many invalid records) returns an error and leaves
/// whatever generation is currently being served untouched.

use crate::geo::{coordinate_in_range, haversine_km};
use crate::geocode::Geocoder;
use crate::ingest::{RawSensorRecord, SensorSource};
use crate::model::{
    BuildError, BuildReport, DropCounts, Generation, Sensor, SensorRank, ZipCentroid,
};
use crate::zipcodes::ZipEntry;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::mpsc;
use threadpool::ThreadPool;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Builder configuration
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Ranked sensors kept per zip (default: 10, enough for averaging
    /// a reading over several sensors while bounding mapping size)
    pub top_k: usize,

    /// Sensors beyond this distance from a zip centroid are not
    /// candidates for that zip (default: 50 km)
    pub max_sensor_radius_km: f64,

    /// Abort the run when fewer than this fraction of fetched records
    /// validate (default: 0.5 — stale data beats a corrupt rebuild)
    pub min_valid_fraction: f64,

    /// Listing fetch attempts before giving up (default: 3)
    pub max_fetch_attempts: u32,

    /// Base delay between fetch attempts, doubled each retry (default: 2s)
    pub fetch_backoff_secs: u64,

    /// Worker threads for per-zip ranking (default: 4)
    pub ranking_workers: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            max_sensor_radius_km: 50.0,
            min_valid_fraction: 0.5,
            max_fetch_attempts: 3,
            fetch_backoff_secs: 2,
            ranking_workers: 4,
        }
    }
}

/// Returns the id for the next generation: epoch millis, bumped past
/// the currently served id so the sequence stays monotonic even if the
/// clock steps backwards between runs.
pub fn next_generation_id(previous: Option<i64>) -> i64 {
    let now = Utc::now().timestamp_millis();
    match previous {
        Some(prev) if now <= prev => prev + 1,
        _ => now,
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct Builder<'a> {
    config: BuilderConfig,
    source: &'a dyn SensorSource,
    geocoder: &'a dyn Geocoder,
    zips: &'a [ZipEntry],
}

impl<'a> Builder<'a> {
    pub fn new(
        source: &'a dyn SensorSource,
        geocoder: &'a dyn Geocoder,
        zips: &'a [ZipEntry],
    ) -> Self {
        Self::with_config(BuilderConfig::default(), source, geocoder, zips)
    }

    pub fn with_config(
        config: BuilderConfig,
        source: &'a dyn SensorSource,
        geocoder: &'a dyn Geocoder,
        zips: &'a [ZipEntry],
    ) -> Self {
        Self {
            config,
            source,
            geocoder,
            zips,
        }
    }

    /// Runs one complete build. On success the returned generation is
    /// ready to publish and install; on error nothing was produced.
    pub fn run(&self, generation_id: i64) -> Result<(Generation, BuildReport), BuildError> {
        let (records, fetch_attempts) = self.fetch_with_retry()?;
        if records.is_empty() {
            return Err(BuildError::EmptyListing);
        }

        let fetched = records.len();
        let (sensors, drops) = self.validate(records);
        let valid = sensors.len();

        if (valid as f64) < self.config.min_valid_fraction * (fetched as f64) {
            return Err(BuildError::Aborted {
                valid,
                fetched,
                min_valid_fraction: self.config.min_valid_fraction,
            });
        }

        let mappings = self.rank_all_zips(&sensors);
        let zip_centroids: BTreeMap<String, ZipCentroid> = self
            .zips
            .iter()
            .map(|z| {
                (
                    z.zipcode.clone(),
                    ZipCentroid {
                        latitude: z.latitude,
                        longitude: z.longitude,
                    },
                )
            })
            .collect();

        let report = BuildReport {
            generation_id,
            fetched,
            valid,
            drops,
            zips_mapped: mappings.len(),
            fetch_attempts,
        };

        let generation = Generation {
            id: generation_id,
            built_at: Utc::now(),
            sensors,
            mappings,
            zip_centroids,
        };

        Ok((generation, report))
    }

    /// Fetches the listing, retrying transient failures with doubling
    /// backoff. Returns the records plus the attempt count used.
    fn fetch_with_retry(&self) -> Result<(Vec<RawSensorRecord>, u32), BuildError> {
        let attempts = self.config.max_fetch_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.source.fetch_listing() {
                Ok(records) => return Ok((records, attempt)),
                Err(e) if attempt < attempts => {
                    let backoff = self.config.fetch_backoff_secs << (attempt - 1);
                    println!(
                        "   Listing fetch attempt {}/{} failed ({}), retrying in {}s",
                        attempt, attempts, e, backoff
                    );
                    std::thread::sleep(std::time::Duration::from_secs(backoff));
                }
                Err(e) => {
                    return Err(BuildError::RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }

    /// Per-record validation. Dropping never aborts: each reason is
    /// counted and the record skipped. First occurrence wins on
    /// duplicate ids.
    fn validate(&self, records: Vec<RawSensorRecord>) -> (BTreeMap<String, Sensor>, DropCounts) {
        let mut sensors = BTreeMap::new();
        let mut drops = DropCounts::default();
        let mut seen: HashSet<String> = HashSet::new();
        let provider = self.source.provider().to_string();

        for record in records {
            let Some(sensor_id) = record.sensor_id else {
                drops.missing_id += 1;
                continue;
            };
            let (Some(latitude), Some(longitude)) = (record.latitude, record.longitude) else {
                drops.missing_coordinates += 1;
                continue;
            };
            if !coordinate_in_range(latitude, longitude) {
                drops.out_of_range_coordinates += 1;
                continue;
            }
            let Some(last_seen) = record.last_seen else {
                drops.missing_last_seen += 1;
                continue;
            };
            if !seen.insert(sensor_id.clone()) {
                drops.duplicate_id += 1;
                continue;
            }
            if self.geocoder.zip_for_coordinate(latitude, longitude).is_none() {
                drops.unlocatable += 1;
                continue;
            }

            sensors.insert(
                sensor_id.clone(),
                Sensor {
                    sensor_id,
                    latitude,
                    longitude,
                    provider: provider.clone(),
                    last_seen,
                },
            );
        }

        (sensors, drops)
    }

    /// Ranks the top-K nearest sensors for every registry zip.
    ///
    /// Fanned out over a worker pool purely as an optimization: each
    /// zip's ranking is independent, and collecting the results into a
    /// `BTreeMap` restores a deterministic order regardless of worker
    /// scheduling.
    fn rank_all_zips(&self, sensors: &BTreeMap<String, Sensor>) -> BTreeMap<String, Vec<SensorRank>> {
        let positions: Arc<Vec<(String, f64, f64)>> = Arc::new(
            sensors
                .values()
                .map(|s| (s.sensor_id.clone(), s.latitude, s.longitude))
                .collect(),
        );

        let pool = ThreadPool::new(self.config.ranking_workers.max(1));
        let (tx, rx) = mpsc::channel();

        for zip in self.zips {
            let tx = tx.clone();
            let positions = Arc::clone(&positions);
            let zipcode = zip.zipcode.clone();
            let (lat, lon) = (zip.latitude, zip.longitude);
            let radius = self.config.max_sensor_radius_km;
            let top_k = self.config.top_k;

            pool.execute(move || {
                let ranks = rank_for_centroid(lat, lon, &positions, radius, top_k);
                // Receiver hanging up means the caller is gone; nothing
                // useful to do with the result then.
                let _ = tx.send((zipcode, ranks));
            });
        }
        drop(tx);

        let mut mappings = BTreeMap::new();
        for (zipcode, ranks) in rx {
            if !ranks.is_empty() {
                mappings.insert(zipcode, ranks);
            }
        }
        pool.join();

        mappings
    }
}

/// Ranks sensors by distance from one centroid: nearest first, ties
/// broken by sensor id, truncated to `top_k`, ranks 1-based.
fn rank_for_centroid(
    lat: f64,
    lon: f64,
    positions: &[(String, f64, f64)],
    radius_km: f64,
    top_k: usize,
) -> Vec<SensorRank> {
    let mut candidates: Vec<(f64, &str)> = positions
        .iter()
        .filter_map(|(id, s_lat, s_lon)| {
            let d = haversine_km(lat, lon, *s_lat, *s_lon);
            (d <= radius_km).then_some((d, id.as_str()))
        })
        .collect();

    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    candidates.truncate(top_k);

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, (distance_km, sensor_id))| SensorRank {
            sensor_id: sensor_id.to_string(),
            distance_km,
            rank: (i + 1) as u32,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
