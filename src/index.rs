/// Sensor index: the read path answering "which sensors should be
/// queried for this zip code, in what order?"
///
/// ## Architecture: atomically-swapped immutable snapshot
///
/// The serving generation lives behind `RwLock<Option<Arc<Generation>>>`.
/// A query dereferences the pointer exactly once, then works on its own
/// `Arc` for the rest of the call — so a rebuild swap can land mid-query
/// without the reader ever seeing a mix of old and new data. Readers
/// that started before a swap finish on the prior generation; readers
/// after it see the new one. Either is acceptable; a partially-written
/// generation is not representable.

use crate::geo::haversine_km;
use crate::model::{Generation, QueryError, Sensor, ZipCode};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Query-path configuration
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Serving generation older than this is reported stale
    /// (default: 1440 minutes — sensor positions change slowly,
    /// a daily rebuild keeps the index fresh)
    pub max_generation_age_minutes: i64,

    /// Widening rings for zips without a direct mapping, kilometres.
    /// The search expands one ring at a time instead of scanning the
    /// whole sensor set; the final ring caps how far an answer may
    /// travel from the requested zip.
    pub widen_steps_km: Vec<f64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_generation_age_minutes: 24 * 60,
            widen_steps_km: vec![10.0, 25.0, 50.0, 100.0, 150.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution result
// ---------------------------------------------------------------------------

/// One sensor in a resolution, with its ranking metadata.
#[derive(Debug, Clone)]
pub struct ResolvedSensor {
    pub sensor: Sensor,
    /// Distance from the answering zip's centroid, kilometres.
    pub distance_km: f64,
    pub rank: u32,
}

/// Successful answer to a `resolve` call.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The zip code that was asked about.
    pub zipcode: String,
    /// Set when the answer came from a neighboring zip's mapping via
    /// radius widening; `None` for a direct hit.
    pub via_zipcode: Option<String>,
    /// Ranked sensors, nearest first, no duplicates.
    pub sensors: Vec<ResolvedSensor>,
    pub generation_id: i64,
    pub generation_age: chrono::Duration,
    /// Cooperative staleness signal: callers seeing this should queue a
    /// rebuild, but the data is still served.
    pub stale: bool,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

pub struct SensorIndex {
    config: IndexConfig,
    current: RwLock<Option<Arc<Generation>>>,
}

impl SensorIndex {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
        }
    }

    /// Publishes a generation as the serving snapshot. In-flight
    /// queries keep the `Arc` they already dereferenced; the previous
    /// generation is freed once the last such reader finishes.
    pub fn install(&self, generation: Generation) {
        let snapshot = Some(Arc::new(generation));
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            // A poisoned lock only means a reader panicked mid-clone;
            // the pointer itself is still sound to replace.
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// The serving generation, dereferenced once. Everything a caller
    /// does with the returned `Arc` is consistent even across a swap.
    pub fn snapshot(&self) -> Option<Arc<Generation>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Age of the serving generation, or `None` before the first install.
    pub fn current_generation_age(&self) -> Option<chrono::Duration> {
        self.snapshot().map(|g| g.age(Utc::now()))
    }

    /// True when a rebuild should be queued: no generation yet, or the
    /// serving one has outlived the configured max age.
    pub fn is_stale(&self) -> bool {
        match self.current_generation_age() {
            None => true,
            Some(age) => age.num_minutes() > self.config.max_generation_age_minutes,
        }
    }

    /// Resolves a zip code to its ranked sensor list.
    pub fn resolve(&self, raw_zipcode: &str) -> Result<Resolution, QueryError> {
        self.resolve_at(raw_zipcode, Utc::now())
    }

    /// `resolve` with an explicit clock, so staleness is testable.
    pub fn resolve_at(
        &self,
        raw_zipcode: &str,
        now: DateTime<Utc>,
    ) -> Result<Resolution, QueryError> {
        let zip = ZipCode::parse(raw_zipcode)?;

        let Some(generation) = self.snapshot() else {
            // Nothing installed yet: valid query, no data.
            return Err(QueryError::NotFound(zip.to_string()));
        };

        if generation.mappings.contains_key(zip.as_str()) {
            return Ok(self.resolution(&generation, zip.as_str(), None, now));
        }

        // No direct mapping. If the zip is at least known to the
        // generation, widen the search ring by ring over mapped zips.
        let Some(centroid) = generation.zip_centroids.get(zip.as_str()) else {
            return Err(QueryError::NotFound(zip.to_string()));
        };

        let mut neighbors: Vec<(f64, &String)> = generation
            .mappings
            .keys()
            .filter_map(|other| {
                let other_centroid = generation.zip_centroids.get(other)?;
                let d = haversine_km(
                    centroid.latitude,
                    centroid.longitude,
                    other_centroid.latitude,
                    other_centroid.longitude,
                );
                Some((d, other))
            })
            .collect();
        neighbors.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        for ring_km in &self.config.widen_steps_km {
            if let Some((_, neighbor)) = neighbors.iter().find(|(d, _)| d <= ring_km) {
                let mut resolution = self.resolution(&generation, neighbor.as_str(), None, now);
                resolution.zipcode = zip.to_string();
                resolution.via_zipcode = Some((*neighbor).clone());
                return Ok(resolution);
            }
        }

        Err(QueryError::NotFound(zip.to_string()))
    }

    /// Assembles a resolution from one zip's mapping within a single
    /// generation snapshot.
    fn resolution(
        &self,
        generation: &Generation,
        zip: &str,
        via_zipcode: Option<String>,
        now: DateTime<Utc>,
    ) -> Resolution {
        let ranked = generation
            .mappings
            .get(zip)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let sensors = ranked
            .iter()
            .filter_map(|r| {
                generation.sensors.get(&r.sensor_id).map(|sensor| ResolvedSensor {
                    sensor: sensor.clone(),
                    distance_km: r.distance_km,
                    rank: r.rank,
                })
            })
            .collect();

        let age = generation.age(now);
        Resolution {
            zipcode: zip.to_string(),
            via_zipcode,
            sensors,
            generation_id: generation.id,
            generation_age: age,
            stale: age.num_minutes() > self.config.max_generation_age_minutes,
        }
    }
}

impl Default for SensorIndex {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SensorRank, ZipCentroid};
    use std::collections::BTreeMap;

    /// Hand-built generation: sensors stacked north of the 94110
    /// centroid, plus an unmapped-but-known 94121 and a far-away
    /// mapped 97204.
    fn generation_fixture(id: i64, provider: &str) -> Generation {
        let mut sensors = BTreeMap::new();
        let mut mappings = BTreeMap::new();
        let mut zip_centroids = BTreeMap::new();

        let mk = |sid: &str, lat: f64, lon: f64| Sensor {
            sensor_id: sid.to_string(),
            latitude: lat,
            longitude: lon,
            provider: provider.to_string(),
            last_seen: Utc::now(),
        };

        for (sid, lat) in [("s1", 37.7528), ("s2", 37.7644), ("s3", 37.8209)] {
            sensors.insert(sid.to_string(), mk(sid, lat, -122.4156));
        }
        sensors.insert("p1".to_string(), mk("p1", 45.5200, -122.6750));

        mappings.insert(
            "94110".to_string(),
            vec![
                SensorRank { sensor_id: "s1".to_string(), distance_km: 0.48, rank: 1 },
                SensorRank { sensor_id: "s2".to_string(), distance_km: 1.77, rank: 2 },
                SensorRank { sensor_id: "s3".to_string(), distance_km: 8.05, rank: 3 },
            ],
        );
        mappings.insert(
            "97204".to_string(),
            vec![SensorRank { sensor_id: "p1".to_string(), distance_km: 0.2, rank: 1 }],
        );

        zip_centroids.insert("94110".to_string(), ZipCentroid { latitude: 37.7485, longitude: -122.4156 });
        // Known but unmapped: the Richmond, ~6.6 km from the Mission.
        zip_centroids.insert("94121".to_string(), ZipCentroid { latitude: 37.7786, longitude: -122.4892 });
        zip_centroids.insert("97204".to_string(), ZipCentroid { latitude: 45.5184, longitude: -122.6740 });
        // Known, unmapped, and beyond the widening cap from anything mapped.
        zip_centroids.insert("59715".to_string(), ZipCentroid { latitude: 45.6793, longitude: -111.0466 });

        Generation {
            id,
            built_at: Utc::now(),
            sensors,
            mappings,
            zip_centroids,
        }
    }

    fn index_with_fixture() -> SensorIndex {
        let index = SensorIndex::new();
        index.install(generation_fixture(1, "purpleair"));
        index
    }

    #[test]
    fn test_resolve_before_first_install_is_not_found() {
        let index = SensorIndex::new();
        let result = index.resolve("94110");
        assert!(
            matches!(result, Err(QueryError::NotFound(ref zip)) if zip == "94110"),
            "empty index must answer NotFound, got {:?}",
            result.map(|r| r.generation_id)
        );
    }

    #[test]
    fn test_resolve_direct_hit_is_nearest_first_and_duplicate_free() {
        let index = index_with_fixture();
        let resolution = index.resolve("94110").expect("mapped zip should resolve");

        assert_eq!(resolution.generation_id, 1);
        assert_eq!(resolution.via_zipcode, None);

        let ids: Vec<_> = resolution.sensors.iter().map(|s| s.sensor.sensor_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"], "nearest first, rank order");

        for pair in resolution.sensors.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
    }

    #[test]
    fn test_resolve_rejects_malformed_zip() {
        let index = index_with_fixture();
        for bad in ["0000", "123456", "94i10", ""] {
            assert!(
                matches!(index.resolve(bad), Err(QueryError::InvalidZipCode(_))),
                "{:?} should be rejected before touching the snapshot",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_unknown_zip_is_not_found() {
        let index = index_with_fixture();
        assert!(
            matches!(index.resolve("99999"), Err(QueryError::NotFound(_))),
            "valid format but never-seen zip is NotFound"
        );
    }

    #[test]
    fn test_resolve_widens_to_nearest_mapped_neighbor() {
        let index = index_with_fixture();
        let resolution = index.resolve("94121").expect("known zip should widen");

        assert_eq!(resolution.zipcode, "94121", "result is labeled with the asked zip");
        assert_eq!(
            resolution.via_zipcode.as_deref(),
            Some("94110"),
            "the Mission is the nearest mapped neighbor"
        );
        assert!(!resolution.sensors.is_empty());
    }

    #[test]
    fn test_resolve_does_not_widen_past_the_cap() {
        let index = index_with_fixture();
        // Bozeman, MT: known centroid, nearest mapped zip ~900 km away.
        assert!(
            matches!(index.resolve("59715"), Err(QueryError::NotFound(_))),
            "widening must stop at the final ring"
        );
    }

    #[test]
    fn test_resolution_reports_generation_age_and_staleness() {
        let index = index_with_fixture();
        let now = Utc::now();

        let fresh = index.resolve_at("94110", now).expect("resolves");
        assert!(!fresh.stale, "a just-built generation is fresh");

        let later = now + chrono::Duration::hours(25);
        let aged = index.resolve_at("94110", later).expect("still resolves");
        assert!(aged.stale, "25h-old generation exceeds the 24h default");
        assert!(aged.generation_age.num_hours() >= 25);
    }

    #[test]
    fn test_is_stale_before_install_and_after_swap() {
        let index = SensorIndex::new();
        assert!(index.is_stale(), "empty index always wants a rebuild");

        index.install(generation_fixture(1, "purpleair"));
        assert!(!index.is_stale(), "freshly installed generation is not stale");
        assert!(index.current_generation_age().is_some());
    }

    #[test]
    fn test_swap_replaces_the_whole_generation() {
        let index = index_with_fixture();
        let mut next = generation_fixture(2, "purpleair");
        next.mappings.remove("97204");
        index.install(next);

        assert_eq!(index.resolve("94110").expect("still mapped").generation_id, 2);
        // 97204 is still a known centroid, so it now answers via widening
        // or not at all — but never from the discarded generation.
        if let Ok(resolution) = index.resolve("97204") {
            assert_eq!(resolution.generation_id, 2);
        }
    }

    #[test]
    fn test_concurrent_readers_never_observe_a_mixed_generation() {
        // Generation 1 uses sensor ids s*/p1; generation 2 uses n*.
        let index = Arc::new(index_with_fixture());

        let mut sensors = BTreeMap::new();
        for (sid, lat) in [("n1", 37.7528), ("n2", 37.7644)] {
            sensors.insert(
                sid.to_string(),
                Sensor {
                    sensor_id: sid.to_string(),
                    latitude: lat,
                    longitude: -122.4156,
                    provider: "purpleair".to_string(),
                    last_seen: Utc::now(),
                },
            );
        }
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "94110".to_string(),
            vec![
                SensorRank { sensor_id: "n1".to_string(), distance_km: 0.48, rank: 1 },
                SensorRank { sensor_id: "n2".to_string(), distance_km: 1.77, rank: 2 },
            ],
        );
        let mut zip_centroids = BTreeMap::new();
        zip_centroids.insert("94110".to_string(), ZipCentroid { latitude: 37.7485, longitude: -122.4156 });
        let next = Generation {
            id: 2,
            built_at: Utc::now(),
            sensors,
            mappings,
            zip_centroids,
        };

        std::thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let index = Arc::clone(&index);
                    scope.spawn(move || {
                        for _ in 0..500 {
                            let resolution = index.resolve("94110").expect("always mapped");
                            let expect_prefix = match resolution.generation_id {
                                1 => 's',
                                2 => 'n',
                                other => panic!("unexpected generation id {}", other),
                            };
                            for s in &resolution.sensors {
                                assert!(
                                    s.sensor.sensor_id.starts_with(expect_prefix),
                                    "sensor {} does not belong to generation {}",
                                    s.sensor.sensor_id,
                                    resolution.generation_id
                                );
                            }
                        }
                    })
                })
                .collect();

            index.install(next);

            for reader in readers {
                reader.join().expect("reader thread should not panic");
            }
        });
    }
}
