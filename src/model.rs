/// Shared data types for the zip-code sensor index service.
///
/// Everything downstream of the builder works in terms of these types:
/// a `Generation` is one complete, immutable build output, and the
/// error enums here are the full failure taxonomy of the service.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Core records
// ---------------------------------------------------------------------------

/// A single air-quality sensor as recorded in a generation.
///
/// Immutable once written into a generation; a rebuild replaces the
/// whole sensor set rather than patching individual records.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    /// Provider-assigned identifier (PurpleAir `sensor_index`, stringified).
    pub sensor_id: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Upstream provider name, e.g. "purpleair".
    pub provider: String,
    /// Last time the provider saw this sensor online.
    pub last_seen: DateTime<Utc>,
}

/// A normalized 5-digit zip code.
///
/// Construction goes through `parse`, so any `ZipCode` in the system
/// is known to be exactly five ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZipCode(String);

impl ZipCode {
    /// Validates and normalizes caller input. Leading/trailing whitespace
    /// is tolerated; anything other than exactly five ASCII digits fails
    /// with `QueryError::InvalidZipCode`.
    pub fn parse(raw: &str) -> Result<ZipCode, QueryError> {
        let trimmed = raw.trim();
        if trimmed.len() == 5 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            Ok(ZipCode(trimmed.to_string()))
        } else {
            Err(QueryError::InvalidZipCode(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a zip's ranked sensor list.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRank {
    pub sensor_id: String,
    /// Haversine distance from the zip centroid, kilometres.
    pub distance_km: f64,
    /// 1-based position in the ranking (1 = nearest).
    pub rank: u32,
}

/// Representative coordinate for a zip code, taken from the registry
/// the generation was built against.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipCentroid {
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// One complete, immutable output of a builder run.
///
/// `BTreeMap` keys keep iteration order deterministic, so two runs over
/// identical input produce generations whose content compares equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Monotonically increasing id (epoch millis, clamped past the
    /// previously served generation if the clock regresses).
    pub id: i64,
    pub built_at: DateTime<Utc>,
    /// All sensors that survived validation, keyed by sensor id.
    pub sensors: BTreeMap<String, Sensor>,
    /// Zip code -> ranked sensor list, nearest first. Only zips with at
    /// least one sensor in range appear here.
    pub mappings: BTreeMap<String, Vec<SensorRank>>,
    /// Centroids of every zip the generation was built against,
    /// mapped or not. Needed for query-time radius widening.
    pub zip_centroids: BTreeMap<String, ZipCentroid>,
}

impl Generation {
    /// Content equality: same sensors, mappings, and centroids.
    /// Generation id and build timestamp are deliberately excluded —
    /// two runs over identical input are content-equal but never share
    /// an id.
    pub fn content_matches(&self, other: &Generation) -> bool {
        self.sensors == other.sensors
            && self.mappings == other.mappings
            && self.zip_centroids == other.zip_centroids
    }

    /// Age of this generation relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.built_at
    }
}

// ---------------------------------------------------------------------------
// Build accounting
// ---------------------------------------------------------------------------

/// Per-reason counters for records dropped during validation.
/// Dropping never aborts a run by itself; the counts feed the abort
/// ratio check and the operator report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropCounts {
    pub missing_id: usize,
    pub missing_coordinates: usize,
    pub out_of_range_coordinates: usize,
    pub duplicate_id: usize,
    pub missing_last_seen: usize,
    /// Valid coordinates, but no known zip within the assignment radius
    /// (sensor outside the service area).
    pub unlocatable: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.missing_id
            + self.missing_coordinates
            + self.out_of_range_coordinates
            + self.duplicate_id
            + self.missing_last_seen
            + self.unlocatable
    }
}

/// Operator-facing summary of one builder run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub generation_id: i64,
    /// Raw records in the provider listing.
    pub fetched: usize,
    /// Records that survived validation and zip assignment.
    pub valid: usize,
    pub drops: DropCounts,
    /// Zips that ended up with a non-empty sensor ranking.
    pub zips_mapped: usize,
    /// Listing fetch attempts used (1 = first try succeeded).
    pub fetch_attempts: u32,
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Transient listing fetch failure. Retried with backoff by the builder
/// before escalating to `BuildError::RetriesExhausted`.
#[derive(Debug)]
pub enum FetchError {
    /// Connection/transport failure.
    Network(String),
    /// Non-200 response from the provider.
    Status(u16),
    /// Response body did not match the expected listing envelope.
    Malformed(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error fetching listing: {}", msg),
            FetchError::Status(code) => write!(f, "unexpected HTTP status {} from provider", code),
            FetchError::Malformed(msg) => write!(f, "malformed sensor listing: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// A builder run that ended without publishing a generation.
#[derive(Debug)]
pub enum BuildError {
    /// Every fetch attempt failed; the last error is preserved.
    RetriesExhausted { attempts: u32, last: FetchError },
    /// The provider returned an empty listing. Treated like an abort:
    /// stale-but-valid data beats an empty index.
    EmptyListing,
    /// Too many records failed validation, so the run was discarded.
    Aborted {
        valid: usize,
        fetched: usize,
        min_valid_fraction: f64,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::RetriesExhausted { attempts, last } => {
                write!(f, "listing fetch failed after {} attempts: {}", attempts, last)
            }
            BuildError::EmptyListing => {
                write!(f, "provider returned an empty sensor listing; build discarded")
            }
            BuildError::Aborted {
                valid,
                fetched,
                min_valid_fraction,
            } => write!(
                f,
                "build aborted: only {} of {} records valid (minimum fraction {})",
                valid, fetched, min_valid_fraction
            ),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

/// Query-time errors. These are caller input/coverage outcomes, not
/// system failures, and are never logged as such.
#[derive(Debug, PartialEq)]
pub enum QueryError {
    /// Input was not a normalized 5-digit zip code.
    InvalidZipCode(String),
    /// Valid zip format, but no data: either the zip is unknown to the
    /// serving generation or widening found no mapped neighbor.
    NotFound(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidZipCode(raw) => write!(f, "invalid zip code {:?}", raw),
            QueryError::NotFound(zip) => write!(f, "no sensor data for zip code {}", zip),
        }
    }
}

impl std::error::Error for QueryError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
