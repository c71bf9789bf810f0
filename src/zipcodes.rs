/// Zip registry loader - parses zipcodes.toml
///
/// The registry is the single source of truth for which zip codes the
/// service knows about and where their centroids sit. Keeping it in a
/// data file means coverage can grow without recompiling the service.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// One zip code entry loaded from zipcodes.toml
#[derive(Debug, Clone, Deserialize)]
pub struct ZipEntry {
    /// Normalized 5-digit zip code.
    pub zipcode: String,
    /// City name, used in operator-facing output only.
    pub city: String,

    // Representative centroid for distance computation
    pub latitude: f64,
    pub longitude: f64,
}

/// Root structure for TOML parsing
#[derive(Debug, Deserialize)]
struct ZipRegistry {
    zipcode: Vec<ZipEntry>,
}

/// Loads the zip registry from zipcodes.toml.
///
/// # Panics
/// Panics if the registry file is missing, malformed, or contains
/// invalid data. This is intentional — the service cannot operate
/// without knowing its zip coverage.
///
/// # File Location
/// Expects `zipcodes.toml` in the current working directory (project
/// root when running via `cargo run`).
pub fn load_registry() -> Vec<ZipEntry> {
    let registry_path = "zipcodes.toml";

    let contents = fs::read_to_string(registry_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", registry_path, e));

    parse_registry(&contents)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {}", registry_path, e))
}

/// Parses registry TOML content. Split out from `load_registry` so
/// callers with in-memory content (tests, tooling) can reuse it.
pub fn parse_registry(contents: &str) -> Result<Vec<ZipEntry>, toml::de::Error> {
    let registry: ZipRegistry = toml::from_str(contents)?;
    Ok(registry.zipcode)
}

/// Loads the registry and builds a lookup map keyed by zip code.
pub fn load_registry_map() -> HashMap<String, ZipEntry> {
    load_registry()
        .into_iter()
        .map(|z| (z.zipcode.clone(), z))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
