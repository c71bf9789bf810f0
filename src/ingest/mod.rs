/// Sensor listing ingest.
///
/// Submodules:
/// - `purpleair` — PurpleAir /v1/sensors listing: URL construction + parsing
/// - `fixtures` (test only) — representative listing payloads
///
/// The builder never talks to a provider directly; it consumes the
/// `SensorSource` trait, so production fetches over HTTP while tests
/// inject canned payloads.

use crate::model::FetchError;
use chrono::{DateTime, Utc};

pub mod purpleair;

#[cfg(test)]
pub mod fixtures;

/// One row of the provider listing before validation.
///
/// Every field is optional: the listing is allowed to contain partial
/// records, and deciding what to do with them (drop and count) is the
/// builder's job, not the parser's.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSensorRecord {
    pub sensor_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Capability interface for obtaining the full sensor listing.
pub trait SensorSource {
    /// Fetches and parses one complete listing. Transport and
    /// envelope-level failures surface as `FetchError`; per-record
    /// problems come back as partial `RawSensorRecord`s.
    fn fetch_listing(&self) -> Result<Vec<RawSensorRecord>, FetchError>;

    /// Provider name recorded on every sensor from this source.
    fn provider(&self) -> &str;
}

/// Production source: the PurpleAir listing endpoint over HTTPS.
pub struct HttpSensorSource {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HttpSensorSource {
    pub fn new(client: reqwest::blocking::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl SensorSource for HttpSensorSource {
    fn fetch_listing(&self) -> Result<Vec<RawSensorRecord>, FetchError> {
        let body = purpleair::fetch_listing(&self.client, &self.base_url, &self.api_key)?;
        purpleair::parse_listing(&body)
    }

    fn provider(&self) -> &str {
        "purpleair"
    }
}
