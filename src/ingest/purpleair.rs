/// PurpleAir sensor listing API client.
///
/// Handles URL construction and JSON response parsing for the v1
/// multi-sensor listing endpoint:
///   https://api.purpleair.com/v1/sensors
///
/// The listing is columnar: a `fields` array names the columns and each
/// `data` row is a positional array. See `fixtures.rs` for annotated
/// examples of the response structure.

use crate::ingest::RawSensorRecord;
use crate::model::FetchError;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

/// Listing columns this service requests. Order here is a request
/// preference only; the response's own `fields` array is authoritative
/// for column positions.
pub const LISTING_FIELDS: &[&str] = &["sensor_index", "latitude", "longitude", "last_seen"];

// ---------------------------------------------------------------------------
// Serde structures for the listing envelope
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListingResponse {
    fields: Vec<String>,
    data: Vec<Vec<Value>>,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the listing URL for the given base and field set.
///
/// # Example
/// ```ignore
/// let url = build_listing_url("https://api.purpleair.com", LISTING_FIELDS);
/// ```
pub fn build_listing_url(base_url: &str, fields: &[&str]) -> String {
    let fields_param = urlencoding::encode(&fields.join(",")).into_owned();
    format!(
        "{}/v1/sensors?fields={}&location_type=0",
        base_url.trim_end_matches('/'),
        fields_param
    )
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Fetches one complete listing body. The caller parses separately so
/// test doubles can exercise `parse_listing` without a network.
pub fn fetch_listing(
    client: &reqwest::blocking::Client,
    base_url: &str,
    api_key: &str,
) -> Result<String, FetchError> {
    let url = build_listing_url(base_url, LISTING_FIELDS);

    let response = client
        .get(&url)
        .header("X-API-Key", api_key)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    response.text().map_err(|e| FetchError::Network(e.to_string()))
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses a listing body into raw records, one per `data` row.
///
/// Only envelope-level problems fail the call: unparseable JSON, or a
/// `fields` array that doesn't name a `sensor_index` column. Individual
/// rows with missing or mistyped cells come back with `None` fields and
/// are counted and dropped by the builder.
pub fn parse_listing(json: &str) -> Result<Vec<RawSensorRecord>, FetchError> {
    let response: ListingResponse = serde_json::from_str(json)
        .map_err(|e| FetchError::Malformed(format!("JSON deserialization failed: {}", e)))?;

    let col = |name: &str| response.fields.iter().position(|f| f == name);

    // Without a sensor_index column no row can be identified at all.
    let id_col = col("sensor_index")
        .ok_or_else(|| FetchError::Malformed("listing has no sensor_index column".to_string()))?;
    let lat_col = col("latitude");
    let lon_col = col("longitude");
    let seen_col = col("last_seen");

    let mut records = Vec::with_capacity(response.data.len());

    for row in &response.data {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i));

        // sensor_index arrives as a JSON number; tolerate strings too.
        let sensor_id = cell(Some(id_col)).and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        });

        let latitude = cell(lat_col).and_then(Value::as_f64);
        let longitude = cell(lon_col).and_then(Value::as_f64);

        // last_seen is epoch seconds; anything unrepresentable is
        // treated as absent.
        let last_seen = cell(seen_col)
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        records.push(RawSensorRecord {
            sensor_id,
            latitude,
            longitude,
            last_seen,
        });
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
