/// HTTP endpoint for operator diagnostics
///
/// Provides a small JSON API for operators and monitoring to inspect
/// the serving generation and spot-check resolutions. This is not the
/// end-user API: the SMS/web layer talks to the index in-process.
///
/// Endpoints:
/// - GET /health - Service health check
/// - GET /status - Serving generation id, age, staleness, counts
/// - GET /resolve/{zip_code} - Diagnostic zip resolution

use crate::index::{Resolution, SensorIndex};
use crate::model::QueryError;
use serde::Serialize;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Serving generation summary for /status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub serving: bool,
    pub generation_id: Option<i64>,
    pub built_at: Option<String>,
    pub age_minutes: Option<i64>,
    pub stale: bool,
    pub sensors: usize,
    pub zips_mapped: usize,
    pub zips_known: usize,
}

/// One ranked sensor in a /resolve response
#[derive(Debug, Serialize)]
pub struct ResolvedSensorData {
    pub sensor_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub provider: String,
    pub last_seen: String,
    pub distance_km: f64,
    pub rank: u32,
}

/// Full /resolve response
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub zipcode: String,
    /// Present when the answer was widened from a neighboring zip.
    pub via_zipcode: Option<String>,
    pub generation_id: i64,
    pub generation_age_minutes: i64,
    pub stale: bool,
    pub sensors: Vec<ResolvedSensorData>,
}

/// Convert an in-process resolution to its JSON form
fn resolution_to_response(resolution: &Resolution) -> ResolveResponse {
    ResolveResponse {
        zipcode: resolution.zipcode.clone(),
        via_zipcode: resolution.via_zipcode.clone(),
        generation_id: resolution.generation_id,
        generation_age_minutes: resolution.generation_age.num_minutes(),
        stale: resolution.stale,
        sensors: resolution
            .sensors
            .iter()
            .map(|s| ResolvedSensorData {
                sensor_id: s.sensor.sensor_id.clone(),
                latitude: s.sensor.latitude,
                longitude: s.sensor.longitude,
                provider: s.sensor.provider.clone(),
                last_seen: s.sensor.last_seen.to_rfc3339(),
                distance_km: s.distance_km,
                rank: s.rank,
            })
            .collect(),
    }
}

fn status_response(index: &SensorIndex) -> StatusResponse {
    match index.snapshot() {
        Some(generation) => StatusResponse {
            serving: true,
            generation_id: Some(generation.id),
            built_at: Some(generation.built_at.to_rfc3339()),
            age_minutes: index.current_generation_age().map(|a| a.num_minutes()),
            stale: index.is_stale(),
            sensors: generation.sensors.len(),
            zips_mapped: generation.mappings.len(),
            zips_known: generation.zip_centroids.len(),
        },
        None => StatusResponse {
            serving: false,
            generation_id: None,
            built_at: None,
            age_minutes: None,
            stale: true,
            sensors: 0,
            zips_mapped: 0,
            zips_known: 0,
        },
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port
pub fn start_endpoint_server(port: u16, index: Arc<SensorIndex>) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    println!("📡 HTTP endpoint listening on http://0.0.0.0:{}", port);
    println!("   GET /status - Serving generation summary");
    println!("   GET /resolve/{{zip_code}} - Diagnostic zip resolution");
    println!("   GET /health - Service health check\n");

    for request in server.incoming_requests() {
        let url = request.url();

        let response = if url == "/health" {
            handle_health()
        } else if url == "/status" {
            create_response(200, serde_json::to_value(status_response(&index)).unwrap())
        } else if let Some(zipcode) = url.strip_prefix("/resolve/") {
            handle_resolve(&index, zipcode)
        } else {
            create_response(
                404,
                serde_json::json!({
                    "error": "Not found",
                    "available_endpoints": ["/health", "/status", "/resolve/{zip_code}"]
                }),
            )
        };

        if let Err(e) = request.respond(response) {
            eprintln!("Failed to send response: {}", e);
        }
    }

    Ok(())
}

/// Handle /health endpoint
fn handle_health() -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    create_response(
        200,
        serde_json::json!({
            "status": "ok",
            "service": "airq_index",
            "version": "0.1.0"
        }),
    )
}

/// Handle /resolve/{zip_code} endpoint
fn handle_resolve(
    index: &SensorIndex,
    zipcode: &str,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    match index.resolve(zipcode) {
        Ok(resolution) => create_response(
            200,
            serde_json::to_value(resolution_to_response(&resolution)).unwrap(),
        ),
        Err(e @ QueryError::InvalidZipCode(_)) => create_response(
            400,
            serde_json::json!({
                "error": e.to_string(),
                "zipcode": zipcode
            }),
        ),
        Err(e @ QueryError::NotFound(_)) => create_response(
            404,
            serde_json::json!({
                "error": e.to_string(),
                "zipcode": zipcode
            }),
        ),
    }
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(&json).unwrap();
    let bytes = body.into_bytes();

    tiny_http::Response::from_data(bytes)
        .with_status_code(tiny_http::StatusCode::from(status_code))
        .with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
