/// airq_index: zip-code to air-quality-sensor index service.
///
/// # Module structure
///
/// ```text
/// airq_index
/// ├── model       — shared data types (Sensor, Generation, BuildError, …)
/// ├── geo         — haversine distance over WGS84 coordinates
/// ├── zipcodes    — zip registry loader (zipcodes.toml)
/// ├── geocode     — zip assignment capability (trait + centroid impl)
/// ├── ingest
/// │   ├── purpleair — PurpleAir /v1/sensors listing: URL construction + parsing
/// │   └── fixtures (test only) — representative listing payloads
/// ├── builder     — batch build: fetch, validate, rank top-K sensors per zip
/// ├── index       — query path: atomically-swapped generation snapshot
/// ├── store       — PostgreSQL persistence + advisory builder lock
/// ├── daemon      — staleness-driven rebuild loop
/// └── endpoint    — operator diagnostics HTTP API
/// ```

/// Public modules
pub mod builder;
pub mod daemon;
pub mod endpoint;
pub mod geo;
pub mod geocode;
pub mod index;
pub mod ingest;
pub mod model;
pub mod store;
pub mod zipcodes;
