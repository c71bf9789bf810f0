/// Zip assignment for sensor coordinates.
///
/// Real reverse geocoding is an external service. The builder only
/// depends on the `Geocoder` trait, so production can plug in whatever
/// boundary service exists while tests inject fixed fixtures. The
/// default implementation approximates containment by nearest registry
/// centroid within a bounded radius, which is accurate enough for
/// sensor-to-zip assignment at metro scale.

use crate::geo::haversine_km;
use crate::zipcodes::ZipEntry;

/// Capability interface for locating a coordinate inside a zip code.
pub trait Geocoder {
    /// Returns the zip code containing the coordinate, or `None` when
    /// the point falls outside known coverage.
    fn zip_for_coordinate(&self, latitude: f64, longitude: f64) -> Option<String>;
}

/// Nearest-centroid approximation backed by the zip registry.
pub struct CentroidGeocoder {
    entries: Vec<ZipEntry>,
    /// A coordinate further than this from every centroid is outside
    /// the service area.
    max_assign_radius_km: f64,
}

impl CentroidGeocoder {
    pub const DEFAULT_ASSIGN_RADIUS_KM: f64 = 25.0;

    pub fn new(entries: Vec<ZipEntry>, max_assign_radius_km: f64) -> Self {
        Self {
            entries,
            max_assign_radius_km,
        }
    }

    pub fn with_default_radius(entries: Vec<ZipEntry>) -> Self {
        Self::new(entries, Self::DEFAULT_ASSIGN_RADIUS_KM)
    }
}

impl Geocoder for CentroidGeocoder {
    fn zip_for_coordinate(&self, latitude: f64, longitude: f64) -> Option<String> {
        let mut best: Option<(f64, &str)> = None;

        for entry in &self.entries {
            let d = haversine_km(latitude, longitude, entry.latitude, entry.longitude);
            if d > self.max_assign_radius_km {
                continue;
            }
            // Tie-break on zip code so assignment is deterministic.
            let closer = match best {
                None => true,
                Some((best_d, best_zip)) => {
                    d < best_d || (d == best_d && entry.zipcode.as_str() < best_zip)
                }
            };
            if closer {
                best = Some((d, &entry.zipcode));
            }
        }

        best.map(|(_, zip)| zip.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
