/// Geographic primitives: great-circle distance over WGS84 coordinates.
///
/// All distances in this crate are haversine kilometres. The builder
/// ranks sensors per zip with these, and the index reuses them for
/// query-time radius widening.

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two WGS84 coordinates, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// True when a coordinate pair is a plausible WGS84 position.
/// NaN fails every comparison, so non-finite input is rejected too.
pub fn coordinate_in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_for_identical_points() {
        let d = haversine_km(37.7749, -122.4194, 37.7749, -122.4194);
        assert!(d.abs() < 1e-9, "same point should be 0 km apart, got {}", d);
    }

    #[test]
    fn test_haversine_san_francisco_to_los_angeles() {
        // SF city hall to LA city hall is roughly 559 km great-circle.
        let d = haversine_km(37.7793, -122.4193, 34.0537, -118.2427);
        assert!(
            (d - 559.0).abs() < 5.0,
            "SF-LA should be ~559 km, got {}",
            d
        );
    }

    #[test]
    fn test_haversine_short_urban_distance() {
        // Two points ~1.1 km apart in San Francisco (Mission to Castro).
        let d = haversine_km(37.7599, -122.4148, 37.7609, -122.4350);
        assert!(
            d > 1.5 && d < 2.0,
            "cross-neighborhood distance should be under 2 km, got {}",
            d
        );
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = haversine_km(45.5152, -122.6784, 47.6062, -122.3321);
        let b = haversine_km(47.6062, -122.3321, 45.5152, -122.6784);
        assert!((a - b).abs() < 1e-9, "distance must not depend on argument order");
    }

    #[test]
    fn test_coordinate_range_accepts_valid_extremes() {
        assert!(coordinate_in_range(90.0, 180.0));
        assert!(coordinate_in_range(-90.0, -180.0));
        assert!(coordinate_in_range(0.0, 0.0));
    }

    #[test]
    fn test_coordinate_range_rejects_out_of_bounds_and_nan() {
        assert!(!coordinate_in_range(90.1, 0.0));
        assert!(!coordinate_in_range(0.0, -180.5));
        assert!(!coordinate_in_range(f64::NAN, 0.0));
        assert!(!coordinate_in_range(0.0, f64::NAN));
    }
}
