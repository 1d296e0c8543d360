use glam::DVec3;
use thiserror::Error;

/// WGS-84 semi-major axis in meters
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 first eccentricity squared
pub const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// Mean Earth radius (IUGG) in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
pub const KM_PER_NM: f64 = 1.852;
/// One degree of arc is roughly sixty nautical miles
pub const NM_PER_DEGREE: f64 = 60.0;

const MAX_ITERATIONS: u32 = 64;
const CONVERGENCE_RAD: f64 = 1e-12;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GeodesyError {
    #[error("geodetic latitude did not converge after {iterations} iterations")]
    NoConvergence { iterations: u32 },
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Earth-centered, Earth-fixed position in meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EcefPosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Convert ECEF meters to geodetic lon/lat on WGS-84.
///
/// Latitude is solved by fixed-point iteration seeded from the spherical
/// estimate. The loop is capped; inputs that never settle (NaN, infinities)
/// come back as [`GeodesyError::NoConvergence`].
pub fn ecef_to_geodetic(pos: EcefPosition) -> Result<GeoPoint, GeodesyError> {
    let EcefPosition { x, y, z } = pos;
    let lon = y.atan2(x);
    let p = x.hypot(y);

    // On the polar axis the iteration degenerates; the answer is exact.
    if p == 0.0 && z.is_finite() {
        let lat = if z > 0.0 {
            90.0
        } else if z < 0.0 {
            -90.0
        } else {
            0.0
        };
        return Ok(GeoPoint::new(lon.to_degrees(), lat));
    }

    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..MAX_ITERATIONS {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let next = (z + WGS84_E2 * n * sin_lat).atan2(p);
        if (next - lat).abs() <= CONVERGENCE_RAD {
            return Ok(GeoPoint::new(lon.to_degrees(), next.to_degrees()));
        }
        lat = next;
    }

    Err(GeodesyError::NoConvergence {
        iterations: MAX_ITERATIONS,
    })
}

/// Convert geodetic degrees plus ellipsoidal height (meters) to ECEF
pub fn geodetic_to_ecef(lat: f64, lon: f64, height: f64) -> EcefPosition {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    EcefPosition::new(
        (n + height) * cos_lat * cos_lon,
        (n + height) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + height) * sin_lat,
    )
}

/// Great-circle distance in nautical miles
pub fn haversine_nm(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c / KM_PER_NM
}

/// Direction from the Earth's center through (lon, lat) on the unit sphere
#[inline(always)]
pub fn unit_vector(p: GeoPoint) -> DVec3 {
    let (sin_lat, cos_lat) = p.lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = p.lon.to_radians().sin_cos();
    DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Back to lon/lat from any non-zero direction vector (length is irrelevant)
#[inline(always)]
pub fn from_direction(v: DVec3) -> GeoPoint {
    let lat = v.z.atan2(v.x.hypot(v.y));
    let lon = v.y.atan2(v.x);
    GeoPoint::new(lon.to_degrees(), lat.to_degrees())
}

/// Midpoint of the great circle between two points
pub fn geographic_midpoint(a: GeoPoint, b: GeoPoint) -> GeoPoint {
    from_direction(unit_vector(a) + unit_vector(b))
}

/// Average of unit vectors. Not a true spherical centroid, but stable for
/// the clustered point sets the view fitter feeds it.
pub fn centroid(points: &[GeoPoint]) -> GeoPoint {
    match points {
        [] => GeoPoint::default(),
        [only] => *only,
        _ => {
            let sum: DVec3 = points.iter().map(|&p| unit_vector(p)).sum();
            from_direction(sum / points.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_equator_prime_meridian() {
        let p = ecef_to_geodetic(EcefPosition::new(WGS84_A, 0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(p.lat, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.lon, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_poles() {
        let north = ecef_to_geodetic(EcefPosition::new(0.0, 0.0, 6_356_752.3)).unwrap();
        assert_eq!(north.lat, 90.0);
        let south = ecef_to_geodetic(EcefPosition::new(0.0, 0.0, -6_356_752.3)).unwrap();
        assert_eq!(south.lat, -90.0);
    }

    #[test]
    fn test_nan_does_not_hang() {
        let result = ecef_to_geodetic(EcefPosition::new(f64::NAN, 1.0, 1.0));
        assert_eq!(
            result,
            Err(GeodesyError::NoConvergence {
                iterations: MAX_ITERATIONS
            })
        );
    }

    #[test]
    fn test_haversine_one_degree_of_meridian() {
        let d = haversine_nm(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        // Mean-radius degree is ~60.04 nm
        assert_abs_diff_eq!(d, 60.04, epsilon = 0.01);
    }

    #[test]
    fn test_haversine_self_is_zero() {
        let p = GeoPoint::new(-71.3, 41.5);
        assert_eq!(haversine_nm(p, p), 0.0);
    }

    #[test]
    fn test_midpoint_on_equator() {
        let m = geographic_midpoint(GeoPoint::new(10.0, 0.0), GeoPoint::new(20.0, 0.0));
        assert_abs_diff_eq!(m.lon, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.lat, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_midpoint_across_antimeridian() {
        let m = geographic_midpoint(GeoPoint::new(179.0, 0.0), GeoPoint::new(-179.0, 0.0));
        assert_abs_diff_eq!(m.lon.abs(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centroid_degenerate_cases() {
        assert_eq!(centroid(&[]), GeoPoint::new(0.0, 0.0));
        let p = GeoPoint::new(12.5, -33.0);
        assert_eq!(centroid(&[p]), p);
    }

    #[test]
    fn test_centroid_matches_midpoint_for_pairs() {
        let a = GeoPoint::new(-5.0, 50.0);
        let b = GeoPoint::new(3.0, 52.0);
        let c = centroid(&[a, b]);
        let m = geographic_midpoint(a, b);
        assert_abs_diff_eq!(c.lon, m.lon, epsilon = 1e-9);
        assert_abs_diff_eq!(c.lat, m.lat, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn prop_ecef_round_trip(lat in -89.0f64..=89.0, lon in -180.0f64..=180.0) {
            let back = ecef_to_geodetic(geodetic_to_ecef(lat, lon, 0.0)).unwrap();
            prop_assert!((back.lat - lat).abs() <= 1e-6);
            // +180 and -180 are the same meridian
            let dlon = (back.lon - lon).abs();
            prop_assert!(dlon <= 1e-6 || (dlon - 360.0).abs() <= 1e-6);
        }

        #[test]
        fn prop_haversine_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let a = GeoPoint::new(lon1, lat1);
            let b = GeoPoint::new(lon2, lat2);
            prop_assert_eq!(haversine_nm(a, b), haversine_nm(b, a));
        }
    }
}
