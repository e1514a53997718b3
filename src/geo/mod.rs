use std::f64::consts::{FRAC_PI_2, PI};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("invalid coordinate: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

/// Latitude/longitude pair, always stored in radians.
///
/// Values are only built through the checked constructors, so everything
/// downstream of the API boundary can assume finite, in-range angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn from_radians(lat: f64, lng: f64) -> Result<Self, GeoError> {
        let in_range = lat.is_finite()
            && lng.is_finite()
            && (-FRAC_PI_2..=FRAC_PI_2).contains(&lat)
            && (-PI..=PI).contains(&lng);

        if in_range {
            Ok(Self { lat, lng })
        } else {
            Err(GeoError::InvalidCoordinate { lat, lng })
        }
    }

    pub fn from_degrees(lat: f64, lng: f64) -> Result<Self, GeoError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);

        if !valid {
            return Err(GeoError::InvalidCoordinate { lat, lng });
        }

        Self::from_radians(
            lat.to_radians().clamp(-FRAC_PI_2, FRAC_PI_2),
            lng.to_radians().clamp(-PI, PI),
        )
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat.to_degrees()
    }

    pub fn lng_degrees(&self) -> f64 {
        self.lng.to_degrees()
    }
}

// Responses speak degrees, the same unit clients send by default.
impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut point = serializer.serialize_struct("Coordinate", 2)?;
        point.serialize_field("lat", &self.lat_degrees())?;
        point.serialize_field("lng", &self.lng_degrees())?;
        point.end()
    }
}

/// Great-circle distance in meters (haversine). Inputs are already radians.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let delta_lat = b.lat - a.lat;
    let delta_lng = b.lng - a.lng;

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + a.lat.cos() * b.lat.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().atan2((1.0 - haversine).max(0.0).sqrt());

    EARTH_RADIUS_M * central_angle
}

/// Inclusive: a point exactly `radius_m` away is within the threshold.
pub fn within_threshold(a: &Coordinate, b: &Coordinate, radius_m: f64) -> bool {
    distance_m(a, b) <= radius_m
}

#[cfg(test)]
mod tests {
    use super::{Coordinate, GeoError, distance_m, within_threshold};

    fn deg(lat: f64, lng: f64) -> Coordinate {
        Coordinate::from_degrees(lat, lng).unwrap()
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = deg(23.7950, 90.4047);
        assert_eq!(distance_m(&p, &p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (deg(23.7950, 90.4047), deg(23.7942, 90.4041)),
            (deg(51.5074, -0.1278), deg(48.8566, 2.3522)),
            (deg(-33.8688, 151.2093), deg(40.7128, -74.0060)),
            (deg(0.0, 179.9), deg(0.0, -179.9)),
        ];

        for (a, b) in pairs {
            assert_eq!(distance_m(&a, &b), distance_m(&b, &a));
        }
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = deg(51.5074, -0.1278);
        let paris = deg(48.8566, 2.3522);
        let distance = distance_m(&london, &paris);
        assert!((distance - 343_000.0).abs() < 5_000.0);
    }

    #[test]
    fn nearby_dhaka_points_are_about_a_hundred_meters_apart() {
        let area = deg(23.7950, 90.4047);
        let branch = deg(23.7942, 90.4041);
        let distance = distance_m(&area, &branch);
        assert!(distance > 80.0 && distance < 120.0, "got {distance}");
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let a = deg(23.7950, 90.4047);
        let b = deg(23.7942, 90.4041);
        let exact = distance_m(&a, &b);

        assert!(within_threshold(&a, &b, exact));
        assert!(!within_threshold(&a, &b, exact - 1e-6));
        assert!(within_threshold(&a, &a, 0.0));
    }

    #[test]
    fn from_degrees_normalizes_to_radians() {
        let p = deg(90.0, -180.0);
        assert!((p.lat() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((p.lng() + std::f64::consts::PI).abs() < 1e-12);
        assert!((p.lat_degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_input() {
        assert!(matches!(
            Coordinate::from_degrees(91.0, 0.0),
            Err(GeoError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::from_degrees(0.0, 180.5).is_err());
        assert!(Coordinate::from_degrees(f64::NAN, 0.0).is_err());
        assert!(Coordinate::from_radians(0.0, f64::INFINITY).is_err());
        assert!(Coordinate::from_radians(2.0, 0.0).is_err());
    }
}
