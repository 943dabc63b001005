//! Haversine distance estimator.
//!
//! Uses great-circle distance between stop coordinates. Ignores roads, so it
//! only feeds grouping scores, never feasibility. Locations without
//! coordinates get a fixed fallback distance.

use crate::booking::Location;
use crate::traits::DistanceEstimator;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Distance assumed when either end has no coordinates.
const DEFAULT_FALLBACK_KM: f64 = 10.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based distance estimator.
#[derive(Debug, Clone)]
pub struct HaversineEstimator {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    /// Distance used when a location has no coordinates.
    pub fallback_km: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            fallback_km: DEFAULT_FALLBACK_KM,
        }
    }
}

impl HaversineEstimator {
    pub fn new(speed_kmh: f64, fallback_km: f64) -> Self {
        Self {
            speed_kmh,
            fallback_km,
        }
    }

    /// Calculate haversine distance between two points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

impl DistanceEstimator for HaversineEstimator {
    fn distance_km(&self, from: &Location, to: &Location) -> f64 {
        match (from.point, to.point) {
            (Some(a), Some(b)) => Self::haversine_km(a, b),
            _ => self.fallback_km,
        }
    }

    fn travel_minutes(&self, km: f64) -> f64 {
        km / self.speed_kmh * 60.0
    }
}
