//! Collaborator seams for the planner.
//!
//! The item dataset and the distance estimate live outside the planning
//! core. Both contracts are infallible: unknown items are reported back,
//! and a distance is always produced.

use crate::booking::Location;
use crate::catalog::ItemResolution;

/// Resolves item identifiers to their capacity data.
pub trait ItemCatalog {
    /// Looks up a batch of item ids in one read.
    ///
    /// Each known id appears once in `items`. Unknown ids land in
    /// `missing_ids` and must never cause a failure.
    fn resolve_items(&self, item_ids: &[String]) -> ItemResolution;
}

/// Estimates road travel between two locations.
pub trait DistanceEstimator {
    /// Distance in kilometers. Must return a value even without coordinates.
    fn distance_km(&self, from: &Location, to: &Location) -> f64;

    /// Driving time for a distance, in minutes.
    fn travel_minutes(&self, km: f64) -> f64;
}
