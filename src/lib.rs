//! multidrop-planner
//!
//! Capacity-constrained route planning for multi-drop removal vans: a
//! vehicle capacity profile, a leg-by-leg load validator, a single-route
//! planner and a multi-booking grouping optimizer.

pub mod booking;
pub mod catalog;
pub mod error;
pub mod grouping;
pub mod haversine;
pub mod planner;
pub mod profile;
pub mod traits;
pub mod validator;

pub use booking::{BookingRequest, Location, Stop, StopKind};
pub use catalog::{CatalogCache, Item, ItemResolution, MemoryCatalog};
pub use error::PlanError;
pub use grouping::{MultiBookingOptions, MultiBookingPlan, plan_multi_booking_routes};
pub use haversine::HaversineEstimator;
pub use planner::{PlanOptions, RoutePlanResult, plan_capacity_constrained_route};
pub use profile::{CapacityProfile, Tier};
pub use traits::{DistanceEstimator, ItemCatalog};
pub use validator::{CapacityAnalysis, ValidationOptions, validate_leg_by_leg_capacity};
