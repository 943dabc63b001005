//! Errors raised for malformed planner input.
//!
//! Capacity infeasibility is never an error: it is reported through the
//! structured results of the validator and planners. These variants cover
//! caller contract violations and broken configuration only.

use thiserror::Error;

use crate::profile::Tier;

#[derive(Debug, Error)]
pub enum PlanError {
    /// A booking was submitted without any items.
    #[error("booking {booking_id} has no items")]
    EmptyItemList { booking_id: String },

    /// Two bookings in one planning call share an identifier.
    #[error("booking id {booking_id} appears more than once")]
    DuplicateBooking { booking_id: String },

    /// A single-strategy run was given nothing to order.
    #[error("No bookings to plan")]
    NoBookings,

    /// A route needs at least one pickup and one dropoff.
    #[error("route must have at least 2 stops, got {count}")]
    TooFewStops { count: usize },

    /// Tier buffer plus multi-drop degradation leaves too little usable space.
    #[error(
        "combined buffer of {pct:.0}% for {tier} tier at {stop_count} stops reaches the 50% limit",
        pct = .buffer * 100.0
    )]
    ExcessiveBuffer {
        tier: Tier,
        stop_count: usize,
        buffer: f64,
    },

    /// The vehicle profile itself is unusable.
    #[error("invalid capacity profile: {reason}")]
    InvalidProfile { reason: String },

    /// A caller-provided capacity override was not positive.
    #[error("capacity override must be positive, got {volume_m3}m³ / {weight_kg}kg")]
    InvalidCapacityOverride { volume_m3: f64, weight_kg: f64 },

    /// The bookings-per-route window is empty.
    #[error("invalid bookings-per-route window: min {min}, max {max}")]
    InvalidRouteWindow { min: usize, max: usize },

    /// The item dataset could not be parsed.
    #[error("failed to parse item dataset")]
    Dataset(#[from] serde_json::Error),

    /// A dataset row carries unusable capacity data.
    #[error("item {item_id} is invalid: {reason}")]
    InvalidItem { item_id: String, reason: String },
}
