//! Test fixtures for multidrop-planner.
//!
//! Provides realistic test data including:
//! - Real Bristol and London addresses with coordinates
//! - A removal item catalog covering small boxes up to pallet loads
//! - Builders for bookings and hand-made stop sequences

#![allow(dead_code)]

pub mod items;
pub mod uk_locations;

pub use items::*;
pub use uk_locations::*;

use multidrop_planner::booking::{BookingRequest, Stop, StopKind};

/// Booking between two known places.
pub fn booking_between(id: &str, from: &Place, to: &Place, items: &[&str]) -> BookingRequest {
    BookingRequest::new(id, from.name, to.name, items.iter().copied())
        .pickup_at(from.lat, from.lng)
        .deliver_at(to.lat, to.lng)
}

/// Booking with placeholder addresses and no coordinates.
pub fn booking(id: &str, items: &[&str]) -> BookingRequest {
    BookingRequest::new(
        id,
        format!("{id} pickup address"),
        format!("{id} delivery address"),
        items.iter().copied(),
    )
}

pub fn pickup(booking_id: &str, items: &[&str], sequence: usize) -> Stop {
    Stop::new(
        booking_id,
        StopKind::Pickup,
        format!("{booking_id} pickup address"),
        items.iter().copied(),
        sequence,
    )
}

pub fn dropoff(booking_id: &str, items: &[&str], sequence: usize) -> Stop {
    Stop::new(
        booking_id,
        StopKind::Dropoff,
        format!("{booking_id} delivery address"),
        items.iter().copied(),
        sequence,
    )
}

/// Batch stop sequence for `bookings`: all pickups, then all dropoffs.
pub fn batch_stops(bookings: &[BookingRequest]) -> Vec<Stop> {
    let n = bookings.len();
    let pickups = bookings.iter().enumerate().map(|(i, b)| b.pickup_stop(i + 1));
    let dropoffs = bookings.iter().enumerate().map(|(i, b)| b.dropoff_stop(n + i + 1));
    pickups.chain(dropoffs).collect()
}
