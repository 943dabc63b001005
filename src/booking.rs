//! Bookings and the stops generated from them.
//!
//! Every booking becomes exactly two stops: a pickup carrying all of its
//! items and a dropoff unloading all of them. Stop ids are derived from the
//! booking id, so booking ids must be unique within one planning call.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::profile::Tier;

/// A street address with optional coordinates (lat, lng).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub point: Option<(f64, f64)>,
}

impl Location {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            point: None,
        }
    }

    pub fn with_point(mut self, lat: f64, lng: f64) -> Self {
        self.point = Some((lat, lng));
        self
    }
}

/// One customer's job: move `item_ids` from `pickup` to `delivery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: String,
    pub pickup: Location,
    pub delivery: Location,
    pub item_ids: Vec<String>,
    pub priority: Option<Tier>,
}

impl BookingRequest {
    pub fn new<I, S>(
        id: impl Into<String>,
        pickup_address: impl Into<String>,
        delivery_address: impl Into<String>,
        item_ids: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            pickup: Location::new(pickup_address),
            delivery: Location::new(delivery_address),
            item_ids: item_ids.into_iter().map(Into::into).collect(),
            priority: None,
        }
    }

    pub fn pickup_at(mut self, lat: f64, lng: f64) -> Self {
        self.pickup.point = Some((lat, lng));
        self
    }

    pub fn deliver_at(mut self, lat: f64, lng: f64) -> Self {
        self.delivery.point = Some((lat, lng));
        self
    }

    pub fn priority(mut self, tier: Tier) -> Self {
        self.priority = Some(tier);
        self
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.item_ids.is_empty() {
            return Err(PlanError::EmptyItemList {
                booking_id: self.id.clone(),
            });
        }
        Ok(())
    }

    pub fn pickup_stop(&self, sequence_number: usize) -> Stop {
        Stop {
            id: format!("{}_pickup", self.id),
            booking_id: self.id.clone(),
            kind: StopKind::Pickup,
            location: self.pickup.clone(),
            item_ids: self.item_ids.clone(),
            sequence_number,
        }
    }

    pub fn dropoff_stop(&self, sequence_number: usize) -> Stop {
        Stop {
            id: format!("{}_dropoff", self.id),
            booking_id: self.id.clone(),
            kind: StopKind::Dropoff,
            location: self.delivery.clone(),
            item_ids: self.item_ids.clone(),
            sequence_number,
        }
    }
}

/// Rejects empty bookings and duplicated booking ids.
pub fn validate_bookings(bookings: &[BookingRequest]) -> Result<(), PlanError> {
    let mut seen = HashSet::new();
    for booking in bookings {
        booking.validate()?;
        if !seen.insert(booking.id.as_str()) {
            return Err(PlanError::DuplicateBooking {
                booking_id: booking.id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    Pickup,
    Dropoff,
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopKind::Pickup => f.pad("pickup"),
            StopKind::Dropoff => f.pad("dropoff"),
        }
    }
}

/// A single pickup or dropoff in a route. `sequence_number` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub booking_id: String,
    pub kind: StopKind,
    pub location: Location,
    pub item_ids: Vec<String>,
    pub sequence_number: usize,
}

impl Stop {
    pub fn new<I, S>(
        booking_id: impl Into<String>,
        kind: StopKind,
        address: impl Into<String>,
        item_ids: I,
        sequence_number: usize,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let booking_id = booking_id.into();
        Self {
            id: format!("{booking_id}_{kind}"),
            booking_id,
            kind,
            location: Location::new(address),
            item_ids: item_ids.into_iter().map(Into::into).collect(),
            sequence_number,
        }
    }

    pub fn address(&self) -> &str {
        &self.location.address
    }

    pub fn is_pickup(&self) -> bool {
        self.kind == StopKind::Pickup
    }
}

/// Appends stops while keeping sequence numbers contiguous from 1.
#[derive(Debug, Default)]
pub struct StopSequence {
    stops: Vec<Stop>,
}

impl StopSequence {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stops: Vec::with_capacity(capacity),
        }
    }

    pub fn pickup(&mut self, booking: &BookingRequest) {
        let stop = booking.pickup_stop(self.stops.len() + 1);
        self.stops.push(stop);
    }

    pub fn dropoff(&mut self, booking: &BookingRequest) {
        let stop = booking.dropoff_stop(self.stops.len() + 1);
        self.stops.push(stop);
    }

    pub fn finish(self) -> Vec<Stop> {
        self.stops
    }
}

/// Renumbers stops 1..=n in their current order.
pub fn renumber(mut stops: Vec<Stop>) -> Vec<Stop> {
    for (index, stop) in stops.iter_mut().enumerate() {
        stop.sequence_number = index + 1;
    }
    stops
}

/// True when every booking's pickup comes before its dropoff.
///
/// Stops are read in slice order. A dropoff without any pickup fails.
pub fn respects_precedence(stops: &[Stop]) -> bool {
    let mut picked_up: HashMap<&str, usize> = HashMap::new();
    for stop in stops {
        match stop.kind {
            StopKind::Pickup => {
                *picked_up.entry(stop.booking_id.as_str()).or_insert(0) += 1;
            }
            StopKind::Dropoff => match picked_up.get_mut(stop.booking_id.as_str()) {
                Some(count) if *count > 0 => *count -= 1,
                _ => return false,
            },
        }
    }
    true
}
