//! Leg-by-leg capacity validation.
//!
//! Walks an ordered stop sequence and simulates the van's contents after
//! each stop: pickups load their items, dropoffs unload them. Every leg is
//! checked against the effective capacity for the whole route's stop count,
//! and a route is feasible only if no leg exceeds 100% in either dimension.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::booking::{Stop, StopKind};
use crate::error::PlanError;
use crate::profile::{CapacityProfile, EffectiveCapacity, Tier};
use crate::traits::ItemCatalog;

/// Absolute capacity replacing the buffered profile capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityOverride {
    pub max_volume_m3: f64,
    pub max_weight_kg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOptions {
    pub tier: Tier,
    /// Echoed on the analysis.
    pub route_id: Option<String>,
    pub profile: CapacityProfile,
    pub capacity_override: Option<CapacityOverride>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            tier: Tier::Economy,
            route_id: None,
            profile: CapacityProfile::default(),
            capacity_override: None,
        }
    }
}

impl ValidationOptions {
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            tier,
            ..Self::default()
        }
    }
}

/// Load carried on the leg leaving a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegState {
    pub stop_id: String,
    pub booking_id: String,
    pub stop_sequence: usize,
    pub stop_kind: StopKind,
    pub address: String,
    pub cumulative_volume_m3: f64,
    pub cumulative_weight_kg: f64,
    pub active_item_count: usize,
    pub items_added: Vec<String>,
    pub items_removed: Vec<String>,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
}

impl LegState {
    pub fn peak_utilization(&self) -> f64 {
        self.volume_utilization.max(self.weight_utilization)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Volume,
    Weight,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityViolation {
    pub stop_id: String,
    pub stop_sequence: usize,
    pub stop_kind: StopKind,
    pub kind: ViolationKind,
    pub volume_m3: f64,
    pub volume_capacity_m3: f64,
    pub volume_excess_m3: f64,
    pub volume_utilization: f64,
    pub weight_kg: f64,
    pub weight_capacity_kg: f64,
    pub weight_excess_kg: f64,
    pub weight_utilization: f64,
    pub message: String,
}

impl CapacityViolation {
    /// How far over capacity the worse dimension is.
    pub fn severity(&self) -> f64 {
        self.volume_utilization.max(self.weight_utilization)
    }
}

/// Leg-by-leg verdict for one stop sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityAnalysis {
    pub route_id: Option<String>,
    pub tier: Tier,
    pub is_feasible: bool,
    pub total_stops: usize,
    pub pickup_stops: usize,
    pub dropoff_stops: usize,
    pub leg_states: Vec<LegState>,
    pub peak_volume_m3: f64,
    pub peak_weight_kg: f64,
    pub peak_volume_utilization: f64,
    pub peak_weight_utilization: f64,
    pub effective_volume_m3: f64,
    pub effective_weight_kg: f64,
    pub violations: Vec<CapacityViolation>,
    pub warnings: Vec<String>,
}

impl CapacityAnalysis {
    /// The higher of peak volume and peak weight utilization.
    pub fn peak_utilization(&self) -> f64 {
        self.peak_volume_utilization.max(self.peak_weight_utilization)
    }

    /// The violation with the highest utilization, if any.
    pub fn worst_violation(&self) -> Option<&CapacityViolation> {
        self.violations
            .iter()
            .fold(None, |worst: Option<&CapacityViolation>, violation| match worst {
                Some(current) if current.severity() >= violation.severity() => Some(current),
                _ => Some(violation),
            })
    }
}

impl fmt::Display for CapacityAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Leg-by-leg capacity analysis ({} tier, {} stops): {}",
            self.tier,
            self.total_stops,
            if self.is_feasible { "FEASIBLE" } else { "INFEASIBLE" }
        )?;
        writeln!(
            f,
            "{:>4}  {:<8}  {:>9}  {:>9}  {:>6}  {:>6}  {:>5}",
            "Stop", "Type", "Volume", "Weight", "Vol%", "Wt%", "Items"
        )?;
        for leg in &self.leg_states {
            writeln!(
                f,
                "{:>4}  {:<8}  {:>7.2}m3  {:>7.1}kg  {:>5.1}%  {:>5.1}%  {:>5}",
                leg.stop_sequence,
                leg.stop_kind,
                leg.cumulative_volume_m3,
                leg.cumulative_weight_kg,
                leg.volume_utilization * 100.0,
                leg.weight_utilization * 100.0,
                leg.active_item_count
            )?;
        }
        writeln!(
            f,
            "Peak: {:.2}m3 ({:.1}%), {:.1}kg ({:.1}%)",
            self.peak_volume_m3,
            self.peak_volume_utilization * 100.0,
            self.peak_weight_kg,
            self.peak_weight_utilization * 100.0
        )?;
        for violation in &self.violations {
            writeln!(f, "Violation: {}", violation.message)?;
        }
        for warning in &self.warnings {
            writeln!(f, "Warning: {warning}")?;
        }
        Ok(())
    }
}

/// Where the heaviest leg of a route happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakLoad {
    pub peak_volume_m3: f64,
    pub peak_weight_kg: f64,
    /// First stop at which the peak volume is carried.
    pub peak_stop: Option<Stop>,
    /// First stop at which the peak weight is carried.
    pub peak_weight_stop: Option<Stop>,
}

/// Simulates the load along `stops` and checks every leg against capacity.
///
/// Stops are ordered by `sequence_number` (stable for equal numbers). Item
/// data is fetched in one batched call; unknown ids count as zero load and
/// produce a warning. Infeasibility is reported in the analysis, never as
/// an error.
pub fn validate_leg_by_leg_capacity<C: ItemCatalog + ?Sized>(
    stops: &[Stop],
    catalog: &C,
    options: &ValidationOptions,
) -> Result<CapacityAnalysis, PlanError> {
    if stops.len() < 2 {
        return Err(PlanError::TooFewStops { count: stops.len() });
    }

    let capacity = resolve_capacity(stops.len(), options)?;

    let mut ordered: Vec<&Stop> = stops.iter().collect();
    ordered.sort_by_key(|stop| stop.sequence_number);

    let mut warnings = Vec::new();
    if ordered.len() > options.profile.max_recommended_stops {
        warnings.push(format!(
            "Route has {} stops, more than the recommended maximum of {}",
            ordered.len(),
            options.profile.max_recommended_stops
        ));
    }

    let all_ids: Vec<String> = ordered
        .iter()
        .flat_map(|stop| stop.item_ids.iter().cloned())
        .collect();
    let resolution = catalog.resolve_items(&all_ids);
    let lookup = resolution.lookup();

    // Keyed by (booking, item): identical catalog items from different
    // bookings are distinct loads.
    let mut on_board: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut leg_states = Vec::with_capacity(ordered.len());
    let mut violations = Vec::new();
    let (mut peak_volume, mut peak_weight) = (0.0_f64, 0.0_f64);
    let (mut peak_volume_utilization, mut peak_weight_utilization) = (0.0_f64, 0.0_f64);

    for id in &resolution.missing_ids {
        warn!(item_id = %id, "item not found in dataset");
        warnings.push(missing_item_warning(id));
    }

    for stop in &ordered {
        let mut items_added = Vec::new();
        let mut items_removed = Vec::new();
        match stop.kind {
            StopKind::Pickup => {
                for id in &stop.item_ids {
                    *on_board
                        .entry((stop.booking_id.as_str(), id.as_str()))
                        .or_insert(0) += 1;
                    items_added.push(id.clone());
                }
            }
            StopKind::Dropoff => {
                let mut not_on_board = Vec::new();
                for id in &stop.item_ids {
                    let key = (stop.booking_id.as_str(), id.as_str());
                    let remaining = match on_board.get_mut(&key) {
                        Some(count) => {
                            *count -= 1;
                            Some(*count)
                        }
                        None => None,
                    };
                    match remaining {
                        Some(0) => {
                            on_board.remove(&key);
                            items_removed.push(id.clone());
                        }
                        Some(_) => items_removed.push(id.clone()),
                        None => not_on_board.push(id.as_str()),
                    }
                }
                if !not_on_board.is_empty() {
                    warn!(stop_id = %stop.id, "dropoff before pickup, load clamped at zero");
                    warnings.push(format!(
                        "Stop {} ({}): dropoff of {} before pickup, load clamped at zero",
                        stop.sequence_number,
                        stop.id,
                        not_on_board.join(", ")
                    ));
                }
            }
        }

        let (volume, weight) = on_board.iter().fold((0.0, 0.0), |(v, w), ((_, id), count)| {
            match lookup.get(id) {
                Some(item) => (
                    v + item.volume_m3 * *count as f64,
                    w + item.weight_kg * *count as f64,
                ),
                None => (v, w),
            }
        });
        let volume = f64::max(volume, 0.0);
        let weight = f64::max(weight, 0.0);
        let (volume_utilization, weight_utilization) = capacity.utilization(volume, weight);

        peak_volume = peak_volume.max(volume);
        peak_weight = peak_weight.max(weight);
        peak_volume_utilization = peak_volume_utilization.max(volume_utilization);
        peak_weight_utilization = peak_weight_utilization.max(weight_utilization);

        let over_volume = volume_utilization > 1.0;
        let over_weight = weight_utilization > 1.0;
        if over_volume || over_weight {
            violations.push(violation(
                stop,
                &capacity,
                volume,
                weight,
                over_volume,
                over_weight,
            ));
        }

        leg_states.push(LegState {
            stop_id: stop.id.clone(),
            booking_id: stop.booking_id.clone(),
            stop_sequence: stop.sequence_number,
            stop_kind: stop.kind,
            address: stop.location.address.clone(),
            cumulative_volume_m3: volume,
            cumulative_weight_kg: weight,
            active_item_count: on_board.values().sum(),
            items_added,
            items_removed,
            volume_utilization,
            weight_utilization,
        });
    }

    let pickup_stops = ordered.iter().filter(|stop| stop.is_pickup()).count();
    let analysis = CapacityAnalysis {
        route_id: options.route_id.clone(),
        tier: options.tier,
        is_feasible: violations.is_empty(),
        total_stops: ordered.len(),
        pickup_stops,
        dropoff_stops: ordered.len() - pickup_stops,
        leg_states,
        peak_volume_m3: peak_volume,
        peak_weight_kg: peak_weight,
        peak_volume_utilization,
        peak_weight_utilization,
        effective_volume_m3: capacity.volume_m3,
        effective_weight_kg: capacity.weight_kg,
        violations,
        warnings,
    };

    debug!(
        route_id = analysis.route_id.as_deref().unwrap_or("-"),
        stops = analysis.total_stops,
        feasible = analysis.is_feasible,
        peak = analysis.peak_utilization(),
        "validated route"
    );

    Ok(analysis)
}

/// Feasibility as a plain boolean. Validation errors count as infeasible.
pub fn is_route_feasible<C: ItemCatalog + ?Sized>(stops: &[Stop], catalog: &C, tier: Tier) -> bool {
    match validate_leg_by_leg_capacity(stops, catalog, &ValidationOptions::for_tier(tier)) {
        Ok(analysis) => analysis.is_feasible,
        Err(err) => {
            warn!(error = %err, "capacity validation failed, treating route as infeasible");
            false
        }
    }
}

/// Peak carried load and the stops where it happens.
pub fn get_peak_load<C: ItemCatalog + ?Sized>(
    stops: &[Stop],
    catalog: &C,
    options: &ValidationOptions,
) -> Result<PeakLoad, PlanError> {
    let analysis = validate_leg_by_leg_capacity(stops, catalog, options)?;

    let first_leg_with = |matches: &dyn Fn(&LegState) -> bool| {
        analysis
            .leg_states
            .iter()
            .find(|&leg| matches(leg))
            .and_then(|leg| stops.iter().find(|stop| stop.id == leg.stop_id))
            .cloned()
    };

    Ok(PeakLoad {
        peak_volume_m3: analysis.peak_volume_m3,
        peak_weight_kg: analysis.peak_weight_kg,
        peak_stop: first_leg_with(&|leg| leg.cumulative_volume_m3 == analysis.peak_volume_m3),
        peak_weight_stop: first_leg_with(&|leg| leg.cumulative_weight_kg == analysis.peak_weight_kg),
    })
}

/// Data-quality warning for an item id the catalog could not resolve.
pub(crate) fn missing_item_warning(item_id: &str) -> String {
    format!("Item '{item_id}' not found in dataset, counted as zero load")
}

fn resolve_capacity(
    stop_count: usize,
    options: &ValidationOptions,
) -> Result<EffectiveCapacity, PlanError> {
    match options.capacity_override {
        Some(limit) => {
            if !(limit.max_volume_m3 > 0.0) || !(limit.max_weight_kg > 0.0) {
                return Err(PlanError::InvalidCapacityOverride {
                    volume_m3: limit.max_volume_m3,
                    weight_kg: limit.max_weight_kg,
                });
            }
            Ok(EffectiveCapacity {
                volume_m3: limit.max_volume_m3,
                weight_kg: limit.max_weight_kg,
            })
        }
        None => options.profile.checked_capacity(options.tier, stop_count),
    }
}

fn violation(
    stop: &Stop,
    capacity: &EffectiveCapacity,
    volume: f64,
    weight: f64,
    over_volume: bool,
    over_weight: bool,
) -> CapacityViolation {
    let (volume_utilization, weight_utilization) = capacity.utilization(volume, weight);
    let volume_excess = (volume - capacity.volume_m3).max(0.0);
    let weight_excess = (weight - capacity.weight_kg).max(0.0);

    let (kind, message) = match (over_volume, over_weight) {
        (true, true) => (
            ViolationKind::Both,
            format!(
                "Stop {} ({} {}): volume {:.2}m³ exceeds {:.2}m³ by {:.2}m³ and weight {:.0}kg exceeds {:.0}kg by {:.0}kg",
                stop.sequence_number,
                stop.kind,
                stop.booking_id,
                volume,
                capacity.volume_m3,
                volume_excess,
                weight,
                capacity.weight_kg,
                weight_excess
            ),
        ),
        (true, false) => (
            ViolationKind::Volume,
            format!(
                "Stop {} ({} {}): volume {:.2}m³ exceeds {:.2}m³ by {:.2}m³ ({:.1}% utilization)",
                stop.sequence_number,
                stop.kind,
                stop.booking_id,
                volume,
                capacity.volume_m3,
                volume_excess,
                volume_utilization * 100.0
            ),
        ),
        _ => (
            ViolationKind::Weight,
            format!(
                "Stop {} ({} {}): weight {:.0}kg exceeds {:.0}kg by {:.0}kg ({:.1}% utilization)",
                stop.sequence_number,
                stop.kind,
                stop.booking_id,
                weight,
                capacity.weight_kg,
                weight_excess,
                weight_utilization * 100.0
            ),
        ),
    };

    CapacityViolation {
        stop_id: stop.id.clone(),
        stop_sequence: stop.sequence_number,
        stop_kind: stop.kind,
        kind,
        volume_m3: volume,
        volume_capacity_m3: capacity.volume_m3,
        volume_excess_m3: volume_excess,
        volume_utilization,
        weight_kg: weight,
        weight_capacity_kg: capacity.weight_kg,
        weight_excess_kg: weight_excess,
        weight_utilization,
        message,
    }
}
