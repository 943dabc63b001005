//! Single-route capacity-constrained planning.
//!
//! Builds one van route for a set of bookings. A fixed list of ordering
//! strategies proposes stop sequences, the leg-by-leg validator scores each,
//! and the feasible sequence with the lowest peak utilization wins. When no
//! constructive ordering fits, a bounded repair search moves dropoffs ahead
//! of the overloaded leg. If that also fails, the result explains why and
//! how to split the work across vans.

use std::cmp::Ordering;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::booking::{self, BookingRequest, Stop, StopSequence, validate_bookings};
use crate::catalog::{CatalogCache, summarize};
use crate::error::PlanError;
use crate::profile::{CapacityProfile, EffectiveCapacity, Tier};
use crate::traits::ItemCatalog;
use crate::validator::{
    CapacityAnalysis, ValidationOptions, missing_item_warning, validate_leg_by_leg_capacity,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanOptions {
    pub tier: Tier,
    /// Validation budget for the repair search.
    pub max_iterations: usize,
    /// Whether suggestions may recommend extra vans.
    pub allow_multiple_vans: bool,
    pub profile: CapacityProfile,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            tier: Tier::Economy,
            max_iterations: 100,
            allow_multiple_vans: true,
            profile: CapacityProfile::default(),
        }
    }
}

impl PlanOptions {
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            tier,
            ..Self::default()
        }
    }
}

/// Ordering strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    /// Every pickup, then every dropoff.
    Batch,
    /// Greedy pickups that unload the largest booking whenever the next
    /// pickup would raise the running peak.
    DynamicCapacityReuse,
    /// Fixed interleaving patterns; the lowest-peak one is kept. The first
    /// pattern serves bookings by priority, so it wins ties.
    OptimalInterleaving,
    /// Local search that pulls dropoffs ahead of the overloaded leg.
    RepairReorder,
}

impl OptimizationMethod {
    /// Strategies that build an ordering from scratch.
    pub const CONSTRUCTIVE: [OptimizationMethod; 3] = [
        OptimizationMethod::Batch,
        OptimizationMethod::DynamicCapacityReuse,
        OptimizationMethod::OptimalInterleaving,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMethod::Batch => "batch",
            OptimizationMethod::DynamicCapacityReuse => "dynamic_capacity_reuse",
            OptimizationMethod::OptimalInterleaving => "optimal_interleaving",
            OptimizationMethod::RepairReorder => "repair_reorder",
        }
    }

    /// Stop sequences this strategy proposes. Empty for the repair search,
    /// which starts from an existing ordering instead.
    pub fn candidates(&self, loads: &[BookingLoad<'_>], capacity: &EffectiveCapacity) -> Vec<Vec<Stop>> {
        let by_size = sorted_by_size(loads, capacity);
        match self {
            OptimizationMethod::Batch => {
                let in_order: Vec<&BookingLoad<'_>> = loads.iter().collect();
                vec![batch_ordering(&in_order, &in_order)]
            }
            OptimizationMethod::DynamicCapacityReuse => vec![dynamic_ordering(&by_size, capacity)],
            OptimizationMethod::OptimalInterleaving => {
                let ascending: Vec<&BookingLoad<'_>> = by_size.iter().rev().copied().collect();
                let mut by_priority: Vec<&BookingLoad<'_>> = loads.iter().collect();
                by_priority.sort_by_key(|load| priority_rank(load.booking));
                vec![
                    early_drop_ordering(&by_priority, 1),
                    early_drop_ordering(&by_size, 1),
                    early_drop_ordering(&by_size, 2),
                    batch_ordering(&ascending, &by_size),
                ]
            }
            OptimizationMethod::RepairReorder => Vec::new(),
        }
    }
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A scored stop ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSolution {
    pub route_id: String,
    pub tier: Tier,
    pub stops: Vec<Stop>,
    pub capacity_analysis: CapacityAnalysis,
    pub optimization_method: OptimizationMethod,
    /// Orderings validated by the strategy that produced this one.
    pub iterations_required: usize,
}

impl RouteSolution {
    pub fn is_feasible(&self) -> bool {
        self.capacity_analysis.is_feasible
    }

    pub fn peak_utilization(&self) -> f64 {
        self.capacity_analysis.peak_utilization()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlanResult {
    pub is_feasible: bool,
    pub primary_route: Option<RouteSolution>,
    /// Feasible runners-up, or the best failed attempt on rejection.
    pub alternative_routes: Vec<RouteSolution>,
    pub rejection_reasons: Vec<String>,
    pub requires_multiple_vans: bool,
    pub suggestions: Vec<String>,
    pub warnings: Vec<String>,
    pub total_volume_m3: f64,
    pub total_weight_kg: f64,
    pub total_item_count: usize,
    pub total_handling_minutes: f64,
}

impl RoutePlanResult {
    fn empty(totals: &Totals) -> Self {
        Self {
            is_feasible: false,
            primary_route: None,
            alternative_routes: Vec::new(),
            rejection_reasons: Vec::new(),
            requires_multiple_vans: false,
            suggestions: Vec::new(),
            warnings: Vec::new(),
            total_volume_m3: totals.volume_m3,
            total_weight_kg: totals.weight_kg,
            total_item_count: totals.item_count,
            total_handling_minutes: totals.handling_minutes,
        }
    }
}

/// Capacity footprint of one booking.
#[derive(Debug, Clone)]
pub struct BookingLoad<'a> {
    pub booking: &'a BookingRequest,
    pub volume_m3: f64,
    pub weight_kg: f64,
    pub handling_minutes: f64,
    pub missing_ids: Vec<String>,
}

impl BookingLoad<'_> {
    /// Normalized size: the binding utilization this booking causes alone.
    pub fn score(&self, capacity: &EffectiveCapacity) -> f64 {
        capacity.load_ratio(self.volume_m3, self.weight_kg)
    }
}

/// Totals each booking's items. Unknown items contribute nothing.
pub fn measure_bookings<'a, C: ItemCatalog + ?Sized>(
    bookings: &'a [BookingRequest],
    catalog: &C,
) -> Vec<BookingLoad<'a>> {
    bookings
        .iter()
        .map(|booking| {
            let summary = summarize(catalog, &booking.item_ids);
            BookingLoad {
                booking,
                volume_m3: summary.volume_m3,
                weight_kg: summary.weight_kg,
                handling_minutes: summary.handling_minutes,
                missing_ids: summary.missing_ids,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Totals {
    volume_m3: f64,
    weight_kg: f64,
    item_count: usize,
    handling_minutes: f64,
}

impl Totals {
    fn of(loads: &[BookingLoad<'_>]) -> Self {
        loads.iter().fold(Self::default(), |mut totals, load| {
            totals.volume_m3 += load.volume_m3;
            totals.weight_kg += load.weight_kg;
            totals.item_count += load.booking.item_ids.len();
            totals.handling_minutes += load.handling_minutes;
            totals
        })
    }
}

/// Validation budget and shared state for one planning call.
struct Search<'c, C: ?Sized> {
    catalog: &'c C,
    validation: ValidationOptions,
    route_key: String,
    budget: usize,
    used: usize,
}

impl<'c, C: ItemCatalog + ?Sized> Search<'c, C> {
    fn new(catalog: &'c C, bookings: &[BookingRequest], options: &PlanOptions) -> Self {
        let route_key = bookings
            .iter()
            .map(|booking| booking.id.as_str())
            .collect::<Vec<_>>()
            .join("+");
        Self {
            catalog,
            validation: ValidationOptions {
                tier: options.tier,
                route_id: None,
                profile: options.profile.clone(),
                capacity_override: None,
            },
            route_key,
            budget: options.max_iterations.max(1),
            used: 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.used >= self.budget
    }

    fn evaluate(
        &mut self,
        stops: Vec<Stop>,
        method: OptimizationMethod,
        iterations_required: usize,
    ) -> Result<RouteSolution, PlanError> {
        let route_id = format!("route-{}-{}", method.as_str(), self.route_key);
        self.validation.route_id = Some(route_id.clone());
        let capacity_analysis = validate_leg_by_leg_capacity(&stops, self.catalog, &self.validation)?;

        debug!(
            method = method.as_str(),
            feasible = capacity_analysis.is_feasible,
            peak = capacity_analysis.peak_utilization(),
            "evaluated ordering"
        );

        Ok(RouteSolution {
            route_id,
            tier: self.validation.tier,
            stops,
            capacity_analysis,
            optimization_method: method,
            iterations_required,
        })
    }

    /// Runs one constructive strategy and keeps its best candidate.
    fn run_strategy(
        &mut self,
        method: OptimizationMethod,
        loads: &[BookingLoad<'_>],
        capacity: &EffectiveCapacity,
    ) -> Result<Option<RouteSolution>, PlanError> {
        let mut best: Option<RouteSolution> = None;
        let mut evaluated = 0;
        for stops in method.candidates(loads, capacity) {
            evaluated += 1;
            let solution = self.evaluate(stops, method, evaluated)?;
            if best.as_ref().is_none_or(|current| rank(&solution, current) == Ordering::Less) {
                best = Some(solution);
            }
        }
        Ok(best.map(|mut solution| {
            solution.iterations_required = evaluated;
            solution
        }))
    }

    /// Bounded local search starting from an infeasible ordering.
    ///
    /// Each round targets the worst violation and tries moving a later
    /// dropoff in front of it, delaying the offending pickup, and swapping
    /// adjacent stops. Candidates breaking pickup-before-dropoff are skipped.
    /// Stops at the first feasible ordering, a local optimum, or the budget.
    fn repair(&mut self, start: &RouteSolution) -> Result<RouteSolution, PlanError> {
        let mut current = start.clone();
        current.optimization_method = OptimizationMethod::RepairReorder;
        let mut attempts = 0;

        while !self.exhausted() {
            let Some(worst) = current.capacity_analysis.worst_violation() else {
                break;
            };
            let Some(critical) = current.stops.iter().position(|stop| stop.id == worst.stop_id)
            else {
                break;
            };

            let mut improved: Option<RouteSolution> = None;
            for stops in repair_moves(&current.stops, critical) {
                if self.exhausted() {
                    break;
                }
                if !booking::respects_precedence(&stops) {
                    continue;
                }
                self.used += 1;
                attempts += 1;
                let candidate = self.evaluate(stops, OptimizationMethod::RepairReorder, attempts)?;
                if candidate.is_feasible() {
                    debug!(attempts, "repair found a feasible ordering");
                    return Ok(candidate);
                }
                let baseline = improved.as_ref().unwrap_or(&current);
                if rank(&candidate, baseline) == Ordering::Less {
                    improved = Some(candidate);
                }
            }

            match improved {
                Some(next) => current = next,
                None => break,
            }
        }

        current.iterations_required = attempts.max(1);
        Ok(current)
    }
}

/// Feasible first, then fewer violations, then lower peak.
fn rank(a: &RouteSolution, b: &RouteSolution) -> Ordering {
    b.is_feasible()
        .cmp(&a.is_feasible())
        .then(
            a.capacity_analysis
                .violations
                .len()
                .cmp(&b.capacity_analysis.violations.len()),
        )
        .then(a.peak_utilization().total_cmp(&b.peak_utilization()))
}

/// Plans one capacity-feasible route for `bookings`.
///
/// Infeasibility is a result (`is_feasible = false` with reasons and
/// suggestions). Errors are reserved for malformed input: empty item lists,
/// duplicated booking ids or an invalid profile.
pub fn plan_capacity_constrained_route<C: ItemCatalog + ?Sized>(
    bookings: &[BookingRequest],
    catalog: &C,
    options: &PlanOptions,
) -> Result<RoutePlanResult, PlanError> {
    options.profile.validate()?;

    if bookings.is_empty() {
        let mut result = RoutePlanResult::empty(&Totals::default());
        result.rejection_reasons.push(PlanError::NoBookings.to_string());
        return Ok(result);
    }
    validate_bookings(bookings)?;

    let cache = CatalogCache::new(catalog);
    let all_ids: Vec<String> = bookings
        .iter()
        .flat_map(|booking| booking.item_ids.iter().cloned())
        .collect();
    cache.prefetch(&all_ids);

    let loads = measure_bookings(bookings, &cache);
    let totals = Totals::of(&loads);
    let mut result = RoutePlanResult::empty(&totals);
    for id in loads.iter().flat_map(|load| &load.missing_ids) {
        push_unique(&mut result.warnings, missing_item_warning(id));
    }

    let tier = options.tier;
    let stop_count = bookings.len() * 2;
    let demand = options
        .profile
        .is_within_capacity(totals.volume_m3, totals.weight_kg, tier, stop_count);

    let capacity = match options.profile.checked_capacity(tier, stop_count) {
        Ok(capacity) => capacity,
        Err(err) => {
            info!(bookings = bookings.len(), error = %err, "route rejected: too many stops");
            result.rejection_reasons.push(err.to_string());
            result.requires_multiple_vans = true;
            result.suggestions = rejection_suggestions(bookings, &cache, options, None);
            return Ok(result);
        }
    };

    let mut search = Search::new(&cache, bookings, options);
    let mut feasible: Vec<RouteSolution> = Vec::new();
    let mut best_attempt: Option<RouteSolution> = None;

    for method in OptimizationMethod::CONSTRUCTIVE {
        let Some(solution) = search.run_strategy(method, &loads, &capacity)? else {
            continue;
        };
        if solution.is_feasible() {
            feasible.push(solution);
        } else if best_attempt
            .as_ref()
            .is_none_or(|current| rank(&solution, current) == Ordering::Less)
        {
            best_attempt = Some(solution);
        }
    }

    if feasible.is_empty() {
        if let Some(attempt) = best_attempt.take() {
            let repaired = search.repair(&attempt)?;
            best_attempt = if repaired.is_feasible() {
                feasible.push(repaired);
                None
            } else if rank(&repaired, &attempt) == Ordering::Less {
                Some(repaired)
            } else {
                Some(attempt)
            };
        }
    }

    if feasible.is_empty() {
        result.requires_multiple_vans = !demand.fits;
        info!(
            bookings = bookings.len(),
            tier = %tier,
            requires_multiple_vans = result.requires_multiple_vans,
            "route rejected: no feasible ordering"
        );
        result.rejection_reasons = rejection_reasons(&loads, &totals, &capacity, tier, stop_count);
        result.suggestions = rejection_suggestions(bookings, &cache, options, best_attempt.as_ref());
        if let Some(attempt) = &best_attempt {
            for warning in &attempt.capacity_analysis.warnings {
                push_unique(&mut result.warnings, warning.clone());
            }
        }
        result.alternative_routes = best_attempt.into_iter().collect();
        return Ok(result);
    }

    // Lowest peak wins; ties keep the earlier, simpler strategy.
    let winner = feasible
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            a.peak_utilization()
                .total_cmp(&b.peak_utilization())
                .then(ia.cmp(ib))
        })
        .map(|(index, _)| index)
        .unwrap_or(0);
    let primary = feasible.remove(winner);

    info!(
        bookings = bookings.len(),
        method = primary.optimization_method.as_str(),
        peak = primary.peak_utilization(),
        "route planned"
    );

    result.is_feasible = true;
    result.suggestions.push(format!(
        "Route planned with {} ordering",
        primary.optimization_method
    ));
    result.suggestions.push(format!(
        "Peak utilization: {:.1}% volume, {:.1}% weight",
        primary.capacity_analysis.peak_volume_utilization * 100.0,
        primary.capacity_analysis.peak_weight_utilization * 100.0
    ));
    for warning in &primary.capacity_analysis.warnings {
        push_unique(&mut result.warnings, warning.clone());
    }
    result.primary_route = Some(primary);
    result.alternative_routes = feasible;
    Ok(result)
}

/// Runs a single strategy on its own, without the fallback chain.
///
/// [`OptimizationMethod::RepairReorder`] starts from the batch ordering.
/// An empty booking list has no route to return and fails with
/// [`PlanError::NoBookings`].
pub fn plan_with_strategy<C: ItemCatalog + ?Sized>(
    bookings: &[BookingRequest],
    catalog: &C,
    method: OptimizationMethod,
    options: &PlanOptions,
) -> Result<RouteSolution, PlanError> {
    options.profile.validate()?;
    if bookings.is_empty() {
        return Err(PlanError::NoBookings);
    }
    validate_bookings(bookings)?;

    let cache = CatalogCache::new(catalog);
    let loads = measure_bookings(bookings, &cache);
    let capacity = options
        .profile
        .checked_capacity(options.tier, bookings.len() * 2)?;
    let mut search = Search::new(&cache, bookings, options);

    let seed_method = match method {
        OptimizationMethod::RepairReorder => OptimizationMethod::Batch,
        other => other,
    };
    let seed = search
        .run_strategy(seed_method, &loads, &capacity)?
        .ok_or(PlanError::NoBookings)?;

    match method {
        OptimizationMethod::RepairReorder if !seed.is_feasible() => search.repair(&seed),
        OptimizationMethod::RepairReorder => Ok(RouteSolution {
            optimization_method: OptimizationMethod::RepairReorder,
            ..seed
        }),
        _ => Ok(seed),
    }
}

/// Result of [`can_fit_in_single_van`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleVanCheck {
    pub can_fit: bool,
    pub total_volume_m3: f64,
    pub total_weight_kg: f64,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub reasons: Vec<String>,
}

/// Whether the summed load of all bookings fits one van at `2n` stops.
///
/// This is the batch-ordering bound: a `true` answer guarantees a feasible
/// route, while a `false` answer may still be routable by interleaving.
pub fn can_fit_in_single_van<C: ItemCatalog + ?Sized>(
    bookings: &[BookingRequest],
    catalog: &C,
    options: &PlanOptions,
) -> SingleVanCheck {
    let loads = measure_bookings(bookings, catalog);
    let totals = Totals::of(&loads);
    let check = options.profile.is_within_capacity(
        totals.volume_m3,
        totals.weight_kg,
        options.tier,
        bookings.len() * 2,
    );

    SingleVanCheck {
        can_fit: check.fits,
        total_volume_m3: totals.volume_m3,
        total_weight_kg: totals.weight_kg,
        volume_utilization: check.volume_utilization,
        weight_utilization: check.weight_utilization,
        reasons: check.reasons,
    }
}

/// Two-van partition of a booking set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VanSplit {
    pub van1: Vec<String>,
    pub van2: Vec<String>,
    pub van1_volume_m3: f64,
    pub van1_weight_kg: f64,
    pub van2_volume_m3: f64,
    pub van2_weight_kg: f64,
}

/// Fills van 1 in booking order until about half of effective capacity is
/// used; every later booking goes to van 2. Van 1 always takes the first.
pub fn suggest_van_split<C: ItemCatalog + ?Sized>(
    bookings: &[BookingRequest],
    catalog: &C,
    options: &PlanOptions,
) -> VanSplit {
    let capacity = options.profile.effective_capacity(options.tier, 2);
    let half_volume = capacity.volume_m3 / 2.0;
    let half_weight = capacity.weight_kg / 2.0;

    let mut split = VanSplit {
        van1: Vec::new(),
        van2: Vec::new(),
        van1_volume_m3: 0.0,
        van1_weight_kg: 0.0,
        van2_volume_m3: 0.0,
        van2_weight_kg: 0.0,
    };
    let mut filling_van1 = true;

    for load in measure_bookings(bookings, catalog) {
        if filling_van1 && !split.van1.is_empty() {
            filling_van1 = split.van1_volume_m3 + load.volume_m3 <= half_volume
                && split.van1_weight_kg + load.weight_kg <= half_weight;
        }
        if filling_van1 {
            split.van1.push(load.booking.id.clone());
            split.van1_volume_m3 += load.volume_m3;
            split.van1_weight_kg += load.weight_kg;
        } else {
            split.van2.push(load.booking.id.clone());
            split.van2_volume_m3 += load.volume_m3;
            split.van2_weight_kg += load.weight_kg;
        }
    }
    split
}

/// Plans independent booking sets in parallel, one result per set.
pub fn plan_many<C: ItemCatalog + Sync + ?Sized>(
    booking_sets: &[Vec<BookingRequest>],
    catalog: &C,
    options: &PlanOptions,
) -> Vec<Result<RoutePlanResult, PlanError>> {
    booking_sets
        .par_iter()
        .map(|bookings| plan_capacity_constrained_route(bookings, catalog, options))
        .collect()
}

fn rejection_reasons(
    loads: &[BookingLoad<'_>],
    totals: &Totals,
    capacity: &EffectiveCapacity,
    tier: Tier,
    stop_count: usize,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if totals.volume_m3 > capacity.volume_m3 {
        reasons.push(format!(
            "Total volume {:.2}m³ exceeds effective capacity of {:.2}m³ ({} tier, {} stops)",
            totals.volume_m3, capacity.volume_m3, tier, stop_count
        ));
    }
    if totals.weight_kg > capacity.weight_kg {
        reasons.push(format!(
            "Total weight {:.0}kg exceeds available payload of {:.0}kg ({} tier, {} stops)",
            totals.weight_kg, capacity.weight_kg, tier, stop_count
        ));
    }
    for load in loads {
        if load.score(capacity) > 1.0 {
            reasons.push(format!(
                "Booking {} alone needs {:.2}m³ and {:.0}kg, more than one van carries",
                load.booking.id, load.volume_m3, load.weight_kg
            ));
        }
    }
    if reasons.is_empty() {
        reasons.push("No stop ordering keeps every leg within capacity".to_string());
    }
    reasons
}

fn rejection_suggestions<C: ItemCatalog + ?Sized>(
    bookings: &[BookingRequest],
    catalog: &C,
    options: &PlanOptions,
    best_attempt: Option<&RouteSolution>,
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if options.allow_multiple_vans {
        suggestions.push("Split the work across multiple vans".to_string());
        if bookings.len() > 1 {
            let split = suggest_van_split(bookings, catalog, options);
            suggestions.push(format!(
                "Van 1: {} ({:.2}m³, {:.0}kg); van 2: {} ({:.2}m³, {:.0}kg)",
                split.van1.join(", "),
                split.van1_volume_m3,
                split.van1_weight_kg,
                split.van2.join(", "),
                split.van2_volume_m3,
                split.van2_weight_kg
            ));
        }
    } else {
        suggestions.push("Split delivery into multiple trips".to_string());
        suggestions.push("Reduce the number or size of items".to_string());
    }

    if options.tier != Tier::Economy {
        suggestions.push(format!(
            "Economy tier keeps a smaller safety buffer than {} tier",
            options.tier
        ));
    }

    if let Some(violation) = best_attempt.and_then(|attempt| attempt.capacity_analysis.worst_violation()) {
        suggestions.push(format!("Closest attempt failed at {}", violation.message));
    }

    suggestions
}

fn push_unique(warnings: &mut Vec<String>, warning: String) {
    if !warnings.contains(&warning) {
        warnings.push(warning);
    }
}

fn sorted_by_size<'l, 'a>(
    loads: &'l [BookingLoad<'a>],
    capacity: &EffectiveCapacity,
) -> Vec<&'l BookingLoad<'a>> {
    let mut sorted: Vec<&BookingLoad<'a>> = loads.iter().collect();
    sorted.sort_by(|a, b| b.score(capacity).total_cmp(&a.score(capacity)));
    sorted
}

/// Express bookings first, then standard, then economy. Bookings without a
/// priority are served as standard.
fn priority_rank(booking: &BookingRequest) -> u8 {
    match booking.priority.unwrap_or(Tier::Standard) {
        Tier::Express => 0,
        Tier::Standard => 1,
        Tier::Economy => 2,
    }
}

fn batch_ordering(pickups: &[&BookingLoad<'_>], dropoffs: &[&BookingLoad<'_>]) -> Vec<Stop> {
    let mut sequence = StopSequence::with_capacity(pickups.len() + dropoffs.len());
    for load in pickups {
        sequence.pickup(load.booking);
    }
    for load in dropoffs {
        sequence.dropoff(load.booking);
    }
    sequence.finish()
}

/// Picks up `interval` bookings, then drops them in pickup order.
fn early_drop_ordering(order: &[&BookingLoad<'_>], interval: usize) -> Vec<Stop> {
    let mut sequence = StopSequence::with_capacity(order.len() * 2);
    for chunk in order.chunks(interval.max(1)) {
        for load in chunk {
            sequence.pickup(load.booking);
        }
        for load in chunk {
            sequence.dropoff(load.booking);
        }
    }
    sequence.finish()
}

fn dynamic_ordering(by_size: &[&BookingLoad<'_>], capacity: &EffectiveCapacity) -> Vec<Stop> {
    let mut sequence = StopSequence::with_capacity(by_size.len() * 2);
    let mut on_board: Vec<&BookingLoad<'_>> = Vec::new();
    let mut running_peak = 0.0_f64;
    let mut pending = by_size.iter().copied().peekable();

    loop {
        let pick_up = match pending.peek() {
            Some(next) => {
                on_board.is_empty()
                    || combined_ratio(capacity, &on_board, Some(*next)) <= running_peak
            }
            None => false,
        };

        if pick_up {
            if let Some(next) = pending.next() {
                on_board.push(next);
                sequence.pickup(next.booking);
                running_peak = running_peak.max(combined_ratio(capacity, &on_board, None));
            }
            continue;
        }

        // Unload the largest booking first to free the most room.
        let largest = on_board
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.score(capacity)
                    .total_cmp(&b.score(capacity))
                    .then(ib.cmp(ia))
            })
            .map(|(index, _)| index);
        match largest {
            Some(index) => {
                let load = on_board.remove(index);
                sequence.dropoff(load.booking);
            }
            None => break,
        }
    }

    sequence.finish()
}

fn combined_ratio(
    capacity: &EffectiveCapacity,
    on_board: &[&BookingLoad<'_>],
    extra: Option<&BookingLoad<'_>>,
) -> f64 {
    let (mut volume, mut weight) = on_board
        .iter()
        .fold((0.0, 0.0), |(v, w), load| (v + load.volume_m3, w + load.weight_kg));
    if let Some(load) = extra {
        volume += load.volume_m3;
        weight += load.weight_kg;
    }
    capacity.load_ratio(volume, weight)
}

/// Candidate reorderings around the stop at `critical`.
fn repair_moves(stops: &[Stop], critical: usize) -> Vec<Vec<Stop>> {
    let mut moves = Vec::new();

    // Pull each later dropoff in front of the overloaded stop.
    for from in (critical + 1)..stops.len() {
        if !stops[from].is_pickup() {
            moves.push(move_stop(stops, from, critical));
        }
    }

    // Delay the offending pickup until after a later dropoff.
    if stops[critical].is_pickup() {
        for after in (critical + 1)..stops.len() {
            if !stops[after].is_pickup() {
                moves.push(move_stop(stops, critical, after));
            }
        }
    }

    for index in 0..stops.len().saturating_sub(1) {
        let mut swapped = stops.to_vec();
        swapped.swap(index, index + 1);
        moves.push(booking::renumber(swapped));
    }

    moves
}

fn move_stop(stops: &[Stop], from: usize, to: usize) -> Vec<Stop> {
    let mut reordered = stops.to_vec();
    let stop = reordered.remove(from);
    reordered.insert(to.min(reordered.len()), stop);
    booking::renumber(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(id: &str) -> BookingRequest {
        BookingRequest::new(id, format!("{id} from"), format!("{id} to"), ["box"])
    }

    fn load(booking: &BookingRequest, volume_m3: f64) -> BookingLoad<'_> {
        BookingLoad {
            booking,
            volume_m3,
            weight_kg: 0.0,
            handling_minutes: 0.0,
            missing_ids: Vec::new(),
        }
    }

    fn ids(stops: &[Stop]) -> Vec<&str> {
        stops.iter().map(|s| s.id.as_str()).collect()
    }

    const CAPACITY: EffectiveCapacity = EffectiveCapacity {
        volume_m3: 10.0,
        weight_kg: 1000.0,
    };

    #[test]
    fn test_early_drop_interval() {
        let (a, b) = (booking("a"), booking("b"));
        let loads = [load(&a, 1.0), load(&b, 1.0)];
        let order: Vec<&BookingLoad<'_>> = loads.iter().collect();

        let every_one = early_drop_ordering(&order, 1);
        assert_eq!(ids(&every_one), ["a_pickup", "a_dropoff", "b_pickup", "b_dropoff"]);

        let every_two = early_drop_ordering(&order, 2);
        assert_eq!(ids(&every_two), ["a_pickup", "b_pickup", "a_dropoff", "b_dropoff"]);
    }

    #[test]
    fn test_dynamic_ordering_unloads_before_overfilling() {
        let (a, b, c) = (booking("a"), booking("b"), booking("c"));
        let loads = [load(&a, 6.0), load(&b, 5.0), load(&c, 1.0)];
        let by_size = sorted_by_size(&loads, &CAPACITY);

        let stops = dynamic_ordering(&by_size, &CAPACITY);

        assert_eq!(
            ids(&stops),
            ["a_pickup", "a_dropoff", "b_pickup", "c_pickup", "b_dropoff", "c_dropoff"]
        );
        assert!(booking::respects_precedence(&stops));
        let numbers: Vec<usize> = stops.iter().map(|s| s.sequence_number).collect();
        assert_eq!(numbers, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_move_stop_renumbers() {
        let a = booking("a");
        let stops = vec![a.pickup_stop(1), a.dropoff_stop(2), booking("b").pickup_stop(3)];

        let moved = move_stop(&stops, 2, 0);

        assert_eq!(ids(&moved), ["b_pickup", "a_pickup", "a_dropoff"]);
        assert_eq!(moved[0].sequence_number, 1);
        assert_eq!(moved[2].sequence_number, 3);
    }

    #[test]
    fn test_repair_moves_pull_dropoff_forward_first() {
        let (a, b) = (booking("a"), booking("b"));
        let stops = vec![a.pickup_stop(1), b.pickup_stop(2), a.dropoff_stop(3), b.dropoff_stop(4)];

        let moves = repair_moves(&stops, 1);

        assert_eq!(ids(&moves[0]), ["a_pickup", "a_dropoff", "b_pickup", "b_dropoff"]);
        assert!(moves.iter().all(|candidate| candidate.len() == stops.len()));
    }
}
