//! Multi-booking route grouping.
//!
//! Partitions a set of bookings into van-sized groups and plans each group
//! with the single-route planner. Several partitioning strategies are tried;
//! a partition is only usable if every one of its groups is feasible. The
//! winner needs the fewest vans, then has the best mean efficiency.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::booking::{BookingRequest, Stop, validate_bookings};
use crate::catalog::CatalogCache;
use crate::error::PlanError;
use crate::planner::{
    BookingLoad, OptimizationMethod, PlanOptions, RouteSolution, measure_bookings,
    plan_capacity_constrained_route,
};
use crate::profile::{
    CapacityProfile, EffectiveCapacity, HIGH_UTILIZATION_THRESHOLD, LOW_UTILIZATION_THRESHOLD,
    Tier,
};
use crate::traits::{DistanceEstimator, ItemCatalog};
use crate::validator::CapacityAnalysis;

/// Hard ceiling on bookings per route, whatever the caller asks for.
pub const MAX_BOOKINGS_PER_ROUTE: usize = 10;

/// Share of route efficiency that comes from capacity use; the rest is
/// geographic compactness.
const CAPACITY_SHARE_OF_ROUTE_EFFICIENCY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct MultiBookingOptions {
    pub tier: Tier,
    pub max_bookings_per_route: usize,
    pub min_bookings_per_route: usize,
    pub allow_multiple_vans: bool,
    /// Rank partitions by capacity efficiency instead of route efficiency.
    pub prioritize_capacity_efficiency: bool,
    /// Repair budget handed to each single-route planning call.
    pub max_iterations: usize,
    pub profile: CapacityProfile,
}

impl Default for MultiBookingOptions {
    fn default() -> Self {
        Self {
            tier: Tier::Economy,
            max_bookings_per_route: MAX_BOOKINGS_PER_ROUTE,
            min_bookings_per_route: 1,
            allow_multiple_vans: true,
            prioritize_capacity_efficiency: true,
            max_iterations: 100,
            profile: CapacityProfile::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// Input order, cut into equally sized chunks.
    Sequential,
    /// First-fit packing, largest bookings first.
    CapacityFirst,
    /// Nearest-neighbour clustering on pickup and delivery points.
    Geographic,
    /// One booking per van. Last resort.
    SingleBooking,
}

impl GroupingStrategy {
    pub const ALL: [GroupingStrategy; 4] = [
        GroupingStrategy::Sequential,
        GroupingStrategy::CapacityFirst,
        GroupingStrategy::Geographic,
        GroupingStrategy::SingleBooking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingStrategy::Sequential => "sequential",
            GroupingStrategy::CapacityFirst => "capacity_first",
            GroupingStrategy::Geographic => "geographic",
            GroupingStrategy::SingleBooking => "single_booking",
        }
    }
}

/// One planned van route within a grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub route_id: String,
    pub booking_ids: Vec<String>,
    pub tier: Tier,
    pub stops: Vec<Stop>,
    pub capacity_analysis: CapacityAnalysis,
    /// Peak utilization, capped at 1.
    pub capacity_efficiency: f64,
    /// Blend of capacity efficiency and geographic compactness, in [0, 1].
    pub route_efficiency: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_minutes: f64,
    pub optimization_method: OptimizationMethod,
}

/// A complete partition of the bookings into routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGrouping {
    pub strategy: GroupingStrategy,
    pub routes: Vec<RouteGroup>,
    pub total_vans: usize,
    /// Mean capacity efficiency across routes.
    pub capacity_efficiency: f64,
    /// Mean route efficiency across routes.
    pub route_efficiency: f64,
}

impl RouteGrouping {
    fn new(strategy: GroupingStrategy, routes: Vec<RouteGroup>) -> Self {
        let count = routes.len().max(1) as f64;
        let capacity_efficiency = routes.iter().map(|r| r.capacity_efficiency).sum::<f64>() / count;
        let route_efficiency = routes.iter().map(|r| r.route_efficiency).sum::<f64>() / count;
        Self {
            strategy,
            total_vans: routes.len(),
            routes,
            capacity_efficiency,
            route_efficiency,
        }
    }

    /// Efficiency used for ranking.
    fn score(&self, prioritize_capacity: bool) -> f64 {
        if prioritize_capacity {
            self.capacity_efficiency
        } else {
            self.route_efficiency
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiBookingPlan {
    pub success: bool,
    pub all_bookings_fit: bool,
    pub strategy: Option<GroupingStrategy>,
    pub recommended_routes: Vec<RouteGroup>,
    pub requires_multiple_vans: bool,
    /// Mean peak utilization across recommended routes, as a percentage.
    pub average_capacity_utilization: f64,
    pub alternative_groupings: Vec<RouteGrouping>,
    pub suggestions: Vec<String>,
    pub warnings: Vec<String>,
    pub total_bookings: usize,
    pub bookings_per_route: Vec<usize>,
}

impl MultiBookingPlan {
    fn empty(total_bookings: usize) -> Self {
        Self {
            success: false,
            all_bookings_fit: false,
            strategy: None,
            recommended_routes: Vec::new(),
            requires_multiple_vans: false,
            average_capacity_utilization: 0.0,
            alternative_groupings: Vec::new(),
            suggestions: Vec::new(),
            warnings: Vec::new(),
            total_bookings,
            bookings_per_route: Vec::new(),
        }
    }
}

/// Groups bookings into capacity-feasible van routes.
pub fn plan_multi_booking_routes<C, D>(
    bookings: &[BookingRequest],
    catalog: &C,
    estimator: &D,
    options: &MultiBookingOptions,
) -> Result<MultiBookingPlan, PlanError>
where
    C: ItemCatalog + ?Sized,
    D: DistanceEstimator + ?Sized,
{
    options.profile.validate()?;
    if options.max_bookings_per_route == 0
        || options.min_bookings_per_route > options.max_bookings_per_route
    {
        return Err(PlanError::InvalidRouteWindow {
            min: options.min_bookings_per_route,
            max: options.max_bookings_per_route,
        });
    }

    let mut plan = MultiBookingPlan::empty(bookings.len());
    if bookings.is_empty() {
        plan.warnings.push(PlanError::NoBookings.to_string());
        return Ok(plan);
    }
    validate_bookings(bookings)?;

    let cache = CatalogCache::new(catalog);
    let all_ids: Vec<String> = bookings
        .iter()
        .flat_map(|booking| booking.item_ids.iter().cloned())
        .collect();
    cache.prefetch(&all_ids);
    let loads = measure_bookings(bookings, &cache);

    let tier = options.tier;
    let max_per_route = options
        .max_bookings_per_route
        .min(MAX_BOOKINGS_PER_ROUTE)
        .min(options.profile.max_stops(tier) / 2)
        .max(1);
    let min_per_route = options.min_bookings_per_route.min(max_per_route);
    if max_per_route < options.max_bookings_per_route {
        plan.warnings.push(format!(
            "Bookings per route capped at {max_per_route} for {tier} tier"
        ));
    }

    let packing = Packing {
        loads: &loads,
        capacity: options.profile.effective_capacity(tier, max_per_route * 2),
        max_per_route,
        min_per_route,
    };
    let plan_options = PlanOptions {
        tier,
        max_iterations: options.max_iterations,
        allow_multiple_vans: options.allow_multiple_vans,
        profile: options.profile.clone(),
    };

    let prioritize = options.prioritize_capacity_efficiency;
    let first = evaluate_groupings(&packing, &cache, estimator, &plan_options, prioritize)?;

    if first.unroutable.is_empty() {
        let mut groupings = first.groupings.into_iter();
        if let Some(best) = groupings.next() {
            plan.success = true;
            plan.all_bookings_fit = true;
            plan.strategy = Some(best.strategy);
            plan.recommended_routes = best.routes;
            plan.alternative_groupings = groupings.collect();
        }
    } else {
        plan.warnings.push(format!(
            "Bookings too large for a single van even alone: {}",
            first.unroutable.join(", ")
        ));
        plan.suggestions
            .push("Split the items of oversized bookings across several vans".to_string());

        // Regroup the bookings that fit on their own.
        let routable: Vec<BookingLoad<'_>> = loads
            .iter()
            .filter(|load| !first.unroutable.contains(&load.booking.id))
            .cloned()
            .collect();
        let rest = if routable.is_empty() {
            None
        } else {
            let packing = Packing {
                loads: &routable,
                capacity: packing.capacity,
                max_per_route,
                min_per_route,
            };
            Some(evaluate_groupings(&packing, &cache, estimator, &plan_options, prioritize)?)
        };

        let mut groupings = rest.map(|rest| rest.groupings).unwrap_or_default().into_iter();
        match groupings.next() {
            Some(best) => {
                plan.strategy = Some(best.strategy);
                plan.recommended_routes = best.routes;
                plan.alternative_groupings = groupings.collect();
            }
            None => plan.recommended_routes = first.fallback_routes,
        }
    }

    summarize_plan(&mut plan);

    info!(
        bookings = bookings.len(),
        routes = plan.recommended_routes.len(),
        success = plan.success,
        strategy = plan.strategy.map(|s| s.as_str()).unwrap_or("none"),
        "multi-booking plan complete"
    );

    Ok(plan)
}

/// Every usable grouping of one packing, best first.
struct Evaluation {
    groupings: Vec<RouteGrouping>,
    /// Bookings that fail even on a route of their own.
    unroutable: Vec<String>,
    /// Routes of the single-booking partition when some bookings failed.
    fallback_routes: Vec<RouteGroup>,
}

fn evaluate_groupings<K, D>(
    packing: &Packing<'_, '_>,
    catalog: &K,
    estimator: &D,
    plan_options: &PlanOptions,
    prioritize: bool,
) -> Result<Evaluation, PlanError>
where
    K: ItemCatalog + ?Sized,
    D: DistanceEstimator + ?Sized,
{
    let loads = packing.loads;
    let mut evaluation = Evaluation {
        groupings: Vec::new(),
        unroutable: Vec::new(),
        fallback_routes: Vec::new(),
    };
    let mut seen_partitions: HashSet<Vec<Vec<usize>>> = HashSet::new();

    for strategy in GroupingStrategy::ALL {
        let partition = packing.partition(strategy, estimator);
        if !seen_partitions.insert(partition.clone()) {
            debug!(strategy = strategy.as_str(), "duplicate partition skipped");
            continue;
        }

        let mut routes = Vec::with_capacity(partition.len());
        let mut failed = Vec::new();
        for (index, group) in partition.iter().enumerate() {
            let members: Vec<BookingRequest> =
                group.iter().map(|&i| loads[i].booking.clone()).collect();
            let result = plan_capacity_constrained_route(&members, catalog, plan_options)?;
            match result.primary_route {
                Some(solution) => {
                    let route_id = format!("{}-{}", strategy.as_str(), index + 1);
                    routes.push(route_group(route_id, &members, loads, group, solution, estimator));
                }
                None => failed.extend(members.into_iter().map(|booking| booking.id)),
            }
        }

        debug!(
            strategy = strategy.as_str(),
            routes = routes.len(),
            failed = failed.len(),
            "evaluated grouping"
        );

        if failed.is_empty() {
            evaluation.groupings.push(RouteGrouping::new(strategy, routes));
        } else if partition.iter().all(|group| group.len() == 1) {
            evaluation.unroutable = failed;
            evaluation.fallback_routes = routes;
        }
    }

    // Stable: equal groupings keep strategy order.
    evaluation.groupings.sort_by(|a, b| {
        a.total_vans
            .cmp(&b.total_vans)
            .then(b.score(prioritize).total_cmp(&a.score(prioritize)))
    });
    Ok(evaluation)
}

fn summarize_plan(plan: &mut MultiBookingPlan) {
    let routes = &plan.recommended_routes;
    plan.bookings_per_route = routes.iter().map(|r| r.booking_ids.len()).collect();
    plan.requires_multiple_vans = routes.len() > 1 || !plan.all_bookings_fit;
    plan.average_capacity_utilization = if routes.is_empty() {
        0.0
    } else {
        routes.iter().map(|r| r.capacity_efficiency).sum::<f64>() / routes.len() as f64 * 100.0
    };

    if routes.len() > 1 {
        plan.suggestions
            .push(format!("Requires {} vans for this booking set", routes.len()));
    }
    if !routes.is_empty() {
        let average = plan.average_capacity_utilization;
        if average > HIGH_UTILIZATION_THRESHOLD * 100.0 {
            plan.warnings.push(format!(
                "High capacity utilization ({average:.1}%), routes may be tight"
            ));
        } else if average < LOW_UTILIZATION_THRESHOLD * 100.0 {
            plan.suggestions.push(format!(
                "Low capacity utilization ({average:.1}%), consider combining more bookings"
            ));
        }
    }
}

fn route_group<D: DistanceEstimator + ?Sized>(
    route_id: String,
    members: &[BookingRequest],
    loads: &[BookingLoad<'_>],
    group: &[usize],
    solution: RouteSolution,
    estimator: &D,
) -> RouteGroup {
    let route_km: f64 = solution
        .stops
        .windows(2)
        .map(|pair| estimator.distance_km(&pair[0].location, &pair[1].location))
        .sum();
    let direct_km: f64 = members
        .iter()
        .map(|booking| estimator.distance_km(&booking.pickup, &booking.delivery))
        .sum();
    let handling_minutes: f64 = group.iter().map(|&i| loads[i].handling_minutes).sum();

    let compactness = if route_km > 0.0 {
        (direct_km / route_km).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let capacity_efficiency = solution.peak_utilization().clamp(0.0, 1.0);
    let route_efficiency = (CAPACITY_SHARE_OF_ROUTE_EFFICIENCY * capacity_efficiency
        + (1.0 - CAPACITY_SHARE_OF_ROUTE_EFFICIENCY) * compactness)
        .clamp(0.0, 1.0);

    RouteGroup {
        route_id,
        booking_ids: members.iter().map(|booking| booking.id.clone()).collect(),
        tier: solution.tier,
        capacity_efficiency,
        route_efficiency,
        estimated_distance_km: route_km,
        estimated_duration_minutes: estimator.travel_minutes(route_km) + handling_minutes,
        optimization_method: solution.optimization_method,
        stops: solution.stops,
        capacity_analysis: solution.capacity_analysis,
    }
}

/// Partitioning rules shared by every strategy.
struct Packing<'l, 'a> {
    loads: &'l [BookingLoad<'a>],
    /// Capacity of the longest allowed route; a group whose summed load
    /// fits here is feasible even with batch ordering.
    capacity: EffectiveCapacity,
    max_per_route: usize,
    min_per_route: usize,
}

impl Packing<'_, '_> {
    /// Groups of indices into `loads`, each group in booking order.
    fn partition<D: DistanceEstimator + ?Sized>(
        &self,
        strategy: GroupingStrategy,
        estimator: &D,
    ) -> Vec<Vec<usize>> {
        let mut groups = match strategy {
            GroupingStrategy::Sequential => self.sequential(),
            GroupingStrategy::CapacityFirst => self.capacity_first(),
            GroupingStrategy::Geographic => self.geographic(estimator),
            GroupingStrategy::SingleBooking => {
                return (0..self.loads.len()).map(|i| vec![i]).collect();
            }
        };
        self.merge_short_tail(&mut groups);
        for group in &mut groups {
            group.sort_unstable();
        }
        groups
    }

    fn sequential(&self) -> Vec<Vec<usize>> {
        let n = self.loads.len();
        let route_count = n.div_ceil(self.max_per_route);
        let size = n.div_ceil(route_count.max(1)).max(1);
        (0..n)
            .collect::<Vec<_>>()
            .chunks(size)
            .map(<[usize]>::to_vec)
            .collect()
    }

    fn capacity_first(&self) -> Vec<Vec<usize>> {
        let mut remaining: Vec<usize> = (0..self.loads.len()).collect();
        remaining.sort_by(|&a, &b| {
            self.loads[b]
                .score(&self.capacity)
                .total_cmp(&self.loads[a].score(&self.capacity))
        });

        let mut groups = Vec::new();
        while !remaining.is_empty() {
            let mut group: Vec<usize> = Vec::new();
            remaining.retain(|&index| {
                if group.len() < self.max_per_route && (group.is_empty() || self.fits_with(&group, index))
                {
                    group.push(index);
                    false
                } else {
                    true
                }
            });
            groups.push(group);
        }
        groups
    }

    fn geographic<D: DistanceEstimator + ?Sized>(&self, estimator: &D) -> Vec<Vec<usize>> {
        let mut remaining: Vec<usize> = (0..self.loads.len()).collect();
        let mut groups = Vec::new();

        while !remaining.is_empty() {
            let seed = remaining.remove(0);
            let mut group = vec![seed];

            while group.len() < self.max_per_route {
                let last = self.loads[group[group.len() - 1]].booking;
                let nearest = remaining
                    .iter()
                    .enumerate()
                    .filter(|(_, index)| self.fits_with(&group, **index))
                    .map(|(position, &index)| {
                        let candidate = self.loads[index].booking;
                        let km = estimator.distance_km(&last.pickup, &candidate.pickup)
                            + estimator.distance_km(&last.delivery, &candidate.delivery);
                        (position, km)
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                match nearest {
                    Some((position, _)) => group.push(remaining.remove(position)),
                    None => break,
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Folds a trailing group below the minimum into its predecessor.
    fn merge_short_tail(&self, groups: &mut Vec<Vec<usize>>) {
        if groups.len() < 2 {
            return;
        }
        let last = groups.len() - 1;
        if groups[last].len() >= self.min_per_route {
            return;
        }
        let merged_len = groups[last].len() + groups[last - 1].len();
        let fits = self.fits_group(groups[last - 1].iter().chain(groups[last].iter()).copied());
        if merged_len <= self.max_per_route && fits {
            if let Some(tail) = groups.pop() {
                groups[last - 1].extend(tail);
            }
        }
    }

    fn fits_with(&self, group: &[usize], candidate: usize) -> bool {
        self.fits_group(group.iter().copied().chain(std::iter::once(candidate)))
    }

    fn fits_group(&self, members: impl Iterator<Item = usize>) -> bool {
        let (volume, weight) = members.fold((0.0, 0.0), |(v, w), index| {
            (v + self.loads[index].volume_m3, w + self.loads[index].weight_kg)
        });
        volume <= self.capacity.volume_m3 && weight <= self.capacity.weight_kg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookings(count: usize) -> Vec<BookingRequest> {
        (0..count)
            .map(|i| BookingRequest::new(format!("b{i}"), "from", "to", ["box"]))
            .collect()
    }

    fn loads<'a>(bookings: &'a [BookingRequest], volumes: &[f64]) -> Vec<BookingLoad<'a>> {
        bookings
            .iter()
            .zip(volumes)
            .map(|(booking, &volume_m3)| BookingLoad {
                booking,
                volume_m3,
                weight_kg: 0.0,
                handling_minutes: 0.0,
                missing_ids: Vec::new(),
            })
            .collect()
    }

    fn packing<'l, 'a>(
        loads: &'l [BookingLoad<'a>],
        max_per_route: usize,
        min_per_route: usize,
    ) -> Packing<'l, 'a> {
        Packing {
            loads,
            capacity: EffectiveCapacity {
                volume_m3: 10.0,
                weight_kg: 1000.0,
            },
            max_per_route,
            min_per_route,
        }
    }

    #[test]
    fn test_sequential_balances_chunks() {
        let bookings = bookings(5);
        let loads = loads(&bookings, &[1.0; 5]);

        let groups = packing(&loads, 4, 1).sequential();

        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_capacity_first_packs_largest_first() {
        let bookings = bookings(3);
        let loads = loads(&bookings, &[8.0, 8.0, 1.0]);

        let groups = packing(&loads, 10, 1).capacity_first();

        assert_eq!(groups, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_short_tail_merged_when_it_fits() {
        let bookings = bookings(3);
        let loads = loads(&bookings, &[2.0, 2.0, 2.0]);
        let mut groups = vec![vec![0, 1], vec![2]];

        packing(&loads, 3, 2).merge_short_tail(&mut groups);

        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_short_tail_kept_when_over_capacity() {
        let bookings = bookings(3);
        let loads = loads(&bookings, &[5.0, 4.0, 3.0]);
        let mut groups = vec![vec![0, 1], vec![2]];

        packing(&loads, 3, 2).merge_short_tail(&mut groups);

        assert_eq!(groups.len(), 2);
    }
}
