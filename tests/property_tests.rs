//! Property-based tests for the capacity planner.
//!
//! # Invariants tested
//!
//! - **Non-negative load:** No leg ever carries negative volume or weight.
//! - **Empty at the end:** A complete route finishes with an empty van.
//! - **Peak dominance:** The reported peak is at least every leg's load.
//! - **Idempotence:** Validating the same stops twice gives the same analysis.
//! - **Interleaving never hurts:** Dynamic ordering peaks no higher than batch.
//! - **Partition:** Grouping never routes a booking twice.

mod fixtures;

use std::collections::HashSet;

use fixtures::*;
use multidrop_planner::BookingRequest;
use multidrop_planner::booking::respects_precedence;
use multidrop_planner::grouping::{MultiBookingOptions, plan_multi_booking_routes};
use multidrop_planner::haversine::HaversineEstimator;
use multidrop_planner::planner::{
    OptimizationMethod, PlanOptions, plan_capacity_constrained_route, plan_with_strategy,
};
use multidrop_planner::profile::Tier;
use multidrop_planner::validator::{ValidationOptions, validate_leg_by_leg_capacity};
use proptest::prelude::*;

const ITEMS: [&str; 8] = [SMALL_BOX, MEDIUM_BOX, CRATE, SOFA, SAFE, PALLET, HALF_VAN, WARDROBE];

fn tier_strategy() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Economy), Just(Tier::Standard), Just(Tier::Express)]
}

/// One to five bookings of one to three catalog items each.
fn bookings_strategy() -> impl Strategy<Value = Vec<BookingRequest>> {
    prop::collection::vec(prop::collection::vec(0..ITEMS.len(), 1..4), 1..6).prop_map(|sets| {
        sets.iter()
            .enumerate()
            .map(|(i, items)| {
                let ids: Vec<&str> = items.iter().map(|&index| ITEMS[index]).collect();
                booking(&format!("b{i}"), &ids)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: loads stay non-negative, end at zero and never exceed the peak.
    #[test]
    fn batch_route_load_invariants(bookings in bookings_strategy(), tier in tier_strategy()) {
        let catalog = test_catalog();
        let stops = batch_stops(&bookings);

        let analysis =
            validate_leg_by_leg_capacity(&stops, &catalog, &ValidationOptions::for_tier(tier))
                .unwrap();

        for leg in &analysis.leg_states {
            prop_assert!(leg.cumulative_volume_m3 >= 0.0);
            prop_assert!(leg.cumulative_weight_kg >= 0.0);
            prop_assert!(leg.cumulative_volume_m3 <= analysis.peak_volume_m3);
            prop_assert!(leg.cumulative_weight_kg <= analysis.peak_weight_kg);
        }

        let last = analysis.leg_states.last().unwrap();
        prop_assert_eq!(last.cumulative_volume_m3, 0.0);
        prop_assert_eq!(last.cumulative_weight_kg, 0.0);
        prop_assert_eq!(last.active_item_count, 0);
        prop_assert_eq!(analysis.is_feasible, analysis.violations.is_empty());
    }

    /// Property: validation is a pure function of its inputs.
    #[test]
    fn validation_is_idempotent(bookings in bookings_strategy(), tier in tier_strategy()) {
        let catalog = test_catalog();
        let stops = batch_stops(&bookings);
        let options = ValidationOptions::for_tier(tier);

        let first = validate_leg_by_leg_capacity(&stops, &catalog, &options).unwrap();
        let second = validate_leg_by_leg_capacity(&stops, &catalog, &options).unwrap();

        prop_assert_eq!(first, second);
    }

    /// Property: dynamic ordering never peaks above the batch ordering.
    #[test]
    fn dynamic_ordering_peak_at_most_batch(bookings in bookings_strategy(), tier in tier_strategy()) {
        let catalog = test_catalog();
        let options = PlanOptions::for_tier(tier);

        let batch =
            plan_with_strategy(&bookings, &catalog, OptimizationMethod::Batch, &options).unwrap();
        let dynamic = plan_with_strategy(
            &bookings,
            &catalog,
            OptimizationMethod::DynamicCapacityReuse,
            &options,
        )
        .unwrap();

        prop_assert!(dynamic.peak_utilization() <= batch.peak_utilization() + 1e-9);
        prop_assert!(respects_precedence(&dynamic.stops));
    }

    /// Property: an accepted route is feasible, complete and well ordered.
    #[test]
    fn accepted_routes_are_feasible(bookings in bookings_strategy(), tier in tier_strategy()) {
        let catalog = test_catalog();

        let result =
            plan_capacity_constrained_route(&bookings, &catalog, &PlanOptions::for_tier(tier))
                .unwrap();

        prop_assert_eq!(result.is_feasible, result.primary_route.is_some());
        if let Some(route) = result.primary_route {
            prop_assert!(route.capacity_analysis.violations.is_empty());
            prop_assert_eq!(route.stops.len(), bookings.len() * 2);
            prop_assert!(respects_precedence(&route.stops));
            prop_assert!(route.iterations_required >= 1);
            for (index, stop) in route.stops.iter().enumerate() {
                prop_assert_eq!(stop.sequence_number, index + 1);
            }
        } else {
            prop_assert!(!result.rejection_reasons.is_empty());
        }
    }

    /// Property: grouping assigns each booking to at most one route.
    #[test]
    fn grouping_is_a_partition(
        bookings in bookings_strategy(),
        max_per_route in 1_usize..=4,
    ) {
        let catalog = test_catalog();
        let options = MultiBookingOptions {
            max_bookings_per_route: max_per_route,
            ..MultiBookingOptions::default()
        };

        let plan =
            plan_multi_booking_routes(&bookings, &catalog, &HaversineEstimator::default(), &options)
                .unwrap();

        let mut seen = HashSet::new();
        for route in &plan.recommended_routes {
            prop_assert!(route.booking_ids.len() <= max_per_route);
            prop_assert!(route.capacity_analysis.is_feasible);
            for id in &route.booking_ids {
                prop_assert!(seen.insert(id.clone()), "booking {} routed twice", id);
            }
        }
        if plan.success {
            prop_assert_eq!(seen.len(), bookings.len());
        }
    }
}
