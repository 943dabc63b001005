//! Vehicle capacity profile.
//!
//! Usable volume and payload of the van, per-tier safety buffers and the
//! multi-drop degradation rule. The thresholds below are shared by the
//! validator, both planners and the pricing component, so they are named
//! constants rather than literals at the call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Usable cargo volume of a Luton van, net of wheel arches (m³).
pub const LUTON_USABLE_VOLUME_M3: f64 = 16.0;

/// Safe working payload minus driver and equipment (kg).
pub const LUTON_AVAILABLE_PAYLOAD_KG: f64 = 1350.0;

/// Volume lost to packing inefficiency for every stop after the first.
pub const VOLUME_DEGRADATION_PER_STOP: f64 = 0.02;

/// Combined buffer at or above which a configuration is rejected.
pub const MAX_COMBINED_BUFFER: f64 = 0.5;

/// Routes longer than this are allowed but flagged.
pub const MAX_RECOMMENDED_STOPS: usize = 5;

/// Volume utilization below which a load is flagged as wasting the van.
pub const LOW_UTILIZATION_THRESHOLD: f64 = 0.30;

/// Utilization above which a load is flagged as a tight fit.
pub const HIGH_UTILIZATION_THRESHOLD: f64 = 0.85;

/// Utilization at which the status band turns critical.
pub const CRITICAL_UTILIZATION_THRESHOLD: f64 = 0.95;

/// Raw utilization at which the capacity premium applies.
pub const PREMIUM_UTILIZATION_THRESHOLD: f64 = 0.85;

/// Price multiplier for loads at or above the premium threshold.
pub const PREMIUM_MULTIPLIER: f64 = 1.15;

/// Price multiplier for every other load. There is no discount band.
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

/// Service tier. Faster tiers keep a larger safety margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Economy,
    Standard,
    Express,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Economy, Tier::Standard, Tier::Express];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Economy => "economy",
            Tier::Standard => "standard",
            Tier::Express => "express",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Fractions of raw capacity held back, per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBuffer {
    pub volume: f64,
    pub weight: f64,
}

impl TierBuffer {
    pub const fn new(volume: f64, weight: f64) -> Self {
        Self { volume, weight }
    }

    /// The larger of the two buffers.
    pub fn worst(&self) -> f64 {
        self.volume.max(self.weight)
    }
}

/// Capacity left after buffers and degradation: the feasibility threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveCapacity {
    pub volume_m3: f64,
    pub weight_kg: f64,
}

impl EffectiveCapacity {
    /// Utilization of a load as `(volume, weight)` fractions.
    pub fn utilization(&self, volume_m3: f64, weight_kg: f64) -> (f64, f64) {
        (
            ratio(volume_m3, self.volume_m3),
            ratio(weight_kg, self.weight_kg),
        )
    }

    /// The binding utilization of a load: the higher of the two dimensions.
    pub fn load_ratio(&self, volume_m3: f64, weight_kg: f64) -> f64 {
        let (volume, weight) = self.utilization(volume_m3, weight_kg);
        volume.max(weight)
    }
}

/// Outcome of [`CapacityProfile::is_within_capacity`].
///
/// `reasons` is filled even when the load fits, so callers can surface soft
/// warnings such as low or high utilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityCheck {
    pub fits: bool,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityLevel {
    Optimal,
    High,
    Critical,
    Exceeded,
}

/// UI-facing utilization band. Not used for feasibility decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityStatus {
    pub level: CapacityLevel,
    pub message: String,
}

/// Physical and operational capacity of one vehicle.
///
/// `Default` is the Luton van every booking is planned against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityProfile {
    pub usable_volume_m3: f64,
    pub available_payload_kg: f64,
    pub economy: TierBuffer,
    pub standard: TierBuffer,
    pub express: TierBuffer,
    /// Added to the volume buffer for every stop after the first.
    pub volume_degradation_per_stop: f64,
    /// Added to the weight buffer for every stop after the first.
    pub weight_degradation_per_stop: f64,
    pub max_recommended_stops: usize,
}

impl Default for CapacityProfile {
    fn default() -> Self {
        Self::luton()
    }
}

impl CapacityProfile {
    pub fn luton() -> Self {
        Self {
            usable_volume_m3: LUTON_USABLE_VOLUME_M3,
            available_payload_kg: LUTON_AVAILABLE_PAYLOAD_KG,
            economy: TierBuffer::new(0.05, 0.10),
            standard: TierBuffer::new(0.10, 0.10),
            express: TierBuffer::new(0.15, 0.15),
            volume_degradation_per_stop: VOLUME_DEGRADATION_PER_STOP,
            weight_degradation_per_stop: 0.0,
            max_recommended_stops: MAX_RECOMMENDED_STOPS,
        }
    }

    /// Parses a profile from JSON; omitted fields keep their Luton defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PlanError> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if !(self.usable_volume_m3 > 0.0) || !(self.available_payload_kg > 0.0) {
            return Err(PlanError::InvalidProfile {
                reason: format!(
                    "capacity must be positive, got {}m³ / {}kg",
                    self.usable_volume_m3, self.available_payload_kg
                ),
            });
        }

        for tier in Tier::ALL {
            let buffer = self.tier_buffer(tier);
            let in_range = |value: f64| (0.0..MAX_COMBINED_BUFFER).contains(&value);
            if !in_range(buffer.volume) || !in_range(buffer.weight) {
                return Err(PlanError::InvalidProfile {
                    reason: format!(
                        "{tier} buffer must lie in [0, {MAX_COMBINED_BUFFER}), got {}/{}",
                        buffer.volume, buffer.weight
                    ),
                });
            }
        }

        if !(self.volume_degradation_per_stop >= 0.0) || !(self.weight_degradation_per_stop >= 0.0)
        {
            return Err(PlanError::InvalidProfile {
                reason: "degradation per stop must not be negative".to_string(),
            });
        }

        Ok(())
    }

    pub fn tier_buffer(&self, tier: Tier) -> TierBuffer {
        match tier {
            Tier::Economy => self.economy,
            Tier::Standard => self.standard,
            Tier::Express => self.express,
        }
    }

    /// Tier buffer plus multi-drop degradation for a route of `stop_count` stops.
    pub fn combined_buffer(&self, tier: Tier, stop_count: usize) -> TierBuffer {
        let extra_stops = stop_count.saturating_sub(1) as f64;
        let base = self.tier_buffer(tier);
        TierBuffer {
            volume: base.volume + self.volume_degradation_per_stop * extra_stops,
            weight: base.weight + self.weight_degradation_per_stop * extra_stops,
        }
    }

    /// `base × (1 − tier buffer − degradation)`, per dimension. Uncapped.
    pub fn effective_capacity(&self, tier: Tier, stop_count: usize) -> EffectiveCapacity {
        let buffer = self.combined_buffer(tier, stop_count);
        EffectiveCapacity {
            volume_m3: self.usable_volume_m3 * (1.0 - buffer.volume),
            weight_kg: self.available_payload_kg * (1.0 - buffer.weight),
        }
    }

    /// Effective capacity, or an error once the combined buffer reaches 50%.
    pub fn checked_capacity(
        &self,
        tier: Tier,
        stop_count: usize,
    ) -> Result<EffectiveCapacity, PlanError> {
        let buffer = self.combined_buffer(tier, stop_count).worst();
        if buffer >= MAX_COMBINED_BUFFER {
            return Err(PlanError::ExcessiveBuffer {
                tier,
                stop_count,
                buffer,
            });
        }
        Ok(self.effective_capacity(tier, stop_count))
    }

    /// Longest route, in stops, whose combined buffer stays under 50%.
    pub fn max_stops(&self, tier: Tier) -> usize {
        const SEARCH_LIMIT: usize = 10_000;

        if self.checked_capacity(tier, 1).is_err() {
            return 0;
        }
        let mut stops = 1;
        while stops < SEARCH_LIMIT && self.checked_capacity(tier, stops + 1).is_ok() {
            stops += 1;
        }
        stops
    }

    pub fn is_within_capacity(
        &self,
        volume_m3: f64,
        weight_kg: f64,
        tier: Tier,
        stop_count: usize,
    ) -> CapacityCheck {
        let volume_m3 = volume_m3.max(0.0);
        let weight_kg = weight_kg.max(0.0);
        let stop_count = stop_count.max(1);

        let capacity = self.effective_capacity(tier, stop_count);
        let (volume_utilization, weight_utilization) = capacity.utilization(volume_m3, weight_kg);

        let mut fits = true;
        let mut reasons = Vec::new();

        let buffer = self.combined_buffer(tier, stop_count).worst();
        if buffer >= MAX_COMBINED_BUFFER {
            fits = false;
            reasons.push(format!(
                "Combined buffer of {:.0}% at {} stops leaves no safe capacity ({} tier)",
                buffer * 100.0,
                stop_count,
                tier
            ));
        }

        if volume_utilization > 1.0 {
            fits = false;
            reasons.push(format!(
                "Volume exceeds capacity: {:.2}m³ > {:.2}m³ ({:.1}% utilization)",
                volume_m3,
                capacity.volume_m3,
                volume_utilization * 100.0
            ));
        }

        if weight_utilization > 1.0 {
            fits = false;
            reasons.push(format!(
                "Weight exceeds capacity: {:.0}kg > {:.0}kg ({:.1}% utilization)",
                weight_kg,
                capacity.weight_kg,
                weight_utilization * 100.0
            ));
        }

        if volume_utilization < LOW_UTILIZATION_THRESHOLD {
            reasons.push(format!(
                "Low volume utilization: {:.1}% (inefficient use of van)",
                volume_utilization * 100.0
            ));
        }

        if volume_utilization > HIGH_UTILIZATION_THRESHOLD {
            reasons.push(format!(
                "High volume utilization: {:.1}% (tight fit)",
                volume_utilization * 100.0
            ));
        }

        if weight_utilization > HIGH_UTILIZATION_THRESHOLD {
            reasons.push(format!(
                "High weight utilization: {:.1}% (near legal limit)",
                weight_utilization * 100.0
            ));
        }

        CapacityCheck {
            fits,
            volume_utilization,
            weight_utilization,
            reasons,
        }
    }

    /// Premium for loads near raw (unbuffered) capacity. Never a discount.
    pub fn pricing_multiplier(&self, volume_m3: f64, weight_kg: f64) -> f64 {
        let volume = ratio(volume_m3.max(0.0), self.usable_volume_m3);
        let weight = ratio(weight_kg.max(0.0), self.available_payload_kg);

        if volume.max(weight) >= PREMIUM_UTILIZATION_THRESHOLD {
            PREMIUM_MULTIPLIER
        } else {
            NEUTRAL_MULTIPLIER
        }
    }
}

/// [`CapacityProfile::effective_capacity`] for the Luton van.
pub fn effective_capacity(tier: Tier, stop_count: usize) -> EffectiveCapacity {
    CapacityProfile::luton().effective_capacity(tier, stop_count)
}

/// [`CapacityProfile::is_within_capacity`] for the Luton van.
pub fn is_within_capacity(
    volume_m3: f64,
    weight_kg: f64,
    tier: Tier,
    stop_count: usize,
) -> CapacityCheck {
    CapacityProfile::luton().is_within_capacity(volume_m3, weight_kg, tier, stop_count)
}

/// [`CapacityProfile::pricing_multiplier`] for the Luton van.
pub fn capacity_pricing_multiplier(volume_m3: f64, weight_kg: f64) -> f64 {
    CapacityProfile::luton().pricing_multiplier(volume_m3, weight_kg)
}

/// Buckets the higher of two utilizations into a status band.
pub fn capacity_status(volume_utilization: f64, weight_utilization: f64) -> CapacityStatus {
    let utilization = volume_utilization.max(weight_utilization);

    let (level, message) = if utilization > 1.0 {
        (CapacityLevel::Exceeded, "Capacity exceeded - not feasible")
    } else if utilization >= CRITICAL_UTILIZATION_THRESHOLD {
        (CapacityLevel::Critical, "Critical capacity - very tight fit")
    } else if utilization >= HIGH_UTILIZATION_THRESHOLD {
        (CapacityLevel::High, "High capacity - tight fit")
    } else {
        (CapacityLevel::Optimal, "Optimal capacity - good fit")
    };

    CapacityStatus {
        level,
        message: message.to_string(),
    }
}

fn ratio(load: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        load / capacity
    } else if load > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_capacity_economy_two_stops() {
        let capacity = effective_capacity(Tier::Economy, 2);
        assert!((capacity.volume_m3 - 14.88).abs() < 1e-9);
        assert!((capacity.weight_kg - 1215.0).abs() < 1e-9);
    }

    #[test]
    fn test_express_is_most_conservative() {
        let economy = effective_capacity(Tier::Economy, 1);
        let standard = effective_capacity(Tier::Standard, 1);
        let express = effective_capacity(Tier::Express, 1);

        assert!(express.volume_m3 < standard.volume_m3);
        assert!(standard.volume_m3 < economy.volume_m3);
        assert!(express.weight_kg < economy.weight_kg);
    }

    #[test]
    fn test_degradation_grows_with_stops() {
        let short = effective_capacity(Tier::Standard, 2);
        let long = effective_capacity(Tier::Standard, 6);
        assert!(long.volume_m3 < short.volume_m3);
        // Weight does not degrade in the default profile.
        assert_eq!(long.weight_kg, short.weight_kg);
    }

    #[test]
    fn test_negative_inputs_treated_as_zero() {
        let check = is_within_capacity(-3.0, -100.0, Tier::Economy, 2);
        assert!(check.fits);
        assert_eq!(check.volume_utilization, 0.0);
        assert_eq!(check.weight_utilization, 0.0);
    }

    #[test]
    fn test_reasons_present_even_when_fitting() {
        let check = is_within_capacity(1.0, 50.0, Tier::Economy, 2);
        assert!(check.fits);
        assert!(check.reasons.iter().any(|r| r.contains("Low volume utilization")));
    }

    #[test]
    fn test_overweight_load_does_not_fit() {
        let check = is_within_capacity(4.0, 1500.0, Tier::Economy, 2);
        assert!(!check.fits);
        assert!(check.reasons.iter().any(|r| r.contains("Weight exceeds capacity")));
        assert!(check.reasons.iter().any(|r| r.contains("High weight utilization")));
    }

    #[test]
    fn test_excessive_buffer_is_reported() {
        let profile = CapacityProfile::luton();
        let check = profile.is_within_capacity(1.0, 10.0, Tier::Express, 30);
        assert!(!check.fits);
        assert!(check.reasons[0].contains("Combined buffer"));
        assert!(profile.checked_capacity(Tier::Express, 30).is_err());
    }

    #[test]
    fn test_max_stops_per_tier() {
        let profile = CapacityProfile::luton();
        assert_eq!(profile.max_stops(Tier::Economy), 23);
        assert_eq!(profile.max_stops(Tier::Express), 18);
    }

    #[test]
    fn test_pricing_multiplier_premium_only() {
        assert_eq!(capacity_pricing_multiplier(14.4, 100.0), PREMIUM_MULTIPLIER);
        assert_eq!(capacity_pricing_multiplier(1.0, 1200.0), PREMIUM_MULTIPLIER);
        assert_eq!(capacity_pricing_multiplier(8.0, 500.0), NEUTRAL_MULTIPLIER);
        assert_eq!(capacity_pricing_multiplier(0.0, 0.0), NEUTRAL_MULTIPLIER);
    }

    #[test]
    fn test_capacity_status_bands() {
        assert_eq!(capacity_status(0.5, 0.2).level, CapacityLevel::Optimal);
        assert_eq!(capacity_status(0.2, 0.86).level, CapacityLevel::High);
        assert_eq!(capacity_status(0.96, 0.1).level, CapacityLevel::Critical);
        assert_eq!(capacity_status(1.01, 0.1).level, CapacityLevel::Exceeded);
        assert!(CapacityLevel::Optimal < CapacityLevel::Exceeded);
    }

    #[test]
    fn test_profile_from_json_keeps_defaults() {
        let profile = CapacityProfile::from_json_str(r#"{"usable_volume_m3": 12.0}"#).unwrap();
        assert_eq!(profile.usable_volume_m3, 12.0);
        assert_eq!(profile.available_payload_kg, LUTON_AVAILABLE_PAYLOAD_KG);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let err = CapacityProfile::from_json_str(r#"{"express": {"volume": 0.6, "weight": 0.1}}"#)
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidProfile { .. }));
    }
}
