//! Demand response: reshaping activity distributions under time-of-use prices.

use crate::distributions::{DistributionRole, ProbabilityDistribution};
use crate::pricing::PricingPolicy;

/// How occupants react to a tariff compared with their baseline tariff.
///
/// Implementations receive a precomputed distribution and return one with
/// the same domain and bin count. The returned distribution is cached per
/// activity and day type for the rest of the run, so implementations must
/// be deterministic and must not draw random numbers.
pub trait ResponseModel: Send + Sync {
    fn shape(
        &self,
        dist: &ProbabilityDistribution,
        role: DistributionRole,
        active: &PricingPolicy,
        baseline: &PricingPolicy,
        awareness: f64,
        sensitivity: f64,
    ) -> ProbabilityDistribution;
}

/// Moves probability mass away from minutes that became more expensive.
///
/// With `s = awareness * sensitivity`:
///
/// * start times: every minute whose price rose above the baseline loses
///   `s * rise / max_rise` of its mass, which is handed to the minutes whose
///   price fell, in proportion to how much it fell;
/// * occurrence counts: if the daily mean price rose by a relative amount
///   `r`, each count `k > 0` gives `s * min(r, 1)` of its mass to `k - 1`.
///
/// Durations, and any distribution without a histogram, are returned
/// unchanged. Total mass is preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceShift;

impl PriceShift {
    fn shift_start(mass: &[f64], diff: &[f64], strength: f64) -> Option<Vec<f64>> {
        if mass.len() != diff.len() {
            return None;
        }
        let max_rise = diff.iter().copied().fold(0.0_f64, f64::max);
        let total_drop: f64 = diff.iter().filter(|d| **d < 0.0).map(|d| -d).sum();
        if max_rise <= 0.0 || total_drop <= 0.0 {
            return None;
        }

        let mut shaped = mass.to_vec();
        let mut moved = 0.0;
        for (p, d) in shaped.iter_mut().zip(diff) {
            if *d > 0.0 {
                let taken = *p * strength * d / max_rise;
                *p -= taken;
                moved += taken;
            }
        }
        for (p, d) in shaped.iter_mut().zip(diff) {
            if *d < 0.0 {
                *p += moved * -d / total_drop;
            }
        }
        Some(shaped)
    }

    fn shift_occurrences(mass: &[f64], relative_rise: f64, strength: f64) -> Option<Vec<f64>> {
        if relative_rise <= 0.0 || mass.len() < 2 {
            return None;
        }
        let fraction = strength * relative_rise.min(1.0);
        let mut shaped = mass.to_vec();
        for k in 1..mass.len() {
            let taken = mass[k] * fraction;
            shaped[k] -= taken;
            shaped[k - 1] += taken;
        }
        Some(shaped)
    }
}

impl ResponseModel for PriceShift {
    fn shape(
        &self,
        dist: &ProbabilityDistribution,
        role: DistributionRole,
        active: &PricingPolicy,
        baseline: &PricingPolicy,
        awareness: f64,
        sensitivity: f64,
    ) -> ProbabilityDistribution {
        let strength = (awareness * sensitivity).clamp(0.0, 1.0);
        let Some(binned) = dist.binned() else {
            return dist.clone();
        };
        if strength == 0.0 {
            return dist.clone();
        }

        let active_curve = active.price_curve();
        let baseline_curve = baseline.price_curve();
        let shaped = match role {
            DistributionRole::StartTime => {
                let diff: Vec<f64> = active_curve
                    .iter()
                    .zip(&baseline_curve)
                    .map(|(a, b)| a - b)
                    .collect();
                Self::shift_start(binned.mass(), &diff, strength)
            }
            DistributionRole::Occurrences => {
                let n = active_curve.len().max(1) as f64;
                let active_mean = active_curve.iter().sum::<f64>() / n;
                let baseline_mean = baseline_curve.iter().sum::<f64>() / n;
                if baseline_mean <= 0.0 {
                    None
                } else {
                    let rise = (active_mean - baseline_mean) / baseline_mean;
                    Self::shift_occurrences(binned.mass(), rise, strength)
                }
            }
            DistributionRole::Duration => None,
        };

        shaped
            .and_then(|mass| dist.with_mass(mass).ok())
            .unwrap_or_else(|| dist.clone())
    }
}
