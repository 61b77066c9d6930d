//! Probability distributions used to sample occupant behaviour.
//!
//! Every distribution that drives sampling is reduced to a [`Binned`]
//! histogram. Sampling consumes exactly one uniform draw in `[0, 1)` and
//! maps it through the cumulative mass.

/// Normal distributions and mixtures.
pub mod gaussian;
/// Discrete histograms and the user-supplied mass function.
pub mod histogram;
/// Discrete uniform distributions.
pub mod uniform;

use serde::Deserialize;

use crate::error::DistributionError;
use crate::sim::types::TICKS_PER_DAY;

pub use gaussian::{Gaussian, GaussianMixture};
pub use histogram::{Binned, Histogram};
pub use uniform::Uniform;

/// What a distribution samples; decides its default histogram domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionRole {
    /// Times an activity happens per day.
    Occurrences,
    /// Minute of day an occurrence begins.
    StartTime,
    /// Length of an occurrence in minutes.
    Duration,
}

impl DistributionRole {
    /// Default precomputation window `(from, to, n_bins)`.
    pub fn default_range(self) -> (f64, f64, usize) {
        match self {
            Self::Occurrences => (0.0, 10.0, 10),
            Self::StartTime | Self::Duration => {
                (0.0, TICKS_PER_DAY as f64, TICKS_PER_DAY as usize)
            }
        }
    }
}

/// A sampleable probability distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbabilityDistribution {
    Gaussian(Gaussian),
    Mixture(GaussianMixture),
    Uniform(Uniform),
    Histogram(Histogram),
}

impl ProbabilityDistribution {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gaussian(_) => "gaussian",
            Self::Mixture(_) => "mixture",
            Self::Uniform(_) => "uniform",
            Self::Histogram(_) => "histogram",
        }
    }

    /// The precomputed histogram, if any.
    pub fn binned(&self) -> Option<&Binned> {
        match self {
            Self::Gaussian(g) => g.precomputed(),
            Self::Mixture(m) => m.precomputed(),
            Self::Uniform(u) => Some(u.binned()),
            Self::Histogram(h) => Some(h.binned()),
        }
    }

    /// Discretises Gaussian and mixture distributions; the others already
    /// carry their histogram and are left untouched.
    pub fn precompute(&mut self, from: f64, to: f64, n_bins: usize) {
        match self {
            Self::Gaussian(g) => g.precompute(from, to, n_bins),
            Self::Mixture(m) => m.precompute(from, to, n_bins),
            Self::Uniform(_) | Self::Histogram(_) => {}
        }
    }

    pub fn probability(&self, x: f64) -> f64 {
        match self {
            Self::Gaussian(g) => g.probability(x),
            Self::Mixture(m) => m.probability(x),
            Self::Uniform(u) => u.probability(x),
            Self::Histogram(h) => h.binned().probability(x),
        }
    }

    /// Tail mass strictly above bin `bin`.
    pub fn probability_greater(&self, bin: usize) -> f64 {
        self.binned().map_or(0.0, |b| b.probability_greater(bin))
    }

    /// Mass strictly above the value `x`.
    pub fn survival(&self, x: f64) -> f64 {
        self.binned().map_or(0.0, |b| b.survival(x))
    }

    /// Inverse-CDF bin lookup; `None` when `u` is past the total mass or the
    /// distribution has not been precomputed.
    pub fn sample_bin(&self, u: f64) -> Option<usize> {
        self.binned().and_then(|b| b.sample_bin(u))
    }

    /// Value sampled by the draw `u`, clamping draws past the total mass to
    /// the last bin that carries mass.
    pub fn sample(&self, u: f64) -> Option<f64> {
        let binned = self.binned()?;
        let bin = binned.sample_bin(u).or_else(|| binned.last_positive_bin())?;
        Some(binned.bin_value(bin))
    }

    pub fn expected_value(&self) -> f64 {
        match (self, self.binned()) {
            (_, Some(binned)) => binned.expected_value(),
            (Self::Gaussian(g), None) => g.mean(),
            (Self::Mixture(m), None) => m
                .weights()
                .iter()
                .zip(m.components())
                .map(|(w, g)| w * g.mean())
                .sum(),
            _ => 0.0,
        }
    }

    /// A histogram distribution over the same domain with new bin masses.
    ///
    /// # Errors
    ///
    /// Returns `DistributionError::NotPrecomputed` when there is no
    /// histogram to take the domain from.
    pub fn with_mass(&self, mass: Vec<f64>) -> Result<Self, DistributionError> {
        let binned = self
            .binned()
            .ok_or(DistributionError::NotPrecomputed(self.kind()))?;
        Ok(Self::Histogram(Histogram::from(binned.with_mass(mass))))
    }
}

/// Tagged description of a distribution as written in scenario files.
///
/// `type` selects the family; the remaining fields are the family's
/// parameters. `from`/`to`/`bins` double as the uniform bounds and the
/// precomputation window of Gaussian families.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DistributionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub mean: Option<f64>,
    pub sigma: Option<f64>,
    pub weights: Option<Vec<f64>>,
    pub means: Option<Vec<f64>>,
    pub sigmas: Option<Vec<f64>>,
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub bins: Option<usize>,
    pub values: Option<Vec<f64>>,
}

impl DistributionSpec {
    /// Builds and precomputes the distribution for the given role.
    ///
    /// # Errors
    ///
    /// Returns `DistributionError::Unsupported` for an unknown `type` and
    /// parameter errors for missing or invalid fields.
    pub fn build(&self, role: DistributionRole) -> Result<ProbabilityDistribution, DistributionError> {
        let (default_from, default_to, default_bins) = role.default_range();
        let from = self.from.unwrap_or(default_from);
        let to = self.to.unwrap_or(default_to);
        let bins = self.bins.unwrap_or(default_bins);

        let mut dist = match self.kind.as_str() {
            "gaussian" | "normal" => {
                let mean = self.mean.ok_or(DistributionError::MissingParameter {
                    kind: "gaussian",
                    name: "mean",
                })?;
                let sigma = self.sigma.ok_or(DistributionError::MissingParameter {
                    kind: "gaussian",
                    name: "sigma",
                })?;
                ProbabilityDistribution::Gaussian(Gaussian::new(mean, sigma)?)
            }
            "mixture" | "gmm" => {
                let missing = |name| DistributionError::MissingParameter {
                    kind: "mixture",
                    name,
                };
                let weights = self.weights.as_deref().ok_or_else(|| missing("weights"))?;
                let means = self.means.as_deref().ok_or_else(|| missing("means"))?;
                let sigmas = self.sigmas.as_deref().ok_or_else(|| missing("sigmas"))?;
                ProbabilityDistribution::Mixture(GaussianMixture::new(weights, means, sigmas)?)
            }
            "uniform" => {
                let missing = |name| DistributionError::MissingParameter {
                    kind: "uniform",
                    name,
                };
                let lo = self.from.ok_or_else(|| missing("from"))?;
                let hi = self.to.ok_or_else(|| missing("to"))?;
                let start_time = role == DistributionRole::StartTime;
                ProbabilityDistribution::Uniform(Uniform::new(lo, hi, start_time)?)
            }
            "histogram" => {
                let values = self.values.clone().ok_or(DistributionError::MissingParameter {
                    kind: "histogram",
                    name: "values",
                })?;
                if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                    return Err(DistributionError::InvalidParameter {
                        name: "values",
                        reason: format!("probabilities must be finite and >= 0, got {bad}"),
                    });
                }
                ProbabilityDistribution::Histogram(Histogram::new(values))
            }
            other => return Err(DistributionError::Unsupported(other.to_string())),
        };

        dist.precompute(from, to, bins);
        Ok(dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spec(kind: &str) -> DistributionSpec {
        DistributionSpec {
            kind: kind.to_string(),
            mean: None,
            sigma: None,
            weights: None,
            means: None,
            sigmas: None,
            from: None,
            to: None,
            bins: None,
            values: None,
        }
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = spec("weibull").build(DistributionRole::Duration).unwrap_err();
        assert_eq!(err, DistributionError::Unsupported("weibull".to_string()));
    }

    #[test]
    fn gaussian_start_time_uses_day_window() {
        let s = DistributionSpec {
            mean: Some(480.0),
            sigma: Some(20.0),
            ..spec("gaussian")
        };
        let dist = s.build(DistributionRole::StartTime).unwrap();
        let binned = dist.binned().unwrap();
        assert_eq!(binned.len(), 1440);
        assert_relative_eq!(binned.total_mass(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn uniform_mode_follows_role() {
        let s = DistributionSpec {
            from: Some(30.0),
            to: Some(59.0),
            ..spec("uniform")
        };
        let start = s.build(DistributionRole::StartTime).unwrap();
        let duration = s.build(DistributionRole::Duration).unwrap();
        assert_eq!(start.binned().map(Binned::len), Some(1440));
        assert_eq!(duration.binned().map(Binned::len), Some(30));
    }

    #[test]
    fn gaussian_missing_sigma_is_reported() {
        let s = DistributionSpec {
            mean: Some(1.0),
            ..spec("gaussian")
        };
        assert_eq!(
            s.build(DistributionRole::Duration).unwrap_err(),
            DistributionError::MissingParameter {
                kind: "gaussian",
                name: "sigma"
            }
        );
    }

    #[test]
    fn sample_clamps_draws_past_total_mass() {
        let dist = ProbabilityDistribution::Histogram(Histogram::new(vec![0.2, 0.3, 0.0]));
        // Total mass 0.5: a draw of 0.9 falls off the end.
        assert_eq!(dist.sample_bin(0.9), None);
        assert_eq!(dist.sample(0.9), Some(1.0));
    }

    #[test]
    fn copies_are_value_identical() {
        let s = DistributionSpec {
            weights: Some(vec![0.5, 0.5]),
            means: Some(vec![420.0, 1140.0]),
            sigmas: Some(vec![30.0, 45.0]),
            ..spec("mixture")
        };
        let original = s.build(DistributionRole::StartTime).unwrap();
        let copy = original.clone();
        assert_eq!(original, copy);
        assert_eq!(original.binned(), copy.binned());
    }

    #[test]
    fn with_mass_keeps_domain() {
        let dist = ProbabilityDistribution::Uniform(Uniform::new(10.0, 11.0, false).unwrap());
        let reshaped = dist.with_mass(vec![1.0, 0.0]).unwrap();
        assert_eq!(reshaped.binned().map(Binned::lower), Some(10.0));
        assert_eq!(reshaped.sample(0.5), Some(10.0));
    }
}
