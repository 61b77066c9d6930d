//! Normal distributions and Gaussian mixtures.

use std::f64::consts::PI;

use crate::error::DistributionError;

use super::histogram::Binned;

/// Standard normal density.
pub fn phi(x: f64) -> f64 {
    (-x * x / 2.0).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF via the Taylor expansion of the error function.
///
/// `Phi(x) = 0.5 + phi(x) * (x + x^3/3 + x^5/(3*5) + ...)`, summed until the
/// next term no longer changes the sum.
pub fn big_phi(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }
    let mut sum = x;
    let mut term = x;
    let mut i = 1_u32;
    while sum + term != sum && i < 1_000 {
        term = term * x * x / f64::from(2 * i + 1);
        sum += term;
        i += 1;
    }
    (0.5 + sum * phi(x)).clamp(0.0, 1.0)
}

/// A normal distribution, optionally precomputed into a histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    mean: f64,
    sigma: f64,
    precomputed: Option<Binned>,
}

impl Gaussian {
    /// # Errors
    ///
    /// Returns `DistributionError::InvalidParameter` if `sigma` is not
    /// strictly positive or either parameter is not finite.
    pub fn new(mean: f64, sigma: f64) -> Result<Self, DistributionError> {
        if !mean.is_finite() {
            return Err(DistributionError::InvalidParameter {
                name: "mean",
                reason: format!("must be finite, got {mean}"),
            });
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(DistributionError::InvalidParameter {
                name: "sigma",
                reason: format!("must be > 0, got {sigma}"),
            });
        }
        Ok(Self {
            mean,
            sigma,
            precomputed: None,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn precomputed(&self) -> Option<&Binned> {
        self.precomputed.as_ref()
    }

    /// Density at `x`, or the precomputed bin mass if available.
    pub fn probability(&self, x: f64) -> f64 {
        match &self.precomputed {
            Some(binned) => binned.probability(x),
            None => phi((x - self.mean) / self.sigma) / self.sigma,
        }
    }

    /// Discretises the distribution over `[from, to)` into `n_bins` bins.
    pub fn precompute(&mut self, from: f64, to: f64, n_bins: usize) {
        self.precomputed = Some(self.binned_over(from, to, n_bins));
    }

    /// Bin masses over `[from, to)`, with the truncated tails folded back in
    /// proportionally so the histogram sums to one.
    pub(crate) fn binned_over(&self, from: f64, to: f64, n_bins: usize) -> Binned {
        if n_bins == 0 || to <= from {
            return Binned::new(from, to, Vec::new());
        }
        let width = (to - from) / n_bins as f64;
        let z = |x: f64| (x - self.mean) / self.sigma;
        let mut mass: Vec<f64> = (0..n_bins)
            .map(|i| {
                let lo = from + i as f64 * width;
                (big_phi(z(lo + width)) - big_phi(z(lo))).max(0.0)
            })
            .collect();

        let in_range: f64 = mass.iter().sum();
        if in_range > 0.0 {
            let residual = 1.0 - in_range;
            for p in &mut mass {
                *p += residual * *p / in_range;
            }
        } else {
            // All mass falls outside the window: pin it to the nearest edge.
            let edge = if self.mean < from { 0 } else { n_bins - 1 };
            mass[edge] = 1.0;
        }
        Binned::new(from, to, mass)
    }
}

/// A weighted sum of Gaussian components.
///
/// The weights are expected to sum to one; configuration validation checks
/// this before construction.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    weights: Vec<f64>,
    components: Vec<Gaussian>,
    precomputed: Option<Binned>,
}

impl GaussianMixture {
    /// # Errors
    ///
    /// Returns an error if the parameter arrays differ in length, are empty,
    /// or any component is invalid.
    pub fn new(weights: &[f64], means: &[f64], sigmas: &[f64]) -> Result<Self, DistributionError> {
        if weights.is_empty() {
            return Err(DistributionError::InvalidParameter {
                name: "weights",
                reason: "must not be empty".to_string(),
            });
        }
        if weights.len() != means.len() || weights.len() != sigmas.len() {
            return Err(DistributionError::InvalidParameter {
                name: "weights",
                reason: format!(
                    "weights, means and sigmas must have equal lengths ({}, {}, {})",
                    weights.len(),
                    means.len(),
                    sigmas.len()
                ),
            });
        }
        let components = means
            .iter()
            .zip(sigmas)
            .map(|(&m, &s)| Gaussian::new(m, s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            weights: weights.to_vec(),
            components,
            precomputed: None,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn components(&self) -> &[Gaussian] {
        &self.components
    }

    pub fn precomputed(&self) -> Option<&Binned> {
        self.precomputed.as_ref()
    }

    pub fn probability(&self, x: f64) -> f64 {
        match &self.precomputed {
            Some(binned) => binned.probability(x),
            None => self
                .weights
                .iter()
                .zip(&self.components)
                .map(|(w, g)| w * g.probability(x))
                .sum(),
        }
    }

    pub fn precompute(&mut self, from: f64, to: f64, n_bins: usize) {
        let mut mass = vec![0.0; n_bins];
        for (w, component) in self.weights.iter().zip(&self.components) {
            let binned = component.binned_over(from, to, n_bins);
            for (acc, p) in mass.iter_mut().zip(binned.mass()) {
                *acc += w * p;
            }
        }
        self.precomputed = Some(Binned::new(from, to, mass));
    }
}
