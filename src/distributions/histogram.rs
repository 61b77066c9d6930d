//! Discrete probability mass over equal-width bins.

/// A discrete histogram over `[from, to)` split into equal-width bins.
///
/// This is the precomputed form every sampleable distribution reduces to.
/// Bin `i` covers the value `from + i * width`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binned {
    from: f64,
    to: f64,
    mass: Vec<f64>,
}

impl Binned {
    /// Creates a histogram over `[from, to)` with the given per-bin mass.
    pub fn new(from: f64, to: f64, mass: Vec<f64>) -> Self {
        Self { from, to, mass }
    }

    /// Creates a histogram whose bin `i` stands for the value `i`.
    pub fn from_mass(mass: Vec<f64>) -> Self {
        let to = mass.len() as f64;
        Self::new(0.0, to, mass)
    }

    pub fn lower(&self) -> f64 {
        self.from
    }

    pub fn upper(&self) -> f64 {
        self.to
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    /// Per-bin probability mass.
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    /// Width of a single bin on the value axis.
    pub fn width(&self) -> f64 {
        if self.mass.is_empty() {
            return 0.0;
        }
        (self.to - self.from) / self.mass.len() as f64
    }

    /// Value represented by bin `bin`.
    pub fn bin_value(&self, bin: usize) -> f64 {
        self.from + bin as f64 * self.width()
    }

    /// Index of the bin containing `x`, if `x` lies in `[from, to)`.
    pub fn bin_of(&self, x: f64) -> Option<usize> {
        if self.mass.is_empty() || x < self.from || x >= self.to {
            return None;
        }
        let bin = ((x - self.from) / self.width()).floor() as usize;
        Some(bin.min(self.mass.len() - 1))
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    /// Mass of the bin containing `x`, zero outside the histogram.
    pub fn probability(&self, x: f64) -> f64 {
        self.bin_of(x).map_or(0.0, |bin| self.mass[bin])
    }

    /// Mass strictly above bin `bin`.
    pub fn probability_greater(&self, bin: usize) -> f64 {
        self.mass.iter().skip(bin + 1).sum()
    }

    /// Mass of all bins whose value is strictly greater than `x`.
    pub fn survival(&self, x: f64) -> f64 {
        self.mass
            .iter()
            .enumerate()
            .filter(|(i, _)| self.bin_value(*i) > x)
            .map(|(_, p)| p)
            .sum()
    }

    /// Inverse-CDF lookup by linear cumulative scan.
    ///
    /// Returns the first bin whose cumulative mass exceeds `u`, or `None`
    /// when `u` is not below the total mass.
    pub fn sample_bin(&self, u: f64) -> Option<usize> {
        let mut cumulative = 0.0;
        for (bin, p) in self.mass.iter().enumerate() {
            cumulative += p;
            if cumulative > u {
                return Some(bin);
            }
        }
        None
    }

    /// Last bin carrying positive mass, used to clamp out-of-range draws.
    pub fn last_positive_bin(&self) -> Option<usize> {
        self.mass.iter().rposition(|p| *p > 0.0)
    }

    /// Probability-weighted mean of the bin values.
    pub fn expected_value(&self) -> f64 {
        self.mass
            .iter()
            .enumerate()
            .map(|(i, p)| self.bin_value(i) * p)
            .sum()
    }

    /// Returns a histogram with the same domain and new per-bin mass.
    pub fn with_mass(&self, mass: Vec<f64>) -> Self {
        debug_assert_eq!(mass.len(), self.mass.len());
        Self::new(self.from, self.to, mass)
    }
}

/// A distribution given directly as its probability mass function.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    binned: Binned,
}

impl Histogram {
    /// Bin `i` of `values` is the probability of the value `i`.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            binned: Binned::from_mass(values),
        }
    }

    pub fn binned(&self) -> &Binned {
        &self.binned
    }
}

impl From<Binned> for Histogram {
    fn from(binned: Binned) -> Self {
        Self { binned }
    }
}
