//! Discrete uniform distributions.

use crate::error::DistributionError;
use crate::sim::types::TICKS_PER_DAY;

use super::histogram::Binned;

/// Uniform mass over the integer values `from..=to`.
///
/// Start-time distributions always live on the absolute minute-of-day axis,
/// so in start-time mode the bounds are clamped to `[0, 1439]` and the
/// histogram spans the whole day with zero mass outside `[from, to]`.
/// Otherwise the histogram covers only `[from, to]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    from: f64,
    to: f64,
    binned: Binned,
}

impl Uniform {
    /// # Errors
    ///
    /// Returns `DistributionError::InvalidParameter` if `from > to` or the
    /// bounds are negative outside start-time mode.
    pub fn new(from: f64, to: f64, start_time: bool) -> Result<Self, DistributionError> {
        if !(from.is_finite() && to.is_finite()) || from > to {
            return Err(DistributionError::InvalidParameter {
                name: "from",
                reason: format!("must be <= to, got from={from}, to={to}"),
            });
        }
        let last_minute = (TICKS_PER_DAY - 1) as f64;
        let (from, to) = if start_time {
            (from.clamp(0.0, last_minute).floor(), to.clamp(0.0, last_minute).floor())
        } else {
            (from.floor(), to.floor())
        };

        let binned = if start_time {
            let n = (to - from) as usize + 1;
            let p = 1.0 / n as f64;
            let mut mass = vec![0.0; TICKS_PER_DAY as usize];
            for slot in &mut mass[from as usize..=to as usize] {
                *slot = p;
            }
            Binned::new(0.0, TICKS_PER_DAY as f64, mass)
        } else {
            let n = (to - from) as usize + 1;
            Binned::new(from, to + 1.0, vec![1.0 / n as f64; n])
        };

        Ok(Self {
            from,
            to,
            binned,
        })
    }

    pub fn lower(&self) -> f64 {
        self.from
    }

    pub fn upper(&self) -> f64 {
        self.to
    }

    pub fn binned(&self) -> &Binned {
        &self.binned
    }

    /// `1 / (to - from + 1)` inside `[from, to]`, zero elsewhere.
    pub fn probability(&self, x: f64) -> f64 {
        if x >= self.from && x <= self.to {
            1.0 / (self.to - self.from + 1.0)
        } else {
            0.0
        }
    }
}
