//! Tariff schemes and their cost formulas.

use chrono::{NaiveTime, Timelike};
use serde::Serialize;

use crate::error::PricingError;
use crate::sim::types::TICKS_PER_DAY;

/// Consumption of one billing cycle as seen by a tariff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CycleUsage {
    /// Energy (kWh).
    pub energy: f64,
    /// Part of `energy` drawn in off-peak minutes (kWh).
    pub energy_offpeak: f64,
    /// Peak active power (W).
    pub max_power: f64,
}

/// One step of a tiered energy price.
///
/// Energy above `level` (kWh) is charged at `price`; a non-positive level
/// absorbs everything that is left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tier {
    pub price: f64,
    pub level: f64,
}

/// A daily window of minutes `[from, to)`; wraps past midnight when
/// `to <= from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub from: u32,
    pub to: u32,
}

impl TimeWindow {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    /// Parses `"HH:MM"` bounds.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::InvalidTime` if either bound is not a valid
    /// time of day.
    pub fn parse(from: &str, to: &str) -> Result<Self, PricingError> {
        Ok(Self::new(parse_minute(from)?, parse_minute(to)?))
    }

    pub fn contains(&self, minute: u32) -> bool {
        if self.from < self.to {
            minute >= self.from && minute < self.to
        } else {
            minute >= self.from || minute < self.to
        }
    }
}

fn parse_minute(text: &str) -> Result<u32, PricingError> {
    let time = NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|_| PricingError::InvalidTime(text.to_string()))?;
    Ok(time.hour() * 60 + time.minute())
}

/// Price applying during a daily window of a time-of-use tariff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePeriod {
    pub window: TimeWindow,
    pub price: f64,
}

/// Cost formula of a pricing policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tariff {
    /// Everything is free.
    None,
    /// Flat fee covering `contracted_energy`, extra energy at `additional_cost`.
    AllInclusive {
        fixed_cost: f64,
        contracted_energy: f64,
        additional_cost: f64,
    },
    /// Energy price plus a charge on the contracted capacity (W).
    EnergyPower {
        energy_price: f64,
        contracted_capacity: f64,
        power_price: f64,
    },
    /// Energy price plus a charge on the cycle's peak demand (W).
    MaximumPower { energy_price: f64, power_price: f64 },
    /// Tiered energy price.
    ScalarEnergy { tiers: Vec<Tier> },
    /// Tiered on-peak energy plus a flat off-peak price inside `offpeak`.
    ScalarEnergyWithOffpeak {
        tiers: Vec<Tier>,
        offpeak_price: f64,
        offpeak: TimeWindow,
    },
    /// Per-minute price, charged tick by tick.
    TimeOfUse { periods: Vec<PricePeriod> },
}

impl Tariff {
    /// Cycle cost excluding the policy's fixed charge.
    ///
    /// Time-of-use energy is charged per tick and contributes nothing here.
    pub fn cycle_cost(&self, usage: &CycleUsage) -> f64 {
        match self {
            Self::None | Self::TimeOfUse { .. } => 0.0,
            Self::AllInclusive {
                fixed_cost,
                contracted_energy,
                additional_cost,
            } => fixed_cost + additional_cost * (usage.energy - contracted_energy).max(0.0),
            Self::EnergyPower {
                energy_price,
                contracted_capacity,
                power_price,
            } => usage.energy * energy_price + contracted_capacity * power_price,
            Self::MaximumPower {
                energy_price,
                power_price,
            } => usage.energy * energy_price + usage.max_power * power_price,
            Self::ScalarEnergy { tiers } => tiered_cost(tiers, usage.energy),
            Self::ScalarEnergyWithOffpeak {
                tiers,
                offpeak_price,
                ..
            } => {
                let onpeak = (usage.energy - usage.energy_offpeak).max(0.0);
                tiered_cost(tiers, onpeak) + usage.energy_offpeak * offpeak_price
            }
        }
    }

    /// Price per kWh of the given minute of day; zero outside time-of-use.
    pub fn price_at(&self, minute: u32) -> f64 {
        match self {
            Self::TimeOfUse { periods } => periods
                .iter()
                .find(|p| p.window.contains(minute))
                .map_or(0.0, |p| p.price),
            _ => 0.0,
        }
    }

    pub fn is_offpeak(&self, minute: u32) -> bool {
        match self {
            Self::ScalarEnergyWithOffpeak { offpeak, .. } => offpeak.contains(minute),
            _ => false,
        }
    }

    /// Per-minute price over one day.
    pub fn price_curve(&self) -> Vec<f64> {
        (0..TICKS_PER_DAY as u32).map(|m| self.price_at(m)).collect()
    }
}

/// Drains `energy` through the tiers from the highest level downward.
fn tiered_cost(tiers: &[Tier], energy: f64) -> f64 {
    let mut sorted: Vec<&Tier> = tiers.iter().collect();
    sorted.sort_by(|a, b| b.level.total_cmp(&a.level));

    let mut remaining = energy.max(0.0);
    let mut cost = 0.0;
    for tier in sorted {
        if tier.level <= 0.0 {
            cost += remaining * tier.price;
            break;
        }
        if remaining > tier.level {
            cost += (remaining - tier.level) * tier.price;
            remaining = tier.level;
        }
    }
    cost
}
