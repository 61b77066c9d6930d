//! Pricing policies and the cost-accounting rules applied to installations.
//!
//! A policy combines a billing cycle, a fixed charge per cycle and one
//! [`Tariff`]. Cycle-based tariffs are settled when a billing cycle closes;
//! time-of-use tariffs are charged every tick and only add the fixed charge
//! at settlement.

/// Tariff schemes and their cost formulas.
pub mod tariff;

use serde::{Deserialize, Serialize};

use crate::error::PricingError;
use crate::sim::types::TICKS_PER_DAY;

pub use tariff::{CycleUsage, PricePeriod, Tariff, Tier, TimeWindow};

/// An immutable tariff descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingPolicy {
    pub name: String,
    /// Length of a billing cycle in days (> 0).
    pub billing_cycle_days: u32,
    /// Charged once per billing cycle.
    pub fixed_charge: f64,
    pub tariff: Tariff,
}

impl PricingPolicy {
    /// # Errors
    ///
    /// Returns `PricingError::ZeroBillingCycle` if `billing_cycle_days` is zero.
    pub fn new(
        name: impl Into<String>,
        billing_cycle_days: u32,
        fixed_charge: f64,
        tariff: Tariff,
    ) -> Result<Self, PricingError> {
        if billing_cycle_days == 0 {
            return Err(PricingError::ZeroBillingCycle);
        }
        Ok(Self {
            name: name.into(),
            billing_cycle_days,
            fixed_charge,
            tariff,
        })
    }

    /// A policy that never charges anything.
    pub fn free() -> Self {
        Self {
            name: "none".to_string(),
            billing_cycle_days: 30,
            fixed_charge: 0.0,
            tariff: Tariff::None,
        }
    }

    pub fn billing_cycle_ticks(&self) -> u64 {
        u64::from(self.billing_cycle_days) * TICKS_PER_DAY
    }

    /// `true` if `tick` is the last tick of a billing cycle.
    pub fn closes_cycle(&self, tick: u64) -> bool {
        (tick + 1) % self.billing_cycle_ticks() == 0
    }

    pub fn is_time_of_use(&self) -> bool {
        matches!(self.tariff, Tariff::TimeOfUse { .. })
    }

    pub fn is_offpeak(&self, tick: u64) -> bool {
        self.tariff.is_offpeak(minute_of_day(tick))
    }

    /// Cost of drawing `energy` kWh during `tick`; non-zero only for
    /// time-of-use tariffs.
    pub fn tick_cost(&self, tick: u64, energy: f64) -> f64 {
        self.tariff.price_at(minute_of_day(tick)) * energy
    }

    /// Cycle cost without the fixed charge.
    pub fn variable_cost(&self, usage: &CycleUsage) -> f64 {
        self.tariff.cycle_cost(usage)
    }

    /// Total bill of a closed billing cycle.
    pub fn settle(&self, usage: &CycleUsage) -> f64 {
        self.fixed_charge + self.variable_cost(usage)
    }

    /// Per-minute energy price over one day.
    pub fn price_curve(&self) -> Vec<f64> {
        self.tariff.price_curve()
    }
}

fn minute_of_day(tick: u64) -> u32 {
    (tick % TICKS_PER_DAY) as u32
}

fn default_billing_cycle_days() -> u32 {
    30
}

/// A time-of-use period as written in scenario files.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PeriodSpec {
    pub from: String,
    pub to: String,
    pub price: f64,
}

/// Tagged description of a pricing policy as written in scenario files.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PricingSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_billing_cycle_days")]
    pub billing_cycle_days: u32,
    #[serde(default)]
    pub fixed_charge: f64,
    pub fixed_cost: Option<f64>,
    pub contracted_energy: Option<f64>,
    pub additional_cost: Option<f64>,
    pub energy_price: Option<f64>,
    pub contracted_capacity: Option<f64>,
    pub power_price: Option<f64>,
    #[serde(default)]
    pub levels: Vec<f64>,
    #[serde(default)]
    pub prices: Vec<f64>,
    pub offpeak_price: Option<f64>,
    pub offpeak_from: Option<String>,
    pub offpeak_to: Option<String>,
    #[serde(default)]
    pub periods: Vec<PeriodSpec>,
}

impl PricingSpec {
    /// Builds the policy, rejecting unknown schemes and inconsistent parameters.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` describing the first problem found.
    pub fn build(&self) -> Result<PricingPolicy, PricingError> {
        let tariff = match self.kind.as_str() {
            "none" => Tariff::None,
            "all_inclusive" => Tariff::AllInclusive {
                fixed_cost: require(self.fixed_cost, "all_inclusive", "fixed_cost")?,
                contracted_energy: require(
                    self.contracted_energy,
                    "all_inclusive",
                    "contracted_energy",
                )?,
                additional_cost: require(self.additional_cost, "all_inclusive", "additional_cost")?,
            },
            "energy_power" => Tariff::EnergyPower {
                energy_price: require(self.energy_price, "energy_power", "energy_price")?,
                contracted_capacity: require(
                    self.contracted_capacity,
                    "energy_power",
                    "contracted_capacity",
                )?,
                power_price: require(self.power_price, "energy_power", "power_price")?,
            },
            "maximum_power" => Tariff::MaximumPower {
                energy_price: require(self.energy_price, "maximum_power", "energy_price")?,
                power_price: require(self.power_price, "maximum_power", "power_price")?,
            },
            "scalar_energy" => Tariff::ScalarEnergy {
                tiers: self.tiers("scalar_energy")?,
            },
            "scalar_energy_offpeak" => {
                let scheme = "scalar_energy_offpeak";
                let from = self
                    .offpeak_from
                    .as_deref()
                    .ok_or(PricingError::MissingParameter {
                        scheme,
                        name: "offpeak_from",
                    })?;
                let to = self
                    .offpeak_to
                    .as_deref()
                    .ok_or(PricingError::MissingParameter {
                        scheme,
                        name: "offpeak_to",
                    })?;
                Tariff::ScalarEnergyWithOffpeak {
                    tiers: self.tiers(scheme)?,
                    offpeak_price: require(self.offpeak_price, scheme, "offpeak_price")?,
                    offpeak: TimeWindow::parse(from, to)?,
                }
            }
            "time_of_use" => {
                if self.periods.is_empty() {
                    return Err(PricingError::MissingParameter {
                        scheme: "time_of_use",
                        name: "periods",
                    });
                }
                let periods = self
                    .periods
                    .iter()
                    .map(|p| {
                        Ok(PricePeriod {
                            window: TimeWindow::parse(&p.from, &p.to)?,
                            price: p.price,
                        })
                    })
                    .collect::<Result<Vec<_>, PricingError>>()?;
                Tariff::TimeOfUse { periods }
            }
            other => return Err(PricingError::UnknownScheme(other.to_string())),
        };
        PricingPolicy::new(
            self.name.clone(),
            self.billing_cycle_days,
            self.fixed_charge,
            tariff,
        )
    }

    fn tiers(&self, scheme: &'static str) -> Result<Vec<Tier>, PricingError> {
        if self.levels.len() != self.prices.len() {
            return Err(PricingError::LengthMismatch {
                scheme,
                left: "levels",
                left_len: self.levels.len(),
                right: "prices",
                right_len: self.prices.len(),
            });
        }
        if self.levels.is_empty() {
            return Err(PricingError::MissingParameter {
                scheme,
                name: "levels",
            });
        }
        Ok(self
            .levels
            .iter()
            .zip(&self.prices)
            .map(|(&level, &price)| Tier { price, level })
            .collect())
    }
}

fn require(
    value: Option<f64>,
    scheme: &'static str,
    name: &'static str,
) -> Result<f64, PricingError> {
    value.ok_or(PricingError::MissingParameter { scheme, name })
}
