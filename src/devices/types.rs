//! Common types for power accounting of appliances, activities and installations.

use serde::Serialize;

use crate::pricing::CycleUsage;
use crate::sim::types::tick_energy_kwh;

/// Which of an appliance's two power curves to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerKind {
    /// Active power, W.
    Active,
    /// Reactive power, VAr.
    Reactive,
}

/// Running accumulators of a load over one Monte-Carlo run.
///
/// The `cycle_*` fields cover the current billing cycle and are cleared by
/// [`LoadStats::close_cycle`]; everything else persists for the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStats {
    /// Highest active power seen (W).
    pub max_power: f64,
    /// Highest active power seen in the current billing cycle (W).
    pub cycle_max_power: f64,
    /// Sum of active power over all recorded ticks (W).
    pub power_sum: f64,
    /// Number of recorded ticks.
    pub ticks: u64,
    /// Total energy (kWh).
    pub energy: f64,
    /// Energy drawn during off-peak minutes (kWh).
    pub energy_offpeak: f64,
    /// Energy of the current billing cycle (kWh).
    pub cycle_energy: f64,
    /// Off-peak energy of the current billing cycle (kWh).
    pub cycle_energy_offpeak: f64,
    /// Accumulated cost.
    pub cost: f64,
}

impl LoadStats {
    /// Records one tick of active power and returns its energy (kWh).
    pub fn record(&mut self, power_w: f64, offpeak: bool) -> f64 {
        let energy = tick_energy_kwh(power_w);
        self.max_power = self.max_power.max(power_w);
        self.cycle_max_power = self.cycle_max_power.max(power_w);
        self.power_sum += power_w;
        self.ticks += 1;
        self.energy += energy;
        self.cycle_energy += energy;
        if offpeak {
            self.energy_offpeak += energy;
            self.cycle_energy_offpeak += energy;
        }
        energy
    }

    /// Mean active power over the recorded ticks (W).
    pub fn avg_power(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.power_sum / self.ticks as f64
        }
    }

    /// Consumption of the current billing cycle as seen by the tariff.
    pub fn cycle_usage(&self) -> CycleUsage {
        CycleUsage {
            energy: self.cycle_energy,
            energy_offpeak: self.cycle_energy_offpeak,
            max_power: self.cycle_max_power,
        }
    }

    pub fn close_cycle(&mut self) {
        self.cycle_energy = 0.0;
        self.cycle_energy_offpeak = 0.0;
        self.cycle_max_power = 0.0;
    }
}
