//! Key performance indicators, averaged over Monte-Carlo runs.

use std::fmt;

use serde::Serialize;

use crate::devices::LoadStats;

use super::installation::Installation;

/// Indicators of one load: an installation, an appliance or an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KpiRecord {
    /// Peak active power (W).
    pub max_power: f64,
    /// Mean active power (W).
    pub avg_power: f64,
    /// Energy (kWh).
    pub energy: f64,
    /// Off-peak energy (kWh).
    pub energy_offpeak: f64,
    pub cost: f64,
    /// Emissions (kg CO2).
    pub co2: f64,
}

impl KpiRecord {
    pub fn from_stats(stats: &LoadStats, co2_kg_per_kwh: f64) -> Self {
        Self {
            max_power: stats.max_power,
            avg_power: stats.avg_power(),
            energy: stats.energy,
            energy_offpeak: stats.energy_offpeak,
            cost: stats.cost,
            co2: stats.energy * co2_kg_per_kwh,
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.max_power += other.max_power;
        self.avg_power += other.avg_power;
        self.energy += other.energy;
        self.energy_offpeak += other.energy_offpeak;
        self.cost += other.cost;
        self.co2 += other.co2;
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            max_power: self.max_power * factor,
            avg_power: self.avg_power * factor,
            energy: self.energy * factor,
            energy_offpeak: self.energy_offpeak * factor,
            cost: self.cost * factor,
            co2: self.co2 * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallationKpi {
    pub installation: String,
    #[serde(flatten)]
    pub kpi: KpiRecord,
    /// Reactive energy (kVArh).
    pub reactive_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplianceKpi {
    pub installation: String,
    pub appliance: String,
    #[serde(flatten)]
    pub kpi: KpiRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityKpi {
    pub installation: String,
    pub person: String,
    pub activity: String,
    #[serde(flatten)]
    pub kpi: KpiRecord,
}

#[derive(Debug, Clone, Default)]
struct InstallationSums {
    total: KpiRecord,
    reactive_energy: f64,
    appliances: Vec<KpiRecord>,
    activities: Vec<KpiRecord>,
}

/// Sums per-run indicators and averages them at the end.
///
/// Expects every run to present the same installations in the same order.
#[derive(Debug, Clone, Default)]
pub struct KpiAccumulator {
    co2_kg_per_kwh: f64,
    runs: u32,
    sums: Vec<InstallationSums>,
}

impl KpiAccumulator {
    pub fn new(co2_kg_per_kwh: f64) -> Self {
        Self {
            co2_kg_per_kwh,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Adds the final state of one run.
    pub fn add_run(&mut self, installations: &[Installation]) {
        if self.sums.len() < installations.len() {
            self.sums.resize_with(installations.len(), InstallationSums::default);
        }
        let co2 = self.co2_kg_per_kwh;
        for (sums, inst) in self.sums.iter_mut().zip(installations) {
            sums.total.accumulate(&KpiRecord::from_stats(&inst.stats, co2));
            sums.reactive_energy += inst.reactive.energy;

            let appliances = inst.appliances.iter().map(|a| KpiRecord::from_stats(&a.stats, co2));
            accumulate_all(&mut sums.appliances, appliances);
            let activities = inst
                .activities()
                .map(|(_, a)| KpiRecord::from_stats(&a.stats, co2));
            accumulate_all(&mut sums.activities, activities);
        }
        self.runs += 1;
    }

    /// Averages over the runs added so far, labelled with the ids of
    /// `installations`.
    pub fn finish(
        &self,
        installations: &[Installation],
    ) -> (Vec<InstallationKpi>, Vec<ApplianceKpi>, Vec<ActivityKpi>) {
        let factor = if self.runs == 0 {
            0.0
        } else {
            1.0 / f64::from(self.runs)
        };
        let mut totals = Vec::new();
        let mut apps = Vec::new();
        let mut acts = Vec::new();

        for (inst, sums) in installations.iter().zip(&self.sums) {
            totals.push(InstallationKpi {
                installation: inst.id.clone(),
                kpi: sums.total.scaled(factor),
                reactive_energy: sums.reactive_energy * factor,
            });
            for (app, kpi) in inst.appliances.iter().zip(&sums.appliances) {
                apps.push(ApplianceKpi {
                    installation: inst.id.clone(),
                    appliance: app.id.clone(),
                    kpi: kpi.scaled(factor),
                });
            }
            for ((r, act), kpi) in inst.activities().zip(&sums.activities) {
                let person = inst
                    .persons
                    .get(r.person)
                    .map(|p| p.id.clone())
                    .unwrap_or_default();
                acts.push(ActivityKpi {
                    installation: inst.id.clone(),
                    person,
                    activity: act.id.clone(),
                    kpi: kpi.scaled(factor),
                });
            }
        }
        (totals, apps, acts)
    }
}

fn accumulate_all(sums: &mut Vec<KpiRecord>, records: impl Iterator<Item = KpiRecord>) {
    for (i, record) in records.enumerate() {
        if i == sums.len() {
            sums.push(KpiRecord::default());
        }
        sums[i].accumulate(&record);
    }
}

/// Headline figures of a finished simulation, averaged over runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub runs: u32,
    pub days: u64,
    pub installations: usize,
    /// Energy over all installations (kWh).
    pub energy_kwh: f64,
    pub energy_offpeak_kwh: f64,
    pub cost: f64,
    pub co2_kg: f64,
    /// Peak of the aggregated power trace (W).
    pub peak_power_w: f64,
    /// Mean of the aggregated power trace (W).
    pub avg_power_w: f64,
    /// Events applied per run.
    pub events_applied: f64,
    /// Events dropped because of a state conflict, per run.
    pub event_conflicts: f64,
}

impl RunSummary {
    /// Fills the energy and cost totals from the averaged installation KPIs.
    pub fn with_totals(mut self, kpis: &[InstallationKpi]) -> Self {
        for k in kpis {
            self.energy_kwh += k.kpi.energy;
            self.energy_offpeak_kwh += k.kpi.energy_offpeak;
            self.cost += k.kpi.cost;
            self.co2_kg += k.kpi.co2;
        }
        self
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Simulation Summary ---")?;
        writeln!(
            f,
            "Horizon:               {} days x {} runs, {} installations",
            self.days, self.runs, self.installations
        )?;
        writeln!(
            f,
            "Energy:                {:.2} kWh ({:.2} kWh off-peak)",
            self.energy_kwh, self.energy_offpeak_kwh
        )?;
        writeln!(f, "Cost:                  {:.2}", self.cost)?;
        writeln!(f, "CO2:                   {:.2} kg", self.co2_kg)?;
        writeln!(f, "Peak aggregate power:  {:.1} W", self.peak_power_w)?;
        writeln!(f, "Mean aggregate power:  {:.1} W", self.avg_power_w)?;
        write!(
            f,
            "Events per run:        {:.1} applied, {:.1} dropped",
            self.events_applied, self.event_conflicts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Appliance, ConsumptionModel};
    use crate::pricing::PricingPolicy;
    use approx::assert_relative_eq;

    fn house_with_energy(energy: f64) -> Installation {
        let mut house = Installation::new("h", "H", PricingPolicy::free())
            .with_appliance(Appliance::new("a", "A", ConsumptionModel::constant(1.0)));
        house.stats.energy = energy;
        house.stats.max_power = energy * 10.0;
        house.appliances[0].stats.energy = energy / 2.0;
        house
    }

    #[test]
    fn kpis_are_averaged_over_runs() {
        let mut acc = KpiAccumulator::new(0.5);
        acc.add_run(&[house_with_energy(2.0)]);
        acc.add_run(&[house_with_energy(4.0)]);
        assert_eq!(acc.runs(), 2);

        let (totals, apps, acts) = acc.finish(&[house_with_energy(0.0)]);
        assert_relative_eq!(totals[0].kpi.energy, 3.0);
        assert_relative_eq!(totals[0].kpi.max_power, 30.0);
        assert_relative_eq!(totals[0].kpi.co2, 1.5);
        assert_relative_eq!(apps[0].kpi.energy, 1.5);
        assert_eq!(apps[0].appliance, "a");
        assert!(acts.is_empty());
    }

    #[test]
    fn summary_totals_and_display() {
        let kpis = vec![
            InstallationKpi {
                installation: "a".into(),
                kpi: KpiRecord {
                    energy: 1.5,
                    cost: 0.3,
                    ..KpiRecord::default()
                },
                reactive_energy: 0.0,
            },
            InstallationKpi {
                installation: "b".into(),
                kpi: KpiRecord {
                    energy: 2.5,
                    cost: 0.7,
                    ..KpiRecord::default()
                },
                reactive_energy: 0.0,
            },
        ];
        let summary = RunSummary::default().with_totals(&kpis);
        assert_relative_eq!(summary.energy_kwh, 4.0);
        assert_relative_eq!(summary.cost, 1.0);
        let text = summary.to_string();
        assert!(text.starts_with("--- Simulation Summary ---"));
        assert!(text.contains("4.00 kWh"));
    }
}
