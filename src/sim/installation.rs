//! Households: appliances, occupants and their bill.

use rand::rngs::StdRng;
use serde::Serialize;

use crate::behavior::{Activity, DayContext, Person, ResponseModel, ScheduleContext};
use crate::devices::{Appliance, LoadStats, PowerKind};
use crate::error::EventError;
use crate::pricing::PricingPolicy;
use crate::sim::types::TICKS_PER_DAY;

use super::event::{Activations, Event, EventQueue};
use super::types::{ActivityRef, TickPower};

/// Totals of an installation that are not covered by [`LoadStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReactiveStats {
    /// Highest reactive power seen (VAr).
    pub max_power: f64,
    /// Reactive energy (kVArh).
    pub energy: f64,
}

/// A household and everything attached to it.
///
/// Appliances and persons are owned by value; events and activities refer
/// to appliances by their index in [`Installation::appliances`].
#[derive(Debug, Clone)]
pub struct Installation {
    pub id: String,
    pub name: String,
    pub appliances: Vec<Appliance>,
    pub persons: Vec<Person>,
    /// Tariff the household is billed with.
    pub policy: PricingPolicy,
    /// Tariff the household's habits were formed under.
    pub baseline: PricingPolicy,
    pub stats: LoadStats,
    pub reactive: ReactiveStats,
    /// Power of the most recent tick.
    pub current: TickPower,
}

impl Installation {
    /// Creates an empty installation whose baseline equals its active policy.
    pub fn new(id: impl Into<String>, name: impl Into<String>, policy: PricingPolicy) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            appliances: Vec::new(),
            persons: Vec::new(),
            baseline: policy.clone(),
            policy,
            stats: LoadStats::default(),
            reactive: ReactiveStats::default(),
            current: TickPower::default(),
        }
    }

    pub fn with_baseline(mut self, baseline: PricingPolicy) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_appliance(mut self, appliance: Appliance) -> Self {
        self.appliances.push(appliance);
        self
    }

    pub fn with_person(mut self, person: Person) -> Self {
        self.persons.push(person);
        self
    }

    pub fn activities(&self) -> impl Iterator<Item = (ActivityRef, &Activity)> {
        self.persons.iter().enumerate().flat_map(|(person, p)| {
            p.activities
                .iter()
                .enumerate()
                .map(move |(activity, a)| (ActivityRef { person, activity }, a))
        })
    }

    /// Resets runtime state for a new Monte-Carlo run.
    pub fn instantiate(&mut self, rng: &mut StdRng) {
        for appliance in &mut self.appliances {
            appliance.instantiate(rng);
        }
        for person in &mut self.persons {
            for activity in &mut person.activities {
                activity.reset();
            }
        }
        self.stats = LoadStats::default();
        self.reactive = ReactiveStats::default();
        self.current = TickPower::default();
    }

    /// Plans the day starting at `day_tick` for every person, in order.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule_day(
        &mut self,
        index: usize,
        day: &DayContext,
        day_tick: u64,
        response: &dyn ResponseModel,
        queue: &EventQueue,
        rng: &mut StdRng,
        activations: &mut Activations,
    ) -> u64 {
        let ctx = ScheduleContext {
            day,
            day_tick,
            installation: index,
            active: &self.policy,
            baseline: &self.baseline,
            response,
            queue,
        };
        self.persons
            .iter_mut()
            .enumerate()
            .map(|(i, person)| person.schedule_day(&ctx, i, rng, activations))
            .sum()
    }

    /// Applies an event addressed to one of this installation's appliances.
    ///
    /// # Errors
    ///
    /// Returns the appliance's conflict, or `EventError::UnknownAppliance`
    /// if the event points past the appliance list.
    pub fn apply(&mut self, event: &Event) -> Result<(), EventError> {
        let target = event.appliance;
        let appliance = self
            .appliances
            .get_mut(target.appliance)
            .ok_or(EventError::UnknownAppliance {
                installation: target.installation,
                appliance: target.appliance,
            })?;
        event.apply(appliance)
    }

    /// Advances the accounting by one tick and returns the household's power.
    pub fn step(&mut self, tick: u64) -> TickPower {
        let offpeak = self.policy.is_offpeak(tick);
        for person in &mut self.persons {
            for activity in &mut person.activities {
                activity.begin_tick();
            }
        }

        let mut total = TickPower::default();
        for appliance in &mut self.appliances {
            let p = appliance.power(tick, PowerKind::Active);
            let q = appliance.power(tick, PowerKind::Reactive);
            let energy = appliance.stats.record(p, offpeak);
            let cost = self.policy.tick_cost(tick, energy);
            appliance.stats.cost += cost;
            if let Some(activity) = appliance
                .activity()
                .and_then(|r| activity_mut(&mut self.persons, r))
            {
                activity.add_power(p);
                activity.stats.cost += cost;
            }
            total += TickPower::new(p, q);
        }

        for person in &mut self.persons {
            for activity in &mut person.activities {
                activity.finish_tick(offpeak);
            }
        }

        let energy = self.stats.record(total.p, offpeak);
        self.stats.cost += self.policy.tick_cost(tick, energy);
        self.reactive.max_power = self.reactive.max_power.max(total.q);
        self.reactive.energy += total.q / 60_000.0;
        self.current = total;

        if self.policy.closes_cycle(tick) {
            self.settle();
        }
        total
    }

    /// Bills the current cycle and opens a new one.
    ///
    /// The installation pays the full policy bill. Appliances and activities
    /// are each charged the variable part on their own cycle usage.
    pub fn settle(&mut self) {
        self.stats.cost += self.policy.settle(&self.stats.cycle_usage());
        self.stats.close_cycle();
        for appliance in &mut self.appliances {
            appliance.stats.cost += self.policy.variable_cost(&appliance.stats.cycle_usage());
            appliance.stats.close_cycle();
        }
        for person in &mut self.persons {
            for activity in &mut person.activities {
                activity.stats.cost += self.policy.variable_cost(&activity.stats.cycle_usage());
                activity.stats.close_cycle();
            }
        }
    }

    /// Settles the trailing partial cycle of a run whose last tick was `last_tick`.
    pub fn finish_run(&mut self, last_tick: u64) {
        if !self.policy.closes_cycle(last_tick) {
            self.settle();
        }
    }

    /// Expected P and Q for each minute of `day`, summed over all activities.
    pub fn expected_power(&self, day: &DayContext) -> (Vec<f64>, Vec<f64>) {
        let n = TICKS_PER_DAY as usize;
        let mut p = vec![0.0; n];
        let mut q = vec![0.0; n];
        for (_, activity) in self.activities() {
            let (ap, aq) = activity.expected_power(day, &self.appliances);
            for (total, v) in p.iter_mut().zip(ap) {
                *total += v;
            }
            for (total, v) in q.iter_mut().zip(aq) {
                *total += v;
            }
        }
        (p, q)
    }
}

fn activity_mut(persons: &mut [Person], r: ActivityRef) -> Option<&mut Activity> {
    persons.get_mut(r.person)?.activities.get_mut(r.activity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::ConsumptionModel;
    use crate::pricing::{PricePeriod, Tariff, Tier, TimeWindow};
    use crate::sim::types::ApplianceRef;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn heater(policy: PricingPolicy) -> Installation {
        Installation::new("h1", "House", policy)
            .with_appliance(Appliance::new("heater", "Heater", ConsumptionModel::constant(1200.0)))
    }

    fn on(appliance: usize, activation: u64) -> Event {
        Event::on(
            0,
            ApplianceRef {
                installation: 0,
                appliance,
            },
            activation,
            None,
        )
    }

    #[test]
    fn step_sums_appliance_power() {
        let mut house = heater(PricingPolicy::free()).with_appliance(
            Appliance::new("tv", "TV", ConsumptionModel::constant(100.0))
                .with_reactive(ConsumptionModel::constant(20.0))
                .with_standby(3.0),
        );
        house.instantiate(&mut StdRng::seed_from_u64(0));
        house.apply(&on(0, 1)).unwrap();
        assert_eq!(house.step(0), TickPower::new(1203.0, 0.0));
        house.apply(&on(1, 2)).unwrap();
        assert_eq!(house.step(1), TickPower::new(1300.0, 20.0));
        assert_relative_eq!(house.stats.energy, 2503.0 / 60_000.0);
    }

    #[test]
    fn unknown_appliance_is_an_event_error() {
        let mut house = heater(PricingPolicy::free());
        assert!(matches!(
            house.apply(&on(5, 0)),
            Err(EventError::UnknownAppliance { appliance: 5, .. })
        ));
    }

    #[test]
    fn time_of_use_is_charged_every_tick() {
        let policy = PricingPolicy::new(
            "tou",
            30,
            4.0,
            Tariff::TimeOfUse {
                periods: vec![PricePeriod {
                    window: TimeWindow::new(0, 0),
                    price: 0.30,
                }],
            },
        )
        .unwrap();
        let mut house = heater(policy);
        house.instantiate(&mut StdRng::seed_from_u64(0));
        house.apply(&on(0, 1)).unwrap();
        for tick in 0..60 {
            house.step(tick);
        }
        // 1.2 kWh at 0.30 per kWh; the fixed charge waits for settlement.
        assert_relative_eq!(house.stats.cost, 0.36, epsilon = 1e-9);
        assert_relative_eq!(house.appliances[0].stats.cost, 0.36, epsilon = 1e-9);
        house.finish_run(59);
        assert_relative_eq!(house.stats.cost, 4.36, epsilon = 1e-9);
        assert_relative_eq!(house.appliances[0].stats.cost, 0.36, epsilon = 1e-9);
    }

    #[test]
    fn cycle_tariff_settles_when_the_cycle_closes() {
        let policy = PricingPolicy::new(
            "tiers",
            1,
            1.0,
            Tariff::ScalarEnergy {
                tiers: vec![Tier {
                    price: 0.5,
                    level: 0.0,
                }],
            },
        )
        .unwrap();
        let mut house = heater(policy);
        house.instantiate(&mut StdRng::seed_from_u64(0));
        house.apply(&on(0, 1)).unwrap();
        for tick in 0..TICKS_PER_DAY {
            house.step(tick);
        }
        // 28.8 kWh in a one-day cycle.
        assert_relative_eq!(house.stats.cost, 1.0 + 14.4, epsilon = 1e-9);
        assert_relative_eq!(house.appliances[0].stats.cost, 14.4, epsilon = 1e-9);
        assert_eq!(house.stats.cycle_energy, 0.0);
        // Nothing left to bill for the closed cycle.
        house.finish_run(TICKS_PER_DAY - 1);
        assert_relative_eq!(house.stats.cost, 15.4, epsilon = 1e-9);
    }
}
