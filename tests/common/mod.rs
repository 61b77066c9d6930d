//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use demand_sim::behavior::{Activity, DayParams, DayType, Person, WeightedAppliance};
use demand_sim::devices::{Appliance, ConsumptionModel};
use demand_sim::distributions::{Histogram, ProbabilityDistribution};
use demand_sim::pricing::PricingPolicy;
use demand_sim::scenario::Scenario;
use demand_sim::sim::Installation;
use demand_sim::sim::types::SimConfig;

/// Histogram putting all mass on `value`.
pub fn point(value: usize, len: usize) -> ProbabilityDistribution {
    let mut mass = vec![0.0; len];
    mass[value] = 1.0;
    ProbabilityDistribution::Histogram(Histogram::new(mass))
}

/// Parameters of one exclusive occurrence per day on appliance 0.
pub fn daily_params(start: usize, duration: usize) -> DayParams {
    DayParams {
        occurrences: Some(point(1, 4)),
        start: Some(point(start, 1440)),
        duration: Some(point(duration, 1440)),
        appliances: Some(vec![WeightedAppliance {
            appliance: 0,
            weight: 1.0,
        }]),
        exclusive: Some(true),
        shiftable: false,
    }
}

/// A house with one constant appliance of `power` W used once a day.
pub fn kettle_house(
    id: &str,
    policy: PricingPolicy,
    power: f64,
    start: usize,
    duration: usize,
    day_type: DayType,
) -> Installation {
    let person = Person::new(format!("{id}-p"), "Resident", 0.0, 0.0)
        .expect("valid persona")
        .with_activity(
            Activity::new("boil", "Boiling").with_model(day_type, daily_params(start, duration)),
        );
    Installation::new(id, id.to_uppercase(), policy)
        .with_appliance(Appliance::new(
            "kettle",
            "Kettle",
            ConsumptionModel::constant(power),
        ))
        .with_person(person)
}

/// Single free-priced kettle house simulated for `days` days.
pub fn kettle_scenario(days: u64, runs: u32, power: f64, duration: usize) -> Scenario {
    Scenario::new(SimConfig::new(days, runs, 11)).with_installation(kettle_house(
        "h1",
        PricingPolicy::free(),
        power,
        480,
        duration,
        DayType::Any,
    ))
}
