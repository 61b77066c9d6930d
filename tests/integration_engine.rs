//! End-to-end runs of the engine on small hand-built scenarios.

mod common;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use rstest::rstest;

use demand_sim::behavior::{Activity, DayParams, DayType, Person};
use demand_sim::devices::{Appliance, ConsumptionModel};
use demand_sim::pricing::{PricingPolicy, Tariff, Tier, TimeWindow};
use demand_sim::sim::Installation;
use demand_sim::scenario::Scenario;
use demand_sim::sim::Engine;
use demand_sim::sim::types::SimConfig;
use demand_sim::sink::{MemorySink, Resolution};

#[rstest]
#[case(2000.0, 30)]
#[case(1500.0, 90)]
#[case(60.0, 600)]
fn energy_matches_power_times_duration(#[case] power: f64, #[case] duration: usize) {
    let days = 3;
    let mut engine = Engine::new(
        common::kettle_scenario(days, 1, power, duration),
        MemorySink::new(),
    );
    let summary = engine.run().unwrap();
    let expected = days as f64 * power * duration as f64 / 60_000.0;
    assert_relative_eq!(summary.energy_kwh, expected, epsilon = 1e-9);
    assert_relative_eq!(summary.peak_power_w, power);

    let on_minutes = engine
        .sink()
        .series(Some("h1"), Resolution::Minute)
        .filter(|r| r.p > 0.0)
        .count();
    assert_eq!(on_minutes, days as usize * duration);
}

#[test]
fn averaging_identical_runs_changes_nothing() {
    let mut one = Engine::new(common::kettle_scenario(1, 1, 2000.0, 30), MemorySink::new());
    let mut many = Engine::new(common::kettle_scenario(1, 5, 2000.0, 30), MemorySink::new());
    let a = one.run().unwrap();
    let b = many.run().unwrap();
    assert_relative_eq!(a.energy_kwh, b.energy_kwh, epsilon = 1e-9);
    assert_relative_eq!(a.events_applied, b.events_applied);
    assert_eq!(b.runs, 5);
}

#[test]
fn scalar_tiers_are_billed_per_cycle() {
    let policy = PricingPolicy::new(
        "tiered",
        1,
        1.0,
        Tariff::ScalarEnergy {
            tiers: vec![
                Tier {
                    price: 0.3,
                    level: 1.0,
                },
                Tier {
                    price: 0.1,
                    level: 0.0,
                },
            ],
        },
    )
    .unwrap();
    // 2 kW for an hour: 2 kWh per day, 1 kWh above the 1 kWh tier.
    let house = common::kettle_house("h1", policy, 2000.0, 480, 60, DayType::Any);
    let scenario = Scenario::new(SimConfig::new(2, 1, 3)).with_installation(house);
    let mut engine = Engine::new(scenario, MemorySink::new());
    let summary = engine.run().unwrap();

    let per_day = 1.0 * 0.3 + 1.0 * 0.1;
    assert_relative_eq!(summary.cost, 2.0 * (per_day + 1.0), epsilon = 1e-9);
    let sink = engine.sink();
    assert_relative_eq!(sink.app_kpis[0].kpi.cost, 2.0 * per_day, epsilon = 1e-9);
    // The kettle is off when the cycle closes; the activity still pays its share.
    assert_relative_eq!(sink.act_kpis[0].kpi.energy, 4.0, epsilon = 1e-9);
    assert_relative_eq!(sink.act_kpis[0].kpi.cost, 2.0 * per_day, epsilon = 1e-9);
}

#[test]
fn offpeak_minutes_are_classified_and_billed() {
    let policy = PricingPolicy::new(
        "night",
        1,
        0.5,
        Tariff::ScalarEnergyWithOffpeak {
            tiers: vec![Tier {
                price: 0.3,
                level: 0.0,
            }],
            offpeak_price: 0.1,
            offpeak: TimeWindow::new(0, 6 * 60),
        },
    )
    .unwrap();
    // One hour at 2 kW starting 02:00, inside the window.
    let night = common::kettle_house("h1", policy.clone(), 2000.0, 120, 60, DayType::Any);
    // Same hour at 12:00, outside the window.
    let noon = common::kettle_house("h2", policy, 2000.0, 720, 60, DayType::Any);
    let scenario = Scenario::new(SimConfig::new(1, 1, 4))
        .with_installation(night)
        .with_installation(noon);
    let mut engine = Engine::new(scenario, MemorySink::new());
    engine.run().unwrap();

    let night = engine.sink().kpi("h1").unwrap();
    assert_relative_eq!(night.kpi.energy, 2.0, epsilon = 1e-9);
    assert_relative_eq!(night.kpi.energy_offpeak, 2.0, epsilon = 1e-9);
    assert_relative_eq!(night.kpi.cost, 0.5 + 2.0 * 0.1, epsilon = 1e-9);

    let noon = engine.sink().kpi("h2").unwrap();
    assert_relative_eq!(noon.kpi.energy_offpeak, 0.0);
    assert_relative_eq!(noon.kpi.cost, 0.5 + 2.0 * 0.3, epsilon = 1e-9);
}

#[test]
fn overlapping_occurrences_conflict_on_an_exclusive_appliance() {
    // Two occurrences start together on the only candidate appliance.
    let params = DayParams {
        occurrences: Some(common::point(2, 4)),
        ..common::daily_params(480, 30)
    };
    let person = Person::new("p", "Resident", 0.0, 0.0)
        .unwrap()
        .with_activity(Activity::new("boil", "Boiling").with_model(DayType::Any, params));
    let house = Installation::new("h1", "H1", PricingPolicy::free())
        .with_appliance(Appliance::new(
            "kettle",
            "Kettle",
            ConsumptionModel::constant(2000.0),
        ))
        .with_person(person);
    let mut engine = Engine::new(
        Scenario::new(SimConfig::new(1, 1, 8)).with_installation(house),
        MemorySink::new(),
    );
    let summary = engine.run().unwrap();

    // The second ON finds the kettle busy and its OFF finds it already off.
    assert_relative_eq!(summary.events_applied, 2.0);
    assert_relative_eq!(summary.event_conflicts, 2.0);
    assert_relative_eq!(summary.energy_kwh, 30.0 * 2000.0 / 60_000.0, epsilon = 1e-9);
}

#[test]
fn holidays_switch_to_non_working_models() {
    // 2024-01-01 is a Monday; the Tuesday is declared a holiday.
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let holiday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let config = SimConfig::new(3, 1, 5)
        .with_start_date(start)
        .with_holidays(vec![holiday]);
    let house = common::kettle_house(
        "h1",
        PricingPolicy::free(),
        1000.0,
        600,
        10,
        DayType::NonWorking,
    );
    let mut engine = Engine::new(
        Scenario::new(config).with_installation(house),
        MemorySink::new(),
    );
    engine.run().unwrap();

    let on: Vec<u64> = engine
        .sink()
        .series(Some("h1"), Resolution::Minute)
        .filter(|r| r.p > 0.0)
        .map(|r| r.tick)
        .collect();
    assert_eq!(on.len(), 10);
    assert_eq!(on[0], 1440 + 600);
}

#[test]
fn installations_are_reported_in_scenario_order() {
    let scenario = Scenario::new(SimConfig::new(1, 1, 9))
        .with_installation(common::kettle_house(
            "b",
            PricingPolicy::free(),
            500.0,
            60,
            10,
            DayType::Any,
        ))
        .with_installation(common::kettle_house(
            "a",
            PricingPolicy::free(),
            700.0,
            60,
            10,
            DayType::Any,
        ));
    let mut engine = Engine::new(scenario, MemorySink::new());
    let summary = engine.run().unwrap();
    assert_relative_eq!(summary.peak_power_w, 1200.0);

    let sink = engine.into_sink();
    let ids: Vec<&str> = sink.kpis.iter().map(|k| k.installation.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    let aggregate: f64 = sink
        .series(None, Resolution::Hourly)
        .filter(|r| r.tick == 60)
        .map(|r| r.p)
        .sum();
    assert_relative_eq!(aggregate, 1200.0 * 10.0 / 60.0, epsilon = 1e-9);
}
