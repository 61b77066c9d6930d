//! Core simulation types: timing constants, run configuration and arena references.

use std::ops::{Add, AddAssign};

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::behavior::day_type::DayContext;

/// Simulated minutes per day; one tick is one minute.
pub const TICKS_PER_DAY: u64 = 1440;
/// Simulated minutes per hour.
pub const TICKS_PER_HOUR: u64 = 60;

/// Converts one tick of constant power (W) into energy (kWh).
pub fn tick_energy_kwh(power_w: f64) -> f64 {
    power_w / 60_000.0
}

/// Centralized simulation configuration.
///
/// # Examples
///
/// ```
/// use demand_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(2, 3, 42);
/// assert_eq!(cfg.total_ticks(), 2 * 1440);
/// assert_eq!(cfg.mc_runs, 3);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SimConfig {
    /// Number of days to simulate.
    pub days: u64,
    /// Number of Monte-Carlo runs averaged into the results.
    pub mc_runs: u32,
    /// Master random seed; run `r` is seeded with `seed + r`.
    pub seed: u64,
    /// Calendar date of tick 0.
    pub start_date: NaiveDate,
    /// Dates treated as non-working days.
    pub holidays: Vec<NaiveDate>,
    /// Emission factor used for the CO2 KPI (kg per kWh).
    pub co2_kg_per_kwh: f64,
}

impl SimConfig {
    /// Creates a configuration starting on 2024-01-01 with no holidays.
    ///
    /// # Panics
    ///
    /// Panics if `days` or `mc_runs` is zero.
    pub fn new(days: u64, mc_runs: u32, seed: u64) -> Self {
        assert!(days > 0, "days must be > 0");
        assert!(mc_runs > 0, "mc_runs must be > 0");
        Self {
            days,
            mc_runs,
            seed,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            holidays: Vec::new(),
            co2_kg_per_kwh: 0.0,
        }
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_holidays(mut self, holidays: Vec<NaiveDate>) -> Self {
        self.holidays = holidays;
        self
    }

    /// Total number of ticks across all days.
    pub fn total_ticks(&self) -> u64 {
        self.days * TICKS_PER_DAY
    }

    /// Calendar context of the zero-based simulated day `day`.
    pub fn day_context(&self, day: u64) -> DayContext {
        let date = self
            .start_date
            .checked_add_days(Days::new(day))
            .unwrap_or(self.start_date);
        DayContext::new(date, self.holidays.contains(&date))
    }
}

/// Position of an appliance in the scenario arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApplianceRef {
    pub installation: usize,
    pub appliance: usize,
}

/// Position of an activity inside its installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityRef {
    pub person: usize,
    pub activity: usize,
}

/// Active (`p`, W) and reactive (`q`, VAr) power of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TickPower {
    pub p: f64,
    pub q: f64,
}

impl TickPower {
    pub fn new(p: f64, q: f64) -> Self {
        Self { p, q }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.p * factor, self.q * factor)
    }
}

impl Add for TickPower {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.p + rhs.p, self.q + rhs.q)
    }
}

impl AddAssign for TickPower {
    fn add_assign(&mut self, rhs: Self) {
        self.p += rhs.p;
        self.q += rhs.q;
    }
}
