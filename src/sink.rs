//! Where simulation results go.

use serde::Serialize;

use crate::sim::kpi::{ActivityKpi, ApplianceKpi, InstallationKpi};

/// Time resolution of a power sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minute,
    Hourly,
}

impl Resolution {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minute" => Some(Self::Minute),
            "hourly" | "hour" => Some(Self::Hourly),
            _ => None,
        }
    }
}

/// Write-only interface the engine reports into.
///
/// `tick` is the simulation minute. Hourly samples carry the tick of the
/// first minute of their hour.
pub trait ResultsSink {
    fn add_tick_result(
        &mut self,
        installation: &str,
        resolution: Resolution,
        tick: u64,
        p: f64,
        q: f64,
    );

    fn add_aggregated_tick_result(&mut self, resolution: Resolution, tick: u64, p: f64, q: f64);

    /// Expected power for minute `minute` of a representative day.
    fn add_expected_power_tick(&mut self, installation: &str, minute: u64, p: f64, q: f64);

    fn add_kpis(&mut self, kpi: &InstallationKpi);

    fn add_app_kpis(&mut self, kpi: &ApplianceKpi);

    fn add_act_kpis(&mut self, kpi: &ActivityKpi);
}

impl<S: ResultsSink + ?Sized> ResultsSink for &mut S {
    fn add_tick_result(
        &mut self,
        installation: &str,
        resolution: Resolution,
        tick: u64,
        p: f64,
        q: f64,
    ) {
        (**self).add_tick_result(installation, resolution, tick, p, q);
    }

    fn add_aggregated_tick_result(&mut self, resolution: Resolution, tick: u64, p: f64, q: f64) {
        (**self).add_aggregated_tick_result(resolution, tick, p, q);
    }

    fn add_expected_power_tick(&mut self, installation: &str, minute: u64, p: f64, q: f64) {
        (**self).add_expected_power_tick(installation, minute, p, q);
    }

    fn add_kpis(&mut self, kpi: &InstallationKpi) {
        (**self).add_kpis(kpi);
    }

    fn add_app_kpis(&mut self, kpi: &ApplianceKpi) {
        (**self).add_app_kpis(kpi);
    }

    fn add_act_kpis(&mut self, kpi: &ActivityKpi) {
        (**self).add_act_kpis(kpi);
    }
}

/// One power sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    /// Installation id; `None` for the aggregate over all installations.
    pub installation: Option<String>,
    pub resolution: Resolution,
    pub tick: u64,
    pub p: f64,
    pub q: f64,
}

/// Point of an expected-power curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedRecord {
    pub installation: String,
    pub minute: u64,
    pub p: f64,
    pub q: f64,
}

/// Keeps every result in memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemorySink {
    pub ticks: Vec<TickRecord>,
    pub expected: Vec<ExpectedRecord>,
    pub kpis: Vec<InstallationKpi>,
    pub app_kpis: Vec<ApplianceKpi>,
    pub act_kpis: Vec<ActivityKpi>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples of one installation (or of the aggregate, for `None`) at one
    /// resolution, in tick order.
    pub fn series<'a>(
        &'a self,
        installation: Option<&'a str>,
        resolution: Resolution,
    ) -> impl Iterator<Item = &'a TickRecord> + 'a {
        self.ticks
            .iter()
            .filter(move |r| r.resolution == resolution && r.installation.as_deref() == installation)
    }

    pub fn expected_for<'a>(
        &'a self,
        installation: &'a str,
    ) -> impl Iterator<Item = &'a ExpectedRecord> + 'a {
        self.expected
            .iter()
            .filter(move |r| r.installation == installation)
    }

    pub fn kpi(&self, installation: &str) -> Option<&InstallationKpi> {
        self.kpis.iter().find(|k| k.installation == installation)
    }
}

impl ResultsSink for MemorySink {
    fn add_tick_result(
        &mut self,
        installation: &str,
        resolution: Resolution,
        tick: u64,
        p: f64,
        q: f64,
    ) {
        self.ticks.push(TickRecord {
            installation: Some(installation.to_string()),
            resolution,
            tick,
            p,
            q,
        });
    }

    fn add_aggregated_tick_result(&mut self, resolution: Resolution, tick: u64, p: f64, q: f64) {
        self.ticks.push(TickRecord {
            installation: None,
            resolution,
            tick,
            p,
            q,
        });
    }

    fn add_expected_power_tick(&mut self, installation: &str, minute: u64, p: f64, q: f64) {
        self.expected.push(ExpectedRecord {
            installation: installation.to_string(),
            minute,
            p,
            q,
        });
    }

    fn add_kpis(&mut self, kpi: &InstallationKpi) {
        self.kpis.push(kpi.clone());
    }

    fn add_app_kpis(&mut self, kpi: &ApplianceKpi) {
        self.app_kpis.push(kpi.clone());
    }

    fn add_act_kpis(&mut self, kpi: &ActivityKpi) {
        self.act_kpis.push(kpi.clone());
    }
}
