//! Simulation engine: the Monte-Carlo loop over the minute timeline.

use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::behavior::{PriceShift, ResponseModel};
use crate::error::{EventError, SetupError, SimError};
use crate::scenario::Scenario;
use crate::sink::{Resolution, ResultsSink};

use super::clock::{Clock, Tick};
use super::event::{Activations, EventQueue};
use super::installation::Installation;
use super::kpi::{KpiAccumulator, RunSummary};
use super::types::{TICKS_PER_DAY, TICKS_PER_HOUR, TickPower};

#[derive(Debug, Default, Clone, Copy)]
struct EventCounts {
    applied: u64,
    conflicts: u64,
}

/// Runs a [`Scenario`] and reports the averaged results to a sink.
///
/// Generic over the sink and the demand-response model for static dispatch.
pub struct Engine<S: ResultsSink, R: ResponseModel = PriceShift> {
    scenario: Scenario,
    sink: S,
    response: R,
}

impl<S: ResultsSink> Engine<S> {
    /// Creates an engine with the default [`PriceShift`] response.
    pub fn new(scenario: Scenario, sink: S) -> Self {
        Self {
            scenario,
            sink,
            response: PriceShift,
        }
    }
}

impl<S: ResultsSink, R: ResponseModel> Engine<S, R> {
    pub fn with_response<R2: ResponseModel>(self, response: R2) -> Engine<S, R2> {
        Engine {
            scenario: self.scenario,
            sink: self.sink,
            response,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs every Monte-Carlo repetition, then emits minute and hourly
    /// traces, the aggregate trace, expected-power curves and KPIs.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Setup` for a scenario without installations and
    /// `SimError::NoRuns` if zero runs are configured.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        let config = &self.scenario.config;
        if self.scenario.installations.is_empty() {
            return Err(SetupError::EmptyScenario.into());
        }
        if config.mc_runs == 0 {
            return Err(SimError::NoRuns);
        }

        let total = config.total_ticks();
        let n = self.scenario.installations.len();
        info!(
            installations = n,
            days = config.days,
            runs = config.mc_runs,
            seed = config.seed,
            "starting simulation"
        );

        // Per-tick power summed over runs, indexed `tick * n + installation`.
        let mut trace = vec![TickPower::default(); total as usize * n];
        let mut kpis = KpiAccumulator::new(config.co2_kg_per_kwh);
        let mut counts = EventCounts::default();

        for run in 0..config.mc_runs {
            let run_counts = self.run_once(run, &mut trace, &mut kpis);
            counts.applied += run_counts.applied;
            counts.conflicts += run_counts.conflicts;
        }

        let runs = config.mc_runs;
        let factor = 1.0 / f64::from(runs);
        let (peak, mean) = self.emit_traces(&trace, factor);
        self.emit_expected();

        let (totals, apps, acts) = kpis.finish(&self.scenario.installations);
        for k in &totals {
            self.sink.add_kpis(k);
        }
        for k in &apps {
            self.sink.add_app_kpis(k);
        }
        for k in &acts {
            self.sink.add_act_kpis(k);
        }

        let summary = RunSummary {
            runs,
            days: self.scenario.config.days,
            installations: n,
            peak_power_w: peak,
            avg_power_w: mean,
            events_applied: counts.applied as f64 * factor,
            event_conflicts: counts.conflicts as f64 * factor,
            ..RunSummary::default()
        }
        .with_totals(&totals);
        info!(
            energy_kwh = summary.energy_kwh,
            cost = summary.cost,
            "simulation finished"
        );
        Ok(summary)
    }

    fn run_once(&self, run: u32, trace: &mut [TickPower], kpis: &mut KpiAccumulator) -> EventCounts {
        let config = &self.scenario.config;
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(u64::from(run)));
        let mut installations = self.scenario.instantiate(&mut rng);
        let queue = EventQueue::new();
        let mut activations = Activations::default();
        let mut counts = EventCounts::default();
        let n = installations.len();
        let total = config.total_ticks();
        debug!(run, "run started");

        for tick in Clock::new(total) {
            if tick.starts_day() {
                let day = config.day_context(tick.day());
                let mut scheduled = 0;
                for (i, inst) in installations.iter_mut().enumerate() {
                    scheduled += inst.schedule_day(
                        i,
                        &day,
                        tick.index,
                        &self.response,
                        &queue,
                        &mut rng,
                        &mut activations,
                    );
                }
                debug!(run, date = %day.date, occurrences = scheduled, "day scheduled");
            }

            apply_due(&queue, tick, &mut installations, &mut counts);

            let powers: Vec<TickPower> = installations
                .par_iter_mut()
                .map(|inst| inst.step(tick.index))
                .collect();
            let row = tick.index as usize * n;
            for (slot, power) in trace[row..row + n].iter_mut().zip(powers) {
                *slot += power;
            }
        }

        let last = total.saturating_sub(1);
        for inst in &mut installations {
            inst.finish_run(last);
        }
        if !queue.is_empty() {
            debug!(run, pending = queue.len(), "events past the horizon dropped");
        }
        kpis.add_run(&installations);
        debug!(run, applied = counts.applied, conflicts = counts.conflicts, "run finished");
        counts
    }

    /// Emits per-installation and aggregated traces; returns the peak and
    /// mean of the aggregated minute trace.
    fn emit_traces(&mut self, trace: &[TickPower], factor: f64) -> (f64, f64) {
        let n = self.scenario.installations.len();
        let mut hourly = vec![TickPower::default(); n];
        let mut hourly_total = TickPower::default();
        let mut peak = 0.0_f64;
        let mut sum = 0.0;
        let hour_scale = factor / TICKS_PER_HOUR as f64;

        for (t, row) in trace.chunks(n).enumerate() {
            let tick = Tick { index: t as u64 };
            let mut total = TickPower::default();
            for ((inst, acc), power) in self.scenario.installations.iter().zip(&mut hourly).zip(row) {
                let avg = power.scale(factor);
                self.sink
                    .add_tick_result(&inst.id, Resolution::Minute, tick.index, avg.p, avg.q);
                *acc += *power;
                total += avg;
            }
            self.sink
                .add_aggregated_tick_result(Resolution::Minute, tick.index, total.p, total.q);
            hourly_total += total;
            peak = peak.max(total.p);
            sum += total.p;

            if tick.ends_hour() {
                let hour_start = tick.index + 1 - TICKS_PER_HOUR;
                for (inst, acc) in self.scenario.installations.iter().zip(&mut hourly) {
                    let avg = acc.scale(hour_scale);
                    self.sink
                        .add_tick_result(&inst.id, Resolution::Hourly, hour_start, avg.p, avg.q);
                    *acc = TickPower::default();
                }
                let avg = hourly_total.scale(1.0 / TICKS_PER_HOUR as f64);
                self.sink
                    .add_aggregated_tick_result(Resolution::Hourly, hour_start, avg.p, avg.q);
                hourly_total = TickPower::default();
            }
        }
        let ticks = (trace.len() / n.max(1)).max(1);
        (peak, sum / ticks as f64)
    }

    fn emit_expected(&mut self) {
        let day = self.scenario.config.day_context(0);
        for inst in &self.scenario.installations {
            let (p, q) = inst.expected_power(&day);
            for (minute, (p, q)) in p.into_iter().zip(q).enumerate().take(TICKS_PER_DAY as usize) {
                self.sink.add_expected_power_tick(&inst.id, minute as u64, p, q);
            }
        }
    }
}

fn apply_due(
    queue: &EventQueue,
    tick: Tick,
    installations: &mut [Installation],
    counts: &mut EventCounts,
) {
    for event in queue.pop_due(tick.index) {
        let result = match installations.get_mut(event.appliance.installation) {
            Some(inst) => inst.apply(&event),
            None => Err(EventError::UnknownAppliance {
                installation: event.appliance.installation,
                appliance: event.appliance.appliance,
            }),
        };
        match result {
            Ok(()) => counts.applied += 1,
            Err(err) => {
                counts.conflicts += 1;
                warn!(tick = tick.index, %err, "event dropped");
            }
        }
    }
}
