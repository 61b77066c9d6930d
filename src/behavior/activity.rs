//! Stochastic daily schedules of household activities.

use std::collections::HashMap;

use rand::{Rng, rngs::StdRng};
use tracing::debug;

use crate::devices::{Appliance, LoadStats, PowerKind};
use crate::distributions::{DistributionRole, ProbabilityDistribution};
use crate::pricing::PricingPolicy;
use crate::sim::event::{Activations, Event, EventQueue};
use crate::sim::types::{ActivityRef, ApplianceRef, TICKS_PER_DAY};

use super::day_type::{DayContext, DayType, tiers};
use super::response::ResponseModel;

/// A candidate appliance of an activity with its selection weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedAppliance {
    /// Index into the installation's appliances.
    pub appliance: usize,
    pub weight: f64,
}

/// Parameters of an activity for one day type.
///
/// Fields left `None` make the set incomplete; incomplete sets are skipped
/// during resolution and the next, less specific day type is tried.
#[derive(Debug, Clone, Default)]
pub struct DayParams {
    pub occurrences: Option<ProbabilityDistribution>,
    pub start: Option<ProbabilityDistribution>,
    pub duration: Option<ProbabilityDistribution>,
    pub appliances: Option<Vec<WeightedAppliance>>,
    pub exclusive: Option<bool>,
    /// Whether demand response may move this activity.
    pub shiftable: bool,
}

struct Resolved<'a> {
    occurrences: &'a ProbabilityDistribution,
    start: &'a ProbabilityDistribution,
    duration: &'a ProbabilityDistribution,
    appliances: &'a [WeightedAppliance],
    exclusive: bool,
    shiftable: bool,
}

impl DayParams {
    fn resolved(&self) -> Option<Resolved<'_>> {
        Some(Resolved {
            occurrences: self.occurrences.as_ref()?,
            start: self.start.as_ref()?,
            duration: self.duration.as_ref()?,
            appliances: self.appliances.as_deref()?,
            exclusive: self.exclusive?,
            shiftable: self.shiftable,
        })
    }
}

#[derive(Debug, Clone)]
struct Shaped {
    occurrences: ProbabilityDistribution,
    start: ProbabilityDistribution,
}

/// Everything an activity needs from its surroundings to plan one day.
pub struct ScheduleContext<'a> {
    pub day: &'a DayContext,
    /// First tick of the day being planned.
    pub day_tick: u64,
    /// Index of the owning installation.
    pub installation: usize,
    pub active: &'a PricingPolicy,
    pub baseline: &'a PricingPolicy,
    pub response: &'a dyn ResponseModel,
    pub queue: &'a EventQueue,
}

/// Something a person does that switches appliances on for a while.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: String,
    pub name: String,
    models: HashMap<DayType, DayParams>,
    shaped: HashMap<DayType, Shaped>,
    /// Power and cost attributed to this activity.
    pub stats: LoadStats,
    tick_power: f64,
}

fn resolve<'a>(
    models: &'a HashMap<DayType, DayParams>,
    day: &DayContext,
) -> Option<(DayType, Resolved<'a>)> {
    tiers(day).find_map(|key| {
        models
            .get(&key)
            .and_then(DayParams::resolved)
            .map(|r| (key, r))
    })
}

/// Weighted choice driven by one uniform draw; uniform for equal weights.
fn pick(candidates: &[WeightedAppliance], u: f64) -> Option<usize> {
    let total: f64 = candidates.iter().map(|c| c.weight.max(0.0)).sum();
    if total <= 0.0 {
        let n = candidates.len();
        return (n > 0).then(|| candidates[((u * n as f64) as usize).min(n - 1)].appliance);
    }
    let target = u * total;
    let mut cumulative = 0.0;
    for c in candidates {
        cumulative += c.weight.max(0.0);
        if cumulative > target {
            return Some(c.appliance);
        }
    }
    candidates.last().map(|c| c.appliance)
}

impl Activity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            models: HashMap::new(),
            shaped: HashMap::new(),
            stats: LoadStats::default(),
            tick_power: 0.0,
        }
    }

    pub fn with_model(mut self, day_type: DayType, params: DayParams) -> Self {
        self.models.insert(day_type, params);
        self
    }

    pub fn models(&self) -> &HashMap<DayType, DayParams> {
        &self.models
    }

    /// Day type whose parameters apply on `day`, if any is complete.
    pub fn resolve_day_type(&self, day: &DayContext) -> Option<DayType> {
        resolve(&self.models, day).map(|(key, _)| key)
    }

    /// Samples the day's occurrences and pushes their ON/OFF events.
    ///
    /// Draws, in order: the occurrence count, then for each occurrence its
    /// duration, its start minute and, for exclusive activities only, the
    /// appliance. Returns the number of occurrences scheduled.
    pub fn schedule_day(
        &mut self,
        ctx: &ScheduleContext<'_>,
        me: ActivityRef,
        awareness: f64,
        sensitivity: f64,
        rng: &mut StdRng,
        activations: &mut Activations,
    ) -> u64 {
        let Some((tier, params)) = resolve(&self.models, ctx.day) else {
            debug!(activity = %self.id, date = %ctx.day.date, "no parameters for day");
            return 0;
        };

        if params.shiftable && ctx.active.is_time_of_use() && ctx.baseline.is_time_of_use() {
            self.shaped.entry(tier).or_insert_with(|| Shaped {
                occurrences: ctx.response.shape(
                    params.occurrences,
                    DistributionRole::Occurrences,
                    ctx.active,
                    ctx.baseline,
                    awareness,
                    sensitivity,
                ),
                start: ctx.response.shape(
                    params.start,
                    DistributionRole::StartTime,
                    ctx.active,
                    ctx.baseline,
                    awareness,
                    sensitivity,
                ),
            });
        }
        let (occurrences, start) = match self.shaped.get(&tier) {
            Some(shaped) if params.shiftable => (&shaped.occurrences, &shaped.start),
            _ => (params.occurrences, params.start),
        };

        let count = occurrences
            .sample(rng.random::<f64>())
            .map_or(0, |v| v.max(0.0).floor() as u64);
        let last_minute = (TICKS_PER_DAY - 1) as f64;

        for _ in 0..count {
            let duration = params
                .duration
                .sample(rng.random::<f64>())
                .map_or(1.0, f64::floor)
                .max(1.0) as u64;
            let offset = start
                .sample(rng.random::<f64>())
                .map_or(0.0, f64::floor)
                .clamp(0.0, last_minute) as u64;

            let chosen: Vec<usize> = if params.exclusive {
                pick(params.appliances, rng.random::<f64>())
                    .into_iter()
                    .collect()
            } else {
                params.appliances.iter().map(|c| c.appliance).collect()
            };

            let activation = activations.next_id();
            let on_tick = ctx.day_tick + offset;
            for appliance in chosen {
                let target = ApplianceRef {
                    installation: ctx.installation,
                    appliance,
                };
                ctx.queue
                    .push(Event::on(on_tick, target, activation, Some(me)));
                ctx.queue
                    .push(Event::off(on_tick + duration, target, activation, Some(me)));
            }
        }
        count
    }

    /// Expected P and Q of this activity for each minute of `day`.
    ///
    /// For minute `j` and each candidate appliance this sums
    /// `P(duration > d) * P(start = (j - d) mod 1440) * power(d)` over the
    /// elapsed minutes `d`, scaled by `E[occurrences] * weight / sum(weights)`.
    pub fn expected_power(&self, day: &DayContext, appliances: &[Appliance]) -> (Vec<f64>, Vec<f64>) {
        let n = TICKS_PER_DAY as usize;
        let mut p = vec![0.0; n];
        let mut q = vec![0.0; n];
        let Some((_, params)) = resolve(&self.models, day) else {
            return (p, q);
        };
        let total_weight: f64 = params.appliances.iter().map(|c| c.weight.max(0.0)).sum();
        if total_weight <= 0.0 {
            return (p, q);
        }

        let expected_count = params.occurrences.expected_value();
        let start_mass: Vec<f64> = (0..n).map(|m| params.start.probability(m as f64)).collect();
        let survival: Vec<f64> = (0..n).map(|d| params.duration.survival(d as f64)).collect();

        for candidate in params.appliances {
            let Some(app) = appliances.get(candidate.appliance) else {
                continue;
            };
            let scale = expected_count * candidate.weight.max(0.0) / total_weight;
            let static_p = app.active.is_static_consumption();
            let static_q = app.reactive.is_static_consumption();

            for d in 0..n {
                if survival[d] <= 0.0 {
                    continue;
                }
                let kp = scale * survival[d] * app.nominal_power(d as u64, PowerKind::Active, static_p);
                let kq =
                    scale * survival[d] * app.nominal_power(d as u64, PowerKind::Reactive, static_q);
                if kp == 0.0 && kq == 0.0 {
                    continue;
                }
                for j in 0..n {
                    let s = start_mass[(j + n - d) % n];
                    if s > 0.0 {
                        p[j] += kp * s;
                        q[j] += kq * s;
                    }
                }
            }
        }
        (p, q)
    }

    pub(crate) fn begin_tick(&mut self) {
        self.tick_power = 0.0;
    }

    pub(crate) fn add_power(&mut self, power: f64) {
        self.tick_power += power;
    }

    pub(crate) fn finish_tick(&mut self, offpeak: bool) {
        self.stats.record(self.tick_power, offpeak);
    }

    /// Clears run accumulators; cached reshaped distributions are kept.
    pub fn reset(&mut self) {
        self.stats = LoadStats::default();
        self.tick_power = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::response::PriceShift;
    use crate::devices::ConsumptionModel;
    use crate::distributions::{Histogram, Uniform};
    use crate::pricing::{PricePeriod, Tariff, TimeWindow};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::SeedableRng;

    fn monday() -> DayContext {
        DayContext::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), false)
    }

    fn point(value: usize, len: usize) -> ProbabilityDistribution {
        let mut mass = vec![0.0; len];
        mass[value] = 1.0;
        ProbabilityDistribution::Histogram(Histogram::new(mass))
    }

    fn fixed_params(count: usize, start: usize, duration: usize, appliances: Vec<WeightedAppliance>) -> DayParams {
        DayParams {
            occurrences: Some(point(count, 10)),
            start: Some(point(start, 1440)),
            duration: Some(point(duration, 1440)),
            appliances: Some(appliances),
            exclusive: Some(true),
            shiftable: false,
        }
    }

    fn one(appliance: usize) -> Vec<WeightedAppliance> {
        vec![WeightedAppliance {
            appliance,
            weight: 1.0,
        }]
    }

    fn schedule(activity: &mut Activity, day_tick: u64, queue: &EventQueue, seed: u64) -> u64 {
        let policy = PricingPolicy::free();
        let ctx = ScheduleContext {
            day: &monday(),
            day_tick,
            installation: 0,
            active: &policy,
            baseline: &policy,
            response: &PriceShift,
            queue,
        };
        let me = ActivityRef {
            person: 0,
            activity: 0,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        activity.schedule_day(&ctx, me, 0.0, 0.0, &mut rng, &mut Activations::default())
    }

    #[test]
    fn specific_tier_beats_any() {
        let activity = Activity::new("cook", "Cooking")
            .with_model(DayType::Any, fixed_params(1, 600, 30, one(0)))
            .with_model("mon".parse().unwrap(), fixed_params(2, 700, 30, one(0)));
        assert_eq!(
            activity.resolve_day_type(&monday()),
            Some("mon".parse().unwrap())
        );
    }

    #[test]
    fn incomplete_tier_falls_through() {
        let partial = DayParams {
            occurrences: Some(point(1, 10)),
            ..DayParams::default()
        };
        let activity = Activity::new("cook", "Cooking")
            .with_model(DayType::Weekdays, partial)
            .with_model(DayType::Any, fixed_params(1, 600, 30, one(0)));
        assert_eq!(activity.resolve_day_type(&monday()), Some(DayType::Any));
    }

    #[test]
    fn deterministic_occurrence_emits_on_and_off() {
        let mut activity =
            Activity::new("wash", "Laundry").with_model(DayType::Any, fixed_params(1, 600, 45, one(2)));
        let queue = EventQueue::new();
        assert_eq!(schedule(&mut activity, 1440, &queue, 1), 1);
        let events = queue.pop_due(u64::MAX);
        assert_eq!(events.len(), 2);
        let target = ApplianceRef {
            installation: 0,
            appliance: 2,
        };
        let me = ActivityRef {
            person: 0,
            activity: 0,
        };
        assert_eq!(events[0], Event::on(2040, target, 0, Some(me)));
        assert_eq!(events[1].tick, 2085);
        assert_eq!(events[1].activation, events[0].activation);
    }

    #[test]
    fn occurrences_get_fresh_activations() {
        let mut activity =
            Activity::new("tea", "Tea").with_model(DayType::Any, fixed_params(3, 600, 5, one(0)));
        let queue = EventQueue::new();
        schedule(&mut activity, 0, &queue, 1);
        let mut activations: Vec<u64> = queue.pop_due(u64::MAX).iter().map(|e| e.activation).collect();
        activations.sort_unstable();
        activations.dedup();
        assert_eq!(activations, vec![0, 1, 2]);
    }

    #[test]
    fn non_exclusive_switches_every_candidate() {
        let params = DayParams {
            exclusive: Some(false),
            ..fixed_params(
                1,
                60,
                10,
                vec![
                    WeightedAppliance {
                        appliance: 0,
                        weight: 1.0,
                    },
                    WeightedAppliance {
                        appliance: 1,
                        weight: 1.0,
                    },
                ],
            )
        };
        let mut activity = Activity::new("tv", "Watching TV").with_model(DayType::Any, params);
        let queue = EventQueue::new();
        schedule(&mut activity, 0, &queue, 3);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn zero_duration_is_stretched_to_one_minute() {
        let mut activity =
            Activity::new("door", "Door").with_model(DayType::Any, fixed_params(1, 10, 0, one(0)));
        let queue = EventQueue::new();
        schedule(&mut activity, 0, &queue, 9);
        let ticks: Vec<u64> = queue.pop_due(u64::MAX).iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![10, 11]);
    }

    #[test]
    fn same_seed_same_schedule() {
        let params = DayParams {
            occurrences: Some(ProbabilityDistribution::Uniform(Uniform::new(1.0, 4.0, false).unwrap())),
            start: Some(ProbabilityDistribution::Uniform(Uniform::new(360.0, 1200.0, true).unwrap())),
            duration: Some(ProbabilityDistribution::Uniform(Uniform::new(10.0, 90.0, false).unwrap())),
            ..fixed_params(1, 0, 1, one(0))
        };
        let mut a = Activity::new("x", "x").with_model(DayType::Any, params.clone());
        let mut b = Activity::new("x", "x").with_model(DayType::Any, params);
        let (qa, qb) = (EventQueue::new(), EventQueue::new());
        schedule(&mut a, 0, &qa, 11);
        schedule(&mut b, 0, &qb, 11);
        assert_eq!(qa.pop_due(u64::MAX), qb.pop_due(u64::MAX));
    }

    #[test]
    fn weighted_pick_follows_cumulative_weights() {
        let candidates = [
            WeightedAppliance {
                appliance: 4,
                weight: 1.0,
            },
            WeightedAppliance {
                appliance: 7,
                weight: 3.0,
            },
        ];
        assert_eq!(pick(&candidates, 0.2), Some(4));
        assert_eq!(pick(&candidates, 0.3), Some(7));
        assert_eq!(pick(&candidates, 0.999), Some(7));
        assert_eq!(pick(&[], 0.5), None);
    }

    #[test]
    fn expected_power_of_a_fixed_occurrence() {
        let appliances = vec![Appliance::new("kettle", "Kettle", ConsumptionModel::constant(2000.0))];
        let activity =
            Activity::new("tea", "Tea").with_model(DayType::Any, fixed_params(2, 600, 3, one(0)));
        let (p, q) = activity.expected_power(&monday(), &appliances);
        assert_relative_eq!(p[599], 0.0);
        assert_relative_eq!(p[600], 4000.0);
        assert_relative_eq!(p[602], 4000.0);
        assert_relative_eq!(p[603], 0.0);
        assert!(q.iter().all(|v| *v == 0.0));
        // Expected daily energy: two three-minute runs at 2 kW.
        let energy: f64 = p.iter().map(|w| w / 60_000.0).sum();
        assert_relative_eq!(energy, 2.0 * 3.0 * 2000.0 / 60_000.0, epsilon = 1e-9);
    }

    #[test]
    fn shiftable_activity_uses_cached_reshaped_start() {
        let tou = PricingPolicy::new(
            "tou",
            30,
            0.0,
            Tariff::TimeOfUse {
                periods: vec![
                    PricePeriod {
                        window: TimeWindow::new(0, 420),
                        price: 0.05,
                    },
                    PricePeriod {
                        window: TimeWindow::new(420, 0),
                        price: 0.40,
                    },
                ],
            },
        )
        .unwrap();
        let flat = PricingPolicy::new(
            "flat-tou",
            30,
            0.0,
            Tariff::TimeOfUse {
                periods: vec![PricePeriod {
                    window: TimeWindow::new(0, 0),
                    price: 0.20,
                }],
            },
        )
        .unwrap();
        let params = DayParams {
            shiftable: true,
            ..fixed_params(3, 1000, 10, one(0))
        };
        let mut activity = Activity::new("dish", "Dishwasher").with_model(DayType::Any, params);
        let queue = EventQueue::new();
        let ctx = ScheduleContext {
            day: &monday(),
            day_tick: 0,
            installation: 0,
            active: &tou,
            baseline: &flat,
            response: &PriceShift,
            queue: &queue,
        };
        let me = ActivityRef {
            person: 0,
            activity: 0,
        };
        let mut rng = StdRng::seed_from_u64(5);
        activity.schedule_day(&ctx, me, 1.0, 1.0, &mut rng, &mut Activations::default());
        // Full awareness and sensitivity move all start mass into the night.
        let on = queue.pop().unwrap();
        assert!(on.tick < 420, "start {} should be in the cheap window", on.tick);
        assert_eq!(activity.shaped.len(), 1);
    }
}
