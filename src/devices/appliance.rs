use rand::{Rng, rngs::StdRng};

use crate::error::EventError;
use crate::sim::types::ActivityRef;

use super::consumption::ConsumptionModel;
use super::types::{LoadStats, PowerKind};

/// Mutable on/off state of an appliance within one Monte-Carlo run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplianceState {
    /// Whether the appliance is currently switched on.
    pub in_use: bool,
    /// Tick at which the current cycle started; negative for base loads
    /// that were already running when the simulation began.
    pub on_tick: i64,
    /// Activation that switched the appliance on.
    pub activation: Option<u64>,
    /// Activity the current cycle is attributed to.
    pub activity: Option<ActivityRef>,
}

/// A household appliance driven by a pair of consumption models.
///
/// Appliances start switched off and are toggled by scheduled events.
/// Base-load appliances (fridges, routers) are switched on when a run is
/// instantiated and can never be switched off.
///
/// # Examples
///
/// ```
/// use demand_sim::devices::appliance::Appliance;
/// use demand_sim::devices::consumption::ConsumptionModel;
/// use demand_sim::devices::types::PowerKind;
///
/// let mut kettle = Appliance::new("kettle", "Kettle", ConsumptionModel::constant(2000.0))
///     .with_standby(1.0);
/// assert_eq!(kettle.power(0, PowerKind::Active), 1.0);
///
/// kettle.turn_on(10, 7, None).unwrap();
/// assert_eq!(kettle.power(12, PowerKind::Active), 2000.0);
/// ```
#[derive(Debug, Clone)]
pub struct Appliance {
    /// Identifier, unique within the installation
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Active power curve (W)
    pub active: ConsumptionModel,

    /// Reactive power curve (VAr)
    pub reactive: ConsumptionModel,

    /// Active power drawn while switched off (W)
    pub standby: f64,

    /// Always-on appliance with a random phase
    pub is_base: bool,

    /// Runtime on/off state
    pub state: ApplianceState,

    /// Running accumulators for KPIs and billing
    pub stats: LoadStats,
}

impl Appliance {
    /// Creates an appliance with no reactive power and no stand-by draw.
    pub fn new(id: impl Into<String>, name: impl Into<String>, active: ConsumptionModel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active,
            reactive: ConsumptionModel::zero(),
            standby: 0.0,
            is_base: false,
            state: ApplianceState::default(),
            stats: LoadStats::default(),
        }
    }

    pub fn with_reactive(mut self, reactive: ConsumptionModel) -> Self {
        self.reactive = reactive;
        self
    }

    pub fn with_standby(mut self, standby: f64) -> Self {
        self.standby = standby;
        self
    }

    /// Marks the appliance as an always-on base load.
    pub fn base_load(mut self) -> Self {
        self.is_base = true;
        self
    }

    /// Resets runtime state for a new run.
    ///
    /// Base loads are switched on with a uniformly drawn negative `on_tick`
    /// inside one cycle of their active curve, so that several fridges do
    /// not all start their compressor at midnight. Consumes one draw from
    /// `rng` per base-load appliance and none otherwise.
    pub fn instantiate(&mut self, rng: &mut StdRng) {
        self.state = ApplianceState::default();
        self.stats = LoadStats::default();
        if self.is_base {
            let period = self.active.total_duration().max(1);
            let offset = rng.random_range(0..period);
            self.state.in_use = true;
            self.state.on_tick = -(offset as i64);
        }
    }

    /// Switches the appliance on.
    ///
    /// # Errors
    ///
    /// Returns `EventError::AlreadyOn` if the appliance is already in use.
    pub fn turn_on(
        &mut self,
        tick: u64,
        activation: u64,
        activity: Option<ActivityRef>,
    ) -> Result<(), EventError> {
        if self.state.in_use {
            return Err(EventError::AlreadyOn {
                appliance: self.id.clone(),
                tick,
            });
        }
        self.state = ApplianceState {
            in_use: true,
            on_tick: tick as i64,
            activation: Some(activation),
            activity,
        };
        Ok(())
    }

    /// Switches the appliance off if `activation` is the one that switched it on.
    ///
    /// # Errors
    ///
    /// Returns `EventError::BaseLoad` for base loads, `EventError::NotOn` if
    /// the appliance is off and `EventError::ActivationMismatch` if another
    /// activation owns the current cycle.
    pub fn turn_off(&mut self, tick: u64, activation: u64) -> Result<(), EventError> {
        if self.is_base {
            return Err(EventError::BaseLoad(self.id.clone()));
        }
        if !self.state.in_use {
            return Err(EventError::NotOn {
                appliance: self.id.clone(),
                tick,
            });
        }
        match self.state.activation {
            Some(owner) if owner != activation => Err(EventError::ActivationMismatch {
                appliance: self.id.clone(),
                owner,
                requested: activation,
            }),
            _ => {
                self.state = ApplianceState::default();
                Ok(())
            }
        }
    }

    /// Power drawn at `tick`.
    ///
    /// While switched on this is the matching curve evaluated at the ticks
    /// elapsed since `on_tick`; while off, active power falls back to the
    /// stand-by draw and reactive power is zero.
    pub fn power(&self, tick: u64, kind: PowerKind) -> f64 {
        if !self.state.in_use {
            return match kind {
                PowerKind::Active => self.standby,
                PowerKind::Reactive => 0.0,
            };
        }
        let elapsed = (tick as i64 - self.state.on_tick).unsigned_abs();
        match kind {
            PowerKind::Active => self.active.power(elapsed),
            PowerKind::Reactive => self.reactive.power(elapsed),
        }
    }

    /// Power used by expected-load estimates `elapsed` ticks into a cycle.
    ///
    /// Static curves short-circuit to their first value.
    pub fn nominal_power(&self, elapsed: u64, kind: PowerKind, is_static: bool) -> f64 {
        let model = match kind {
            PowerKind::Active => &self.active,
            PowerKind::Reactive => &self.reactive,
        };
        if is_static {
            model.power(0)
        } else {
            model.power(elapsed)
        }
    }

    /// Activity the current cycle is attributed to, if any.
    pub fn activity(&self) -> Option<ActivityRef> {
        self.state.activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::consumption::{Pattern, Step};
    use rand::SeedableRng;

    fn washer() -> Appliance {
        Appliance::new(
            "washer",
            "Washing machine",
            ConsumptionModel::new(1, vec![Pattern::new(1, vec![Step::new(2000.0, 30, 0.0)])]),
        )
        .with_reactive(ConsumptionModel::constant(150.0))
        .with_standby(2.0)
    }

    #[test]
    fn on_then_off_with_matching_activation() {
        let mut app = washer();
        app.turn_on(100, 42, None).unwrap();
        assert!(app.state.in_use);
        app.turn_off(130, 42).unwrap();
        assert!(!app.state.in_use);
        assert_eq!(app.state.activation, None);
    }

    #[test]
    fn off_with_other_activation_is_refused() {
        let mut app = washer();
        app.turn_on(100, 42, None).unwrap();
        let err = app.turn_off(130, 43).unwrap_err();
        assert_eq!(
            err,
            EventError::ActivationMismatch {
                appliance: "washer".to_string(),
                owner: 42,
                requested: 43,
            }
        );
        assert!(app.state.in_use);
    }

    #[test]
    fn double_on_is_refused() {
        let mut app = washer();
        app.turn_on(0, 1, None).unwrap();
        assert!(matches!(app.turn_on(5, 2, None), Err(EventError::AlreadyOn { .. })));
        assert_eq!(app.state.activation, Some(1));
    }

    #[test]
    fn off_while_off_is_refused() {
        let mut app = washer();
        assert!(matches!(app.turn_off(5, 1), Err(EventError::NotOn { .. })));
    }

    #[test]
    fn power_follows_curve_then_standby() {
        let mut app = washer();
        assert_eq!(app.power(0, PowerKind::Active), 2.0);
        assert_eq!(app.power(0, PowerKind::Reactive), 0.0);
        app.turn_on(10, 1, None).unwrap();
        assert_eq!(app.power(10, PowerKind::Active), 2000.0);
        assert_eq!(app.power(39, PowerKind::Active), 2000.0);
        // Finite curve: exhausted after 30 ticks even if still switched on.
        assert_eq!(app.power(40, PowerKind::Active), 0.0);
        assert_eq!(app.power(15, PowerKind::Reactive), 150.0);
    }

    #[test]
    fn base_load_is_on_with_negative_phase() {
        let fridge = || {
            Appliance::new(
                "fridge",
                "Fridge",
                ConsumptionModel::new(
                    0,
                    vec![Pattern::new(1, vec![Step::new(120.0, 20, 0.0), Step::new(5.0, 40, 0.0)])],
                ),
            )
            .base_load()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let mut app = fridge();
        app.instantiate(&mut rng);
        assert!(app.state.in_use);
        assert!(app.state.on_tick <= 0 && app.state.on_tick > -60);
        assert_eq!(app.turn_off(0, 0), Err(EventError::BaseLoad("fridge".to_string())));

        // Same seed, same phase.
        let mut again = fridge();
        again.instantiate(&mut StdRng::seed_from_u64(7));
        assert_eq!(again.state.on_tick, app.state.on_tick);
    }

    #[test]
    fn instantiate_clears_previous_run() {
        let mut app = washer();
        app.turn_on(0, 1, None).unwrap();
        app.stats.record(100.0, false);
        app.instantiate(&mut StdRng::seed_from_u64(0));
        assert!(!app.state.in_use);
        assert_eq!(app.stats, LoadStats::default());
    }
}
