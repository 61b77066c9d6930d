//! TOML-based scenario configuration and preset definitions.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;
use thiserror::Error;

use crate::behavior::{Activity, DayParams, DayType, Person, WeightedAppliance};
use crate::devices::{Appliance, ConsumptionModel};
use crate::distributions::{DistributionRole, DistributionSpec};
use crate::error::{ConsumptionModelError, SetupError};
use crate::pricing::{PricingPolicy, PricingSpec};
use crate::scenario::{DemographicEntry, Demographics, Scenario};
use crate::sim::installation::Installation;
use crate::sim::types::SimConfig;

/// Top-level scenario configuration parsed from TOML.
///
/// Load from TOML with [`ScenarioConfig::from_toml_file`] or pick one of the
/// bundled [`ScenarioConfig::PRESETS`]. Call [`ScenarioConfig::validate`]
/// before [`ScenarioConfig::build`] to get every problem at once.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation horizon and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Named pricing policies referenced by installations.
    #[serde(default)]
    pub pricing: Vec<PricingSpec>,
    #[serde(default)]
    pub installations: Vec<InstallationConfig>,
    /// Optional population built from template installations.
    pub demographics: Option<DemographicsConfig>,
}

/// Simulation horizon and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of days to simulate (must be > 0).
    pub days: u64,
    /// Number of Monte-Carlo runs (must be > 0).
    pub mc_runs: u32,
    /// Master random seed.
    pub seed: u64,
    /// Date of the first simulated day, `YYYY-MM-DD`.
    pub start_date: NaiveDate,
    /// Non-working dates, `YYYY-MM-DD`.
    pub holidays: Vec<NaiveDate>,
    /// Grid emission factor (kg CO2 per kWh).
    pub co2_kg_per_kwh: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 1,
            mc_runs: 1,
            seed: 42,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            holidays: Vec::new(),
            co2_kg_per_kwh: 0.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallationConfig {
    pub id: String,
    pub name: Option<String>,
    /// Name of the billed pricing policy; unbilled when absent.
    pub pricing: Option<String>,
    /// Name of the policy habits were formed under; defaults to `pricing`.
    pub baseline_pricing: Option<String>,
    #[serde(default)]
    pub appliances: Vec<ApplianceConfig>,
    #[serde(default)]
    pub persons: Vec<PersonConfig>,
}

/// An appliance. The active curve is given either as `power` (constant W)
/// or as `active`, a consumption model written as an inline table or a
/// JSON string.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplianceConfig {
    pub id: String,
    pub name: Option<String>,
    /// Always-on base load.
    #[serde(default)]
    pub base: bool,
    /// Draw while switched off (W).
    #[serde(default)]
    pub standby: f64,
    pub power: Option<f64>,
    pub active: Option<toml::Value>,
    pub reactive: Option<toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub awareness: f64,
    #[serde(default)]
    pub sensitivity: f64,
    #[serde(default)]
    pub activities: Vec<ActivityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Activity parameters for one day type. Missing fields leave the set
/// incomplete, so resolution falls through to a less specific day type.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default = "default_day_type")]
    pub day_type: String,
    #[serde(default)]
    pub shiftable: bool,
    pub exclusive: Option<bool>,
    /// Candidate appliance ids.
    pub appliances: Option<Vec<String>>,
    /// Selection weights, one per candidate; equal weights when absent.
    pub weights: Option<Vec<f64>>,
    pub occurrences: Option<DistributionSpec>,
    pub start: Option<DistributionSpec>,
    pub duration: Option<DistributionSpec>,
}

fn default_day_type() -> String {
    "any".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemographicsConfig {
    /// Number of installations to generate.
    pub count: usize,
    #[serde(default)]
    pub entries: Vec<DemographicEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemographicEntryConfig {
    /// Id of the template installation.
    pub template: String,
    pub probability: f64,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"installations[0].pricing"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

const SINGLE_HOUSEHOLD: &str = include_str!("../scenarios/single_household.toml");
const NEIGHBOURHOOD: &str = include_str!("../scenarios/neighbourhood.toml");
const TIME_OF_USE: &str = include_str!("../scenarios/time_of_use.toml");

impl ScenarioConfig {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["single_household", "neighbourhood", "time_of_use"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        let text = match name {
            "single_household" => SINGLE_HOUSEHOLD,
            "neighbourhood" => NEIGHBOURHOOD,
            "time_of_use" => TIME_OF_USE,
            _ => {
                return Err(ConfigError::new(
                    "preset",
                    format!(
                        "unknown preset \"{name}\", available: {}",
                        Self::PRESETS.join(", ")
                    ),
                ));
            }
        };
        Self::from_toml_str(text)
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.days == 0 {
            errors.push(ConfigError::new("simulation.days", "must be > 0"));
        }
        if s.mc_runs == 0 {
            errors.push(ConfigError::new("simulation.mc_runs", "must be > 0"));
        }
        if s.co2_kg_per_kwh.is_nan() || s.co2_kg_per_kwh < 0.0 {
            errors.push(ConfigError::new("simulation.co2_kg_per_kwh", "must be >= 0"));
        }

        let mut policies = HashSet::new();
        for (i, spec) in self.pricing.iter().enumerate() {
            let field = format!("pricing[{i}]");
            if !policies.insert(spec.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("{field}.name"),
                    format!("duplicate pricing policy \"{}\"", spec.name),
                ));
            }
            if let Err(e) = spec.build() {
                errors.push(ConfigError::new(field, e.to_string()));
            }
        }

        if self.installations.is_empty() {
            errors.push(ConfigError::new("installations", "at least one installation is required"));
        }
        let mut ids = HashSet::new();
        for (i, inst) in self.installations.iter().enumerate() {
            let field = format!("installations[{i}]");
            if !ids.insert(inst.id.as_str()) {
                errors.push(ConfigError::new(
                    format!("{field}.id"),
                    format!("duplicate installation \"{}\"", inst.id),
                ));
            }
            for (key, name) in [
                ("pricing", &inst.pricing),
                ("baseline_pricing", &inst.baseline_pricing),
            ] {
                if let Some(name) = name {
                    if !policies.contains(name.as_str()) {
                        errors.push(ConfigError::new(
                            format!("{field}.{key}"),
                            format!("unknown pricing policy \"{name}\""),
                        ));
                    }
                }
            }
            validate_installation(inst, &field, &mut errors);
        }

        if let Some(demo) = &self.demographics {
            let mut total = 0.0;
            for (i, entry) in demo.entries.iter().enumerate() {
                let field = format!("demographics.entries[{i}]");
                if !ids.contains(entry.template.as_str()) {
                    errors.push(ConfigError::new(
                        format!("{field}.template"),
                        format!("unknown installation \"{}\"", entry.template),
                    ));
                }
                if entry.probability.is_nan() || entry.probability < 0.0 {
                    errors.push(ConfigError::new(format!("{field}.probability"), "must be >= 0"));
                }
                total += entry.probability.max(0.0);
            }
            if demo.count > 0 && total <= 0.0 {
                errors.push(ConfigError::new(
                    "demographics.entries",
                    "probabilities must sum to more than 0",
                ));
            }
        }

        errors
    }

    /// Simulation settings of this scenario.
    pub fn sim_config(&self) -> SimConfig {
        let s = &self.simulation;
        SimConfig {
            days: s.days,
            mc_runs: s.mc_runs,
            seed: s.seed,
            start_date: s.start_date,
            holidays: s.holidays.clone(),
            co2_kg_per_kwh: s.co2_kg_per_kwh,
        }
    }

    /// Assembles the scenario object graph.
    ///
    /// Demographic cloning uses its own generator seeded with the master
    /// seed, so the population is the same for every Monte-Carlo run.
    ///
    /// # Errors
    ///
    /// Returns the first `SetupError` met while building policies,
    /// appliances, distributions or the population.
    pub fn build(&self) -> Result<Scenario, SetupError> {
        let mut policies = HashMap::new();
        for spec in &self.pricing {
            let policy = spec.build().map_err(|source| SetupError::Pricing {
                policy: spec.name.clone(),
                source,
            })?;
            policies.insert(spec.name.as_str(), policy);
        }

        let mut installations = Vec::with_capacity(self.installations.len());
        for inst in &self.installations {
            installations.push(build_installation(inst, &policies)?);
        }

        if let Some(demo) = &self.demographics {
            let demographics = Demographics {
                count: demo.count,
                entries: demo
                    .entries
                    .iter()
                    .map(|e| DemographicEntry {
                        template: e.template.clone(),
                        probability: e.probability,
                    })
                    .collect(),
            };
            let mut rng = StdRng::seed_from_u64(self.simulation.seed);
            installations = demographics.populate(installations, &mut rng)?;
        }
        if installations.is_empty() {
            return Err(SetupError::EmptyScenario);
        }

        Ok(Scenario {
            config: self.sim_config(),
            installations,
        })
    }
}

fn validate_installation(inst: &InstallationConfig, field: &str, errors: &mut Vec<ConfigError>) {
    let mut appliances = HashSet::new();
    for (j, app) in inst.appliances.iter().enumerate() {
        let field = format!("{field}.appliances[{j}]");
        if !appliances.insert(app.id.as_str()) {
            errors.push(ConfigError::new(
                format!("{field}.id"),
                format!("duplicate appliance \"{}\"", app.id),
            ));
        }
        if app.standby < 0.0 {
            errors.push(ConfigError::new(format!("{field}.standby"), "must be >= 0"));
        }
        if let Err(e) = build_appliance(app) {
            errors.push(ConfigError::new(field, e.to_string()));
        }
    }

    for (k, person) in inst.persons.iter().enumerate() {
        let field = format!("{field}.persons[{k}]");
        for (key, value) in [("awareness", person.awareness), ("sensitivity", person.sensitivity)] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::new(
                    format!("{field}.{key}"),
                    "must be in [0.0, 1.0]",
                ));
            }
        }
        for (a, activity) in person.activities.iter().enumerate() {
            let field = format!("{field}.activities[{a}]");
            for (m, model) in activity.models.iter().enumerate() {
                let field = format!("{field}.models[{m}]");
                if let Err(e) = model.day_type.parse::<DayType>() {
                    errors.push(ConfigError::new(format!("{field}.day_type"), e.to_string()));
                }
                if let Some(candidates) = &model.appliances {
                    for id in candidates {
                        if !appliances.contains(id.as_str()) {
                            errors.push(ConfigError::new(
                                format!("{field}.appliances"),
                                format!("unknown appliance \"{id}\""),
                            ));
                        }
                    }
                    if let Some(weights) = &model.weights {
                        if weights.len() != candidates.len() {
                            errors.push(ConfigError::new(
                                format!("{field}.weights"),
                                format!(
                                    "has {} entries but appliances has {}",
                                    weights.len(),
                                    candidates.len()
                                ),
                            ));
                        }
                    }
                }
                for (key, spec, role) in model.distributions() {
                    if let Some(Err(e)) = spec.map(|s| s.build(role)) {
                        errors.push(ConfigError::new(format!("{field}.{key}"), e.to_string()));
                    }
                }
            }
        }
    }
}

impl ModelConfig {
    fn distributions(&self) -> [(&'static str, Option<&DistributionSpec>, DistributionRole); 3] {
        [
            ("occurrences", self.occurrences.as_ref(), DistributionRole::Occurrences),
            ("start", self.start.as_ref(), DistributionRole::StartTime),
            ("duration", self.duration.as_ref(), DistributionRole::Duration),
        ]
    }
}

fn consumption_model(value: &toml::Value) -> Result<ConsumptionModel, ConsumptionModelError> {
    match value {
        toml::Value::String(text) => ConsumptionModel::from_json(text),
        other => ConsumptionModel::from_value(&serde_json::to_value(other)?),
    }
}

fn build_appliance(cfg: &ApplianceConfig) -> Result<Appliance, SetupError> {
    let wrap = |source| SetupError::ConsumptionModel {
        appliance: cfg.id.clone(),
        source,
    };
    let active = match (&cfg.active, cfg.power) {
        (Some(value), _) => consumption_model(value).map_err(wrap)?,
        (None, Some(power)) => ConsumptionModel::constant(power),
        (None, None) => {
            return Err(wrap(ConsumptionModelError::MissingField {
                field: "active",
                path: "appliance".to_string(),
            }));
        }
    };
    let mut appliance = Appliance::new(
        cfg.id.clone(),
        cfg.name.clone().unwrap_or_else(|| cfg.id.clone()),
        active,
    )
    .with_standby(cfg.standby);
    if let Some(value) = &cfg.reactive {
        appliance = appliance.with_reactive(consumption_model(value).map_err(wrap)?);
    }
    if cfg.base {
        appliance = appliance.base_load();
    }
    Ok(appliance)
}

fn build_params(
    model: &ModelConfig,
    activity: &str,
    appliances: &[Appliance],
) -> Result<DayParams, SetupError> {
    let mut params = DayParams {
        exclusive: model.exclusive,
        shiftable: model.shiftable,
        ..DayParams::default()
    };
    for (field, spec, role) in model.distributions() {
        let Some(spec) = spec else {
            continue;
        };
        let dist = spec.build(role).map_err(|source| SetupError::Distribution {
            activity: activity.to_string(),
            field,
            source,
        })?;
        match role {
            DistributionRole::Occurrences => params.occurrences = Some(dist),
            DistributionRole::StartTime => params.start = Some(dist),
            DistributionRole::Duration => params.duration = Some(dist),
        }
    }
    if let Some(ids) = &model.appliances {
        let mut candidates = Vec::with_capacity(ids.len());
        for (n, id) in ids.iter().enumerate() {
            let appliance = appliances.iter().position(|a| &a.id == id).ok_or_else(|| {
                SetupError::UnknownAppliance {
                    activity: activity.to_string(),
                    appliance: id.clone(),
                }
            })?;
            let weight = model
                .weights
                .as_ref()
                .and_then(|w| w.get(n))
                .copied()
                .unwrap_or(1.0);
            candidates.push(WeightedAppliance { appliance, weight });
        }
        params.appliances = Some(candidates);
    }
    Ok(params)
}

fn build_installation(
    cfg: &InstallationConfig,
    policies: &HashMap<&str, PricingPolicy>,
) -> Result<Installation, SetupError> {
    let lookup = |name: &String| {
        policies
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| SetupError::UnknownPolicy {
                installation: cfg.id.clone(),
                policy: name.clone(),
            })
    };
    let policy = cfg
        .pricing
        .as_ref()
        .map(lookup)
        .transpose()?
        .unwrap_or_else(PricingPolicy::free);
    let baseline = match &cfg.baseline_pricing {
        Some(name) => lookup(name)?,
        None => policy.clone(),
    };

    let mut installation = Installation::new(
        cfg.id.clone(),
        cfg.name.clone().unwrap_or_else(|| cfg.id.clone()),
        policy,
    )
    .with_baseline(baseline);
    for app in &cfg.appliances {
        installation = installation.with_appliance(build_appliance(app)?);
    }

    for p in &cfg.persons {
        let mut person = Person::new(
            p.id.clone(),
            p.name.clone().unwrap_or_else(|| p.id.clone()),
            p.awareness,
            p.sensitivity,
        )?;
        for a in &p.activities {
            let mut activity = Activity::new(a.id.clone(), a.name.clone().unwrap_or_else(|| a.id.clone()));
            for model in &a.models {
                let day_type: DayType = model.day_type.parse()?;
                let params = build_params(model, &a.id, &installation.appliances)?;
                activity = activity.with_model(day_type, params);
            }
            person = person.with_activity(activity);
        }
        installation = installation.with_person(person);
    }
    Ok(installation)
}
