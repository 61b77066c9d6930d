//! Error types shared across the simulator.

use thiserror::Error;

/// Errors raised while building or sampling a probability distribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("unsupported distribution type \"{0}\"")]
    Unsupported(String),
    #[error("{kind} distribution is missing parameter `{name}`")]
    MissingParameter { kind: &'static str, name: &'static str },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("{0} distribution has no precomputed histogram")]
    NotPrecomputed(&'static str),
}

/// Errors raised while decoding a consumption model description.
#[derive(Debug, Error)]
pub enum ConsumptionModelError {
    #[error("consumption model is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("consumption model field `{field}` is missing at {path}")]
    MissingField { field: &'static str, path: String },
    #[error("consumption model field `{field}` at {path} must be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        path: String,
        expected: &'static str,
        found: String,
    },
}

/// Errors raised while building a pricing policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("{scheme}: `{left}` has {left_len} entries but `{right}` has {right_len}")]
    LengthMismatch {
        scheme: &'static str,
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },
    #[error("invalid time of day \"{0}\", expected HH:MM")]
    InvalidTime(String),
    #[error("unknown pricing scheme \"{0}\"")]
    UnknownScheme(String),
    #[error("{scheme} is missing parameter `{name}`")]
    MissingParameter { scheme: &'static str, name: &'static str },
    #[error("billing cycle must be at least one day")]
    ZeroBillingCycle,
}

/// Non-fatal conflicts raised when an event cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("appliance {appliance} is already on at tick {tick}")]
    AlreadyOn { appliance: String, tick: u64 },
    #[error("appliance {appliance} is not on at tick {tick}")]
    NotOn { appliance: String, tick: u64 },
    #[error("appliance {appliance} was switched on by activation {owner}, not {requested}")]
    ActivationMismatch {
        appliance: String,
        owner: u64,
        requested: u64,
    },
    #[error("base-load appliance {0} cannot be switched off")]
    BaseLoad(String),
    #[error("no appliance {appliance} in installation {installation}")]
    UnknownAppliance { installation: usize, appliance: usize },
}

/// Fatal errors raised while assembling the scenario object graph.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("distribution `{field}` of activity {activity}: {source}")]
    Distribution {
        activity: String,
        field: &'static str,
        #[source]
        source: DistributionError,
    },
    #[error("appliance {appliance}: {source}")]
    ConsumptionModel {
        appliance: String,
        #[source]
        source: ConsumptionModelError,
    },
    #[error("pricing policy {policy}: {source}")]
    Pricing {
        policy: String,
        #[source]
        source: PricingError,
    },
    #[error("installation {installation} references unknown pricing policy {policy}")]
    UnknownPolicy { installation: String, policy: String },
    #[error("activity {activity} references unknown appliance {appliance}")]
    UnknownAppliance { activity: String, appliance: String },
    #[error("person {person}: {factor} {value} is outside [0, 1]")]
    InvalidPersona {
        person: String,
        factor: &'static str,
        value: f64,
    },
    #[error("invalid day type \"{0}\"")]
    InvalidDayType(String),
    #[error("demographics reference unknown template installation {0}")]
    UnknownTemplate(String),
    #[error("scenario has no installations")]
    EmptyScenario,
}

/// Top-level error of a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("simulation needs at least one Monte-Carlo run")]
    NoRuns,
}
