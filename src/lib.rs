//! Stochastic household electricity demand simulator.

#[cfg(feature = "api")]
pub mod api;
/// Persons, activities, day types and demand response.
pub mod behavior;
pub mod config;
pub mod devices;
/// Probability distributions used to sample behaviour.
pub mod distributions;
pub mod error;
pub mod pricing;
pub mod scenario;
/// Simulation engine, event queue, installations and KPIs.
pub mod sim;
pub mod sink;
