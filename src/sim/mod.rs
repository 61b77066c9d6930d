/// Simulation clock for minute ticks.
pub mod clock;
pub mod engine;
/// Switch events and the shared event queue.
pub mod event;
pub mod installation;
pub mod kpi;
pub mod types;

pub use engine::Engine;
pub use installation::Installation;
