//! Occupant behaviour: persons, their activities and how activities react
//! to prices.

pub mod activity;
/// Day-type keys and the calendar resolution order.
pub mod day_type;
pub mod person;
pub mod response;

pub use activity::{Activity, DayParams, ScheduleContext, WeightedAppliance};
pub use day_type::{DayContext, DayType};
pub use person::Person;
pub use response::{PriceShift, ResponseModel};
