use rand::rngs::StdRng;

use crate::error::SetupError;
use crate::sim::event::Activations;
use crate::sim::types::ActivityRef;

use super::activity::{Activity, ScheduleContext};

/// An occupant of an installation.
///
/// `awareness` and `sensitivity`, both in `[0, 1]`, scale how strongly the
/// person's shiftable activities react to time-of-use prices.
#[derive(Debug, Clone)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub awareness: f64,
    pub sensitivity: f64,
    pub activities: Vec<Activity>,
}

impl Person {
    /// # Errors
    ///
    /// Returns `SetupError::InvalidPersona` if either factor lies outside `[0, 1]`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        awareness: f64,
        sensitivity: f64,
    ) -> Result<Self, SetupError> {
        let id = id.into();
        for (factor, value) in [("awareness", awareness), ("sensitivity", sensitivity)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SetupError::InvalidPersona {
                    person: id,
                    factor,
                    value,
                });
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            awareness,
            sensitivity,
            activities: Vec::new(),
        })
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    /// Plans every activity of the day, in order. Returns the number of
    /// occurrences scheduled.
    pub fn schedule_day(
        &mut self,
        ctx: &ScheduleContext<'_>,
        person: usize,
        rng: &mut StdRng,
        activations: &mut Activations,
    ) -> u64 {
        let (awareness, sensitivity) = (self.awareness, self.sensitivity);
        self.activities
            .iter_mut()
            .enumerate()
            .map(|(activity, a)| {
                a.schedule_day(
                    ctx,
                    ActivityRef { person, activity },
                    awareness,
                    sensitivity,
                    rng,
                    activations,
                )
            })
            .sum()
    }
}
