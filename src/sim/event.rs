//! Switch events and the queue that orders them.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tracing::trace;

use crate::devices::Appliance;
use crate::error::EventError;

use super::types::{ActivityRef, ApplianceRef};

/// What an event does to its appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    On,
    Off,
}

/// A scheduled switch of one appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub tick: u64,
    pub action: Action,
    pub appliance: ApplianceRef,
    /// Identifies the activity occurrence that produced the event; an OFF
    /// only applies to the cycle started by the ON with the same activation.
    pub activation: u64,
    pub activity: Option<ActivityRef>,
}

impl Event {
    pub fn on(
        tick: u64,
        appliance: ApplianceRef,
        activation: u64,
        activity: Option<ActivityRef>,
    ) -> Self {
        Self {
            tick,
            action: Action::On,
            appliance,
            activation,
            activity,
        }
    }

    pub fn off(
        tick: u64,
        appliance: ApplianceRef,
        activation: u64,
        activity: Option<ActivityRef>,
    ) -> Self {
        Self {
            tick,
            action: Action::Off,
            appliance,
            activation,
            activity,
        }
    }

    /// Applies the event to the appliance it targets.
    ///
    /// # Errors
    ///
    /// Returns the appliance's `EventError` when the switch conflicts with
    /// its current state; the appliance is left untouched.
    pub fn apply(&self, appliance: &mut Appliance) -> Result<(), EventError> {
        match self.action {
            Action::On => appliance.turn_on(self.tick, self.activation, self.activity),
            Action::Off => appliance.turn_off(self.tick, self.activation),
        }
    }
}

/// Hands out activation ids; consumes no randomness.
#[derive(Debug, Default)]
pub struct Activations {
    next: u64,
}

impl Activations {
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[derive(Debug)]
struct Queued {
    seq: u64,
    event: Event,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.event.tick, self.seq).cmp(&(other.event.tick, other.seq))
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    heap: BinaryHeap<Reverse<Queued>>,
}

/// Thread-safe min-queue of events keyed by tick.
///
/// Events sharing a tick come out in insertion order.
///
/// # Examples
///
/// ```
/// use demand_sim::sim::event::{Event, EventQueue};
/// use demand_sim::sim::types::ApplianceRef;
///
/// let queue = EventQueue::new();
/// let app = ApplianceRef { installation: 0, appliance: 0 };
/// queue.push(Event::on(5, app, 0, None));
/// queue.push(Event::on(3, app, 1, None));
///
/// assert!(queue.pop_due(2).is_empty());
/// let due: Vec<u64> = queue.pop_due(5).iter().map(|e| e.tick).collect();
/// assert_eq!(due, vec![3, 5]);
/// ```
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: Mutex<Inner>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq = inner.next_seq.wrapping_add(1);
        trace!(tick = event.tick, seq, "event queued");
        inner.heap.push(Reverse(Queued { seq, event }));
    }

    /// Removes and returns the earliest event, if any.
    pub fn pop(&self) -> Option<Event> {
        self.inner.lock().heap.pop().map(|Reverse(q)| q.event)
    }

    /// Removes every event with `event.tick <= tick`, earliest first.
    pub fn pop_due(&self, tick: u64) -> Vec<Event> {
        let mut inner = self.inner.lock();
        let mut due = Vec::new();
        while inner
            .heap
            .peek()
            .is_some_and(|Reverse(top)| top.event.tick <= tick)
        {
            if let Some(Reverse(q)) = inner.heap.pop() {
                due.push(q.event);
            }
        }
        due
    }

    /// Tick of the earliest pending event.
    pub fn peek_tick(&self) -> Option<u64> {
        self.inner.lock().heap.peek().map(|Reverse(q)| q.event.tick)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }
}
