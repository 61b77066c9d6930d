use super::types::{TICKS_PER_DAY, TICKS_PER_HOUR};

/// One step of the simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Minute index from the simulation start.
    pub index: u64,
}

impl Tick {
    /// Zero-based simulated day this tick belongs to.
    pub fn day(self) -> u64 {
        self.index / TICKS_PER_DAY
    }

    /// Minute of the day, `0..1440`.
    pub fn minute_of_day(self) -> u64 {
        self.index % TICKS_PER_DAY
    }

    /// `true` on the first minute of a day.
    pub fn starts_day(self) -> bool {
        self.index % TICKS_PER_DAY == 0
    }

    /// `true` on the last minute of an hour.
    pub fn ends_hour(self) -> bool {
        (self.index + 1) % TICKS_PER_HOUR == 0
    }
}

/// A simulation clock that tracks minute ticks over a fixed horizon.
///
/// # Examples
///
/// ```
/// use demand_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut ticks = Vec::new();
///
/// clock.run(|tick| ticks.push(tick.index));
/// assert_eq!(ticks, vec![0, 1, 2]);
/// ```
pub struct Clock {
    /// Next tick to hand out
    current: u64,
    /// Total ticks in the horizon
    total: u64,
}

impl Clock {
    /// Creates a new clock running `total` ticks.
    pub fn new(total: u64) -> Self {
        Self { current: 0, total }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The tick before advancing
    /// * `None` - If the clock has reached its total ticks
    pub fn tick(&mut self) -> Option<Tick> {
        if self.current < self.total {
            let tick = Tick {
                index: self.current,
            };
            self.current += 1;
            Some(tick)
        } else {
            None
        }
    }

    /// Runs a function for each remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(Tick)) {
        while let Some(tick) = self.tick() {
            f(tick);
        }
    }
}

impl Iterator for Clock {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        self.tick()
    }
}
