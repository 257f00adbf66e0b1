use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic millisecond time source.
pub trait Clock {
    fn millis(&self) -> u64;

    /// Block for `duration`. Only used while connecting.
    fn delay(&self, duration: Duration);
}

#[derive(Clone, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the driver
/// owns another. `delay` advances the time instead of sleeping.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.set(millis);
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration.as_millis() as u64);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        self.now.get()
    }

    fn delay(&self, duration: Duration) {
        self.advance(duration);
    }
}
