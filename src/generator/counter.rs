use super::IntegerGenerator;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A lock-free, monotonically increasing counter shared between threads.
///
/// Advancing it is a single fetch-and-add, so concurrent callers never observe the same value
/// twice.
#[derive(Debug)]
pub struct AtomicCounter {
    start: u64,
    next: AtomicU64,
}

impl AtomicCounter {
    pub fn new(start: u64) -> Self {
        Self {
            start,
            next: AtomicU64::new(start),
        }
    }

    /// Return the current value and advance by one.
    pub fn fetch_next(&self) -> u64 {
        // a single memory location only needs coherence, which relaxed ordering already gives
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The value the next call to `fetch_next` will return.
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    pub fn start(&self) -> u64 {
        self.start
    }
}

/// Counts upwards from a start value. Clones share the same underlying [`AtomicCounter`] but
/// keep their own last value.
#[derive(Clone, Debug)]
pub struct CounterGenerator {
    counter: Arc<AtomicCounter>,
    last: u64,
}

impl CounterGenerator {
    pub fn new(start: u64) -> Self {
        Self::from_shared(Arc::new(AtomicCounter::new(start)))
    }

    pub fn from_shared(counter: Arc<AtomicCounter>) -> Self {
        let last = counter.current().saturating_sub(1);
        Self { counter, last }
    }

    pub fn shared(&self) -> Arc<AtomicCounter> {
        self.counter.clone()
    }
}

impl IntegerGenerator for CounterGenerator {
    fn next<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> u64 {
        self.last = self.counter.fetch_next();
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }

    /// The mean of all values handed out so far.
    fn mean(&self) -> f64 {
        let start = self.counter.start() as f64;
        let current = self.counter.current() as f64;
        if current <= start {
            start
        } else {
            (start + current - 1.0) / 2.0
        }
    }
}
