use super::hotspot::HotspotGenerator;
use super::IntegerGenerator;
use crate::Result;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The moving part of a sliding hotspot, shared by all clones of the generator.
///
/// Only the controller thread calls [`SlideState::tick`]; worker threads read the offset with
/// relaxed loads and may see a value that is up to one period stale.
#[derive(Debug)]
pub struct SlideState {
    speed: u64,
    cold: u64,
    ticks: AtomicU64,
    offset: AtomicU64,
}

impl SlideState {
    fn new(speed: u64, cold: u64) -> Self {
        Self {
            speed,
            cold,
            ticks: AtomicU64::new(0),
            offset: AtomicU64::new(0),
        }
    }

    /// The offset after `ticks` ticks at `speed`, sweeping forward then backward over `cold`.
    pub fn offset_after(ticks: u64, speed: u64, cold: u64) -> u64 {
        if cold == 0 {
            return 0;
        }
        let raw = ticks.saturating_mul(speed);
        let within = raw % cold;
        let offset = if (raw / cold) % 2 == 0 {
            within
        } else {
            cold - within
        };
        offset.min(cold - 1)
    }

    /// Advance the window by one step.
    pub fn tick(&self) -> u64 {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let offset = Self::offset_after(ticks, self.speed, self.cold);
        self.offset.store(offset, Ordering::Relaxed);
        offset
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// A hotspot whose hot set drifts through the range over time.
#[derive(Clone, Debug)]
pub struct SlidingHotspotGenerator {
    hotspot: HotspotGenerator,
    state: Arc<SlideState>,
}

impl SlidingHotspotGenerator {
    pub fn new(
        lo: u64,
        hi: u64,
        hot_data_fraction: f64,
        hot_op_fraction: f64,
        speed: u64,
    ) -> Result<Self> {
        let hotspot = HotspotGenerator::new(lo, hi, hot_data_fraction, hot_op_fraction)?;
        let state = Arc::new(SlideState::new(speed, hotspot.cold_interval()));
        Ok(Self { hotspot, state })
    }

    /// The handle the controller ticks.
    pub fn state(&self) -> Arc<SlideState> {
        self.state.clone()
    }
}

impl IntegerGenerator for SlidingHotspotGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        let offset = self.state.offset();
        self.hotspot.draw(rng, offset)
    }

    fn last(&self) -> u64 {
        self.hotspot.last()
    }

    fn mean(&self) -> f64 {
        self.hotspot.mean_with_offset(self.state.offset())
    }
}
