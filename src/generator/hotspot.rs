use super::IntegerGenerator;
use crate::{Error, Result};
use log::warn;
use rand::Rng;

/// Splits `[lo, hi]` into a hot set at the low end and a cold remainder.
///
/// The hot set holds `hot_data_fraction` of the items and receives `hot_op_fraction` of the
/// draws; within each set, draws are uniform.
#[derive(Clone, Debug)]
pub struct HotspotGenerator {
    lo: u64,
    hi: u64,
    hot_op_fraction: f64,
    hot_interval: u64,
    cold_interval: u64,
    last: u64,
}

fn clamp_fraction(name: &str, fraction: f64) -> f64 {
    if fraction.is_nan() || !(0.0..=1.0).contains(&fraction) {
        let clamped = if fraction > 1.0 { 1.0 } else { 0.0 };
        warn!(
            "Hotspot {} fraction {} out of range, using {}",
            name, fraction, clamped
        );
        return clamped;
    }
    fraction
}

impl HotspotGenerator {
    pub fn new(lo: u64, hi: u64, hot_data_fraction: f64, hot_op_fraction: f64) -> Result<Self> {
        if hi < lo {
            return Err(Error::EmptyRange { lo, hi });
        }
        let hot_data_fraction = clamp_fraction("data", hot_data_fraction);
        let hot_op_fraction = clamp_fraction("operation", hot_op_fraction);
        let interval = hi - lo + 1;
        let hot_interval = ((interval as f64 * hot_data_fraction) as u64).min(interval);
        let cold_interval = interval - hot_interval;
        Ok(Self {
            lo,
            hi,
            hot_op_fraction,
            hot_interval,
            cold_interval,
            last: lo,
        })
    }

    pub fn hot_interval(&self) -> u64 {
        self.hot_interval
    }

    pub fn cold_interval(&self) -> u64 {
        self.cold_interval
    }

    /// Draw with the hot set shifted forward by `offset`, and the cold set shortened by the same
    /// amount. `offset` must be below the cold interval unless the cold interval is empty.
    pub(crate) fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R, offset: u64) -> u64 {
        let offset = offset.min(self.cold_interval.saturating_sub(1));
        let hot = self.hot_interval > 0 && rng.random::<f64>() < self.hot_op_fraction;
        self.last = if hot || self.cold_interval == 0 {
            self.lo + offset + rng.random_range(0..self.hot_interval)
        } else {
            self.lo + self.hot_interval + rng.random_range(0..self.cold_interval - offset)
        };
        self.last
    }

    pub(crate) fn mean_with_offset(&self, offset: u64) -> f64 {
        let offset = offset.min(self.cold_interval.saturating_sub(1)) as f64;
        let lo = self.lo as f64;
        let hot = self.hot_interval as f64;
        let cold = self.cold_interval as f64;
        let hot_mean = lo + offset + (hot - 1.0).max(0.0) / 2.0;
        let cold_mean = lo + hot + (cold - offset - 1.0).max(0.0) / 2.0;
        match (self.hot_interval, self.cold_interval) {
            (0, _) => cold_mean,
            (_, 0) => hot_mean,
            _ => self.hot_op_fraction * hot_mean + (1.0 - self.hot_op_fraction) * cold_mean,
        }
    }

    pub fn upper_bound(&self) -> u64 {
        self.hi
    }
}

impl IntegerGenerator for HotspotGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        self.draw(rng, 0)
    }

    fn last(&self) -> u64 {
        self.last
    }

    fn mean(&self) -> f64 {
        self.mean_with_offset(0)
    }
}
