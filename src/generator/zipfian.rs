//! Zipfian generator after Gray et al., "Quickly Generating Billion-Record Synthetic Databases",
//! SIGMOD 1994.
//!
//! Item `lo + k` is produced with probability proportional to `1 / (k + 1)^theta`. The
//! normalization constant `zeta(n) = sum_{i=1..n} 1 / i^theta` is computed once at construction.
//! If the generator is later asked for more items than it was sized for, `zeta` is extended from
//! the cached `(n, zeta(n))` pair instead of being recomputed.

use super::IntegerGenerator;
use crate::{Error, Result};
use log::warn;
use rand::Rng;

/// The default skew, as used by YCSB.
pub const ZIPFIAN_CONSTANT: f64 = 0.99;

#[derive(Clone, Debug)]
pub struct ZipfianGenerator {
    base: u64,
    items: u64,
    theta: f64,
    alpha: f64,
    zeta2theta: f64,
    /// The item count `zetan` and `eta` were computed for.
    count_for_zeta: u64,
    zetan: f64,
    eta: f64,
    last: u64,
}

/// Add `1 / (i + 1)^theta` for `i` in `[start, n)` onto `initial`.
fn zeta(start: u64, n: u64, theta: f64, initial: f64) -> f64 {
    let mut sum = initial;
    for i in start..n {
        sum += 1.0 / ((i + 1) as f64).powf(theta);
    }
    sum
}

impl ZipfianGenerator {
    pub fn new(lo: u64, hi: u64) -> Result<Self> {
        Self::with_theta(lo, hi, ZIPFIAN_CONSTANT)
    }

    pub fn with_theta(lo: u64, hi: u64, theta: f64) -> Result<Self> {
        let items = Self::item_count(lo, hi)?;
        Self::check_theta(theta)?;
        let zetan = zeta(0, items, theta, 0.0);
        Ok(Self::with_zetan_unchecked(lo, items, theta, zetan))
    }

    /// Build a generator with a precomputed `zeta(n)`, for item counts too large to sum up.
    pub fn with_zetan(lo: u64, hi: u64, theta: f64, zetan: f64) -> Result<Self> {
        let items = Self::item_count(lo, hi)?;
        Self::check_theta(theta)?;
        Ok(Self::with_zetan_unchecked(lo, items, theta, zetan))
    }

    fn item_count(lo: u64, hi: u64) -> Result<u64> {
        if hi < lo {
            return Err(Error::EmptyRange { lo, hi });
        }
        Ok(hi - lo + 1)
    }

    fn check_theta(theta: f64) -> Result<()> {
        // theta == 1 makes alpha infinite
        if !(theta > 0.0 && theta < 1.0) {
            return Err(Error::InvalidOption {
                name: "zipfianconstant",
                detail: format!("{} is not in (0, 1)", theta),
            });
        }
        Ok(())
    }

    fn with_zetan_unchecked(base: u64, items: u64, theta: f64, zetan: f64) -> Self {
        let zeta2theta = zeta(0, 2, theta, 0.0);
        let alpha = 1.0 / (1.0 - theta);
        let eta = Self::eta(items, theta, zeta2theta, zetan);
        Self {
            base,
            items,
            theta,
            alpha,
            zeta2theta,
            count_for_zeta: items,
            zetan,
            eta,
            last: base,
        }
    }

    fn eta(items: u64, theta: f64, zeta2theta: f64, zetan: f64) -> f64 {
        (1.0 - (2.0 / items as f64).powf(1.0 - theta)) / (1.0 - zeta2theta / zetan)
    }

    /// Draw from the first `item_count` items, resizing the normalization if needed.
    pub fn next_with_count<R: Rng + ?Sized>(&mut self, rng: &mut R, item_count: u64) -> u64 {
        let item_count = item_count.max(1);
        if item_count != self.count_for_zeta {
            if item_count > self.count_for_zeta {
                self.zetan = zeta(self.count_for_zeta, item_count, self.theta, self.zetan);
            } else {
                warn!(
                    "Zipfian item count shrank from {} to {}, recomputing zeta",
                    self.count_for_zeta, item_count
                );
                self.zetan = zeta(0, item_count, self.theta, 0.0);
            }
            self.count_for_zeta = item_count;
            self.eta = Self::eta(item_count, self.theta, self.zeta2theta, self.zetan);
        }

        let u: f64 = rng.random();
        let uz = u * self.zetan;
        let rank = if uz < 1.0 {
            0
        } else if uz < 1.0 + 0.5f64.powf(self.theta) {
            1
        } else {
            let r = item_count as f64 * (self.eta * u - self.eta + 1.0).powf(self.alpha);
            (r as u64).min(item_count - 1)
        };
        self.last = self.base + rank;
        self.last
    }

    pub fn items(&self) -> u64 {
        self.items
    }

    /// The cached `(n, zeta(n))` pair.
    pub fn zeta(&self) -> (u64, f64) {
        (self.count_for_zeta, self.zetan)
    }
}

impl IntegerGenerator for ZipfianGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        self.next_with_count(rng, self.items)
    }

    fn last(&self) -> u64 {
        self.last
    }

    /// Exact mean over the currently sized items. This walks the whole range once.
    fn mean(&self) -> f64 {
        let n = self.count_for_zeta;
        let mut weighted = 0.0;
        for k in 0..n {
            weighted += k as f64 / ((k + 1) as f64).powf(self.theta);
        }
        self.base as f64 + weighted / self.zetan
    }
}
