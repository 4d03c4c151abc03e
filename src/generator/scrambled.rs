use super::zipfian::{ZipfianGenerator, ZIPFIAN_CONSTANT};
use super::{fnv_hash64, IntegerGenerator};
use crate::{Error, Result};
use rand::Rng;

/// The size of the rank space the underlying Zipfian draws from.
const ITEM_COUNT: u64 = 10_000_000_000;

/// `zeta(ITEM_COUNT)` for [`ZIPFIAN_CONSTANT`], too expensive to compute at startup.
const ZETAN: f64 = 26.46902820178302;

/// A Zipfian law whose popular items are spread over the whole range.
///
/// Ranks are drawn from a fixed, very large item space and hashed into `[lo, hi]`. Because the
/// rank space never changes, raising the upper bound later does not change which items are
/// popular. Callers that pre-size the range for keys yet to be inserted filter out the ordinals
/// that do not exist yet.
#[derive(Clone, Debug)]
pub struct ScrambledZipfianGenerator {
    lo: u64,
    hi: u64,
    items: u64,
    gen: ZipfianGenerator,
    last: u64,
}

impl ScrambledZipfianGenerator {
    pub fn new(lo: u64, hi: u64) -> Result<Self> {
        Self::with_theta(lo, hi, ZIPFIAN_CONSTANT)
    }

    pub fn with_theta(lo: u64, hi: u64, theta: f64) -> Result<Self> {
        if hi < lo {
            return Err(Error::EmptyRange { lo, hi });
        }
        let gen = if theta == ZIPFIAN_CONSTANT {
            ZipfianGenerator::with_zetan(0, ITEM_COUNT - 1, theta, ZETAN)?
        } else {
            // no precomputed constant: keep the rank space small enough to sum up
            ZipfianGenerator::with_theta(0, hi - lo, theta)?
        };
        Ok(Self {
            lo,
            hi,
            items: hi - lo + 1,
            gen,
            last: lo,
        })
    }

    /// Map a raw Zipfian rank to the ordinal it is reported as.
    pub fn scramble(&self, rank: u64) -> u64 {
        self.lo + fnv_hash64(rank) % self.items
    }
}

impl IntegerGenerator for ScrambledZipfianGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        let rank = self.gen.next(rng);
        self.last = self.scramble(rank);
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }

    fn mean(&self) -> f64 {
        (self.lo as f64 + self.hi as f64) / 2.0
    }
}
