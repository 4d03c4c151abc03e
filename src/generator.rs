//! Integer generators that implement the distribution laws of a workload.
//!
//! Every generator produces a lazy, effectively infinite sequence of integers and remembers the
//! value it produced last. They are small values: a worker thread clones its own instances from a
//! template, so the "last value" slot is never shared between threads. The few pieces of state
//! that must be shared (the insertion counter, the sliding hotspot offset) live behind atomics
//! in an [`Arc`](std::sync::Arc) that the clones keep pointing at.
//!
//! All generators implement [`IntegerGenerator`]. [`Generator`] is the enum over all of them
//! that the workload stores, so that the choice of a law is made once from the configuration and
//! dispatched statically afterwards.

use rand::Rng;

/// The common contract of all integer generators.
pub trait IntegerGenerator {
    /// Advance the sequence and return the next value. The value is also stored as the last one.
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64;

    /// The value returned by the most recent call to `next`, without advancing.
    fn last(&self) -> u64;

    /// The expected value of the distribution.
    fn mean(&self) -> f64;
}

const FNV_OFFSET_BASIS_64: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME_64: u64 = 1_099_511_628_211;

/// 64-bit FNV-1a hash of the little-endian bytes of `val`.
///
/// Used to scramble Zipfian ranks and to build hashed record keys.
pub fn fnv_hash64(val: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS_64;
    for octet in val.to_le_bytes() {
        hash ^= u64::from(octet);
        hash = hash.wrapping_mul(FNV_PRIME_64);
    }
    hash
}

/// A generator of any supported law.
#[derive(Clone, Debug)]
pub enum Generator {
    Constant(ConstantGenerator),
    Counter(CounterGenerator),
    Uniform(UniformGenerator),
    Zipfian(ZipfianGenerator),
    ScrambledZipfian(ScrambledZipfianGenerator),
    Hotspot(HotspotGenerator),
    SlidingHotspot(SlidingHotspotGenerator),
    Exponential(ExponentialGenerator),
    Latest(SkewedLatestGenerator),
    Histogram(HistogramGenerator),
}

impl IntegerGenerator for Generator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        match self {
            Generator::Constant(g) => g.next(rng),
            Generator::Counter(g) => g.next(rng),
            Generator::Uniform(g) => g.next(rng),
            Generator::Zipfian(g) => g.next(rng),
            Generator::ScrambledZipfian(g) => g.next(rng),
            Generator::Hotspot(g) => g.next(rng),
            Generator::SlidingHotspot(g) => g.next(rng),
            Generator::Exponential(g) => g.next(rng),
            Generator::Latest(g) => g.next(rng),
            Generator::Histogram(g) => g.next(rng),
        }
    }

    fn last(&self) -> u64 {
        match self {
            Generator::Constant(g) => g.last(),
            Generator::Counter(g) => g.last(),
            Generator::Uniform(g) => g.last(),
            Generator::Zipfian(g) => g.last(),
            Generator::ScrambledZipfian(g) => g.last(),
            Generator::Hotspot(g) => g.last(),
            Generator::SlidingHotspot(g) => g.last(),
            Generator::Exponential(g) => g.last(),
            Generator::Latest(g) => g.last(),
            Generator::Histogram(g) => g.last(),
        }
    }

    fn mean(&self) -> f64 {
        match self {
            Generator::Constant(g) => g.mean(),
            Generator::Counter(g) => g.mean(),
            Generator::Uniform(g) => g.mean(),
            Generator::Zipfian(g) => g.mean(),
            Generator::ScrambledZipfian(g) => g.mean(),
            Generator::Hotspot(g) => g.mean(),
            Generator::SlidingHotspot(g) => g.mean(),
            Generator::Exponential(g) => g.mean(),
            Generator::Latest(g) => g.mean(),
            Generator::Histogram(g) => g.mean(),
        }
    }
}

mod constant;
mod counter;
mod exponential;
mod histogram;
mod hotspot;
mod latest;
mod scrambled;
mod sliding;
mod uniform;
mod zipfian;

pub use constant::ConstantGenerator;
pub use counter::{AtomicCounter, CounterGenerator};
pub use exponential::{
    ExponentialGenerator, EXPONENTIAL_FRAC_DEFAULT, EXPONENTIAL_PERCENTILE_DEFAULT,
};
pub use histogram::HistogramGenerator;
pub use hotspot::HotspotGenerator;
pub use latest::SkewedLatestGenerator;
pub use scrambled::ScrambledZipfianGenerator;
pub use sliding::{SlideState, SlidingHotspotGenerator};
pub use uniform::UniformGenerator;
pub use zipfian::{ZipfianGenerator, ZIPFIAN_CONSTANT};
