use super::IntegerGenerator;
use crate::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Percentage of draws that fall within the range by default.
pub const EXPONENTIAL_PERCENTILE_DEFAULT: f64 = 95.0;

/// Default share of `recordcount` the range covers.
pub const EXPONENTIAL_FRAC_DEFAULT: f64 = 0.8571428571;

/// Exponentially distributed distances, floored to integers.
///
/// The workload subtracts each draw from the most recently inserted ordinal, so small values
/// point at recent records.
#[derive(Clone, Debug)]
pub struct ExponentialGenerator {
    gamma: f64,
    dist: Exp<f64>,
    last: u64,
}

impl ExponentialGenerator {
    /// `percentile` percent of the draws fall below `range`.
    pub fn new(percentile: f64, range: f64) -> Result<Self> {
        if !(percentile > 0.0 && percentile < 100.0) {
            return Err(Error::InvalidOption {
                name: "exponential.percentile",
                detail: format!("{} is not in (0, 100)", percentile),
            });
        }
        if !(range > 0.0) {
            return Err(Error::InvalidOption {
                name: "exponential.frac",
                detail: format!("range {} is not positive", range),
            });
        }
        Self::with_gamma(-(1.0 - percentile / 100.0).ln() / range)
    }

    pub fn with_mean(mean: f64) -> Result<Self> {
        if !(mean > 0.0) {
            return Err(Error::InvalidOption {
                name: "exponential mean",
                detail: format!("{} is not positive", mean),
            });
        }
        Self::with_gamma(1.0 / mean)
    }

    fn with_gamma(gamma: f64) -> Result<Self> {
        let dist = Exp::new(gamma).map_err(|e| Error::InvalidOption {
            name: "exponential",
            detail: e.to_string(),
        })?;
        Ok(Self {
            gamma,
            dist,
            last: 0,
        })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl IntegerGenerator for ExponentialGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        // saturating float to int conversion
        self.last = self.dist.sample(rng).floor() as u64;
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }

    fn mean(&self) -> f64 {
        1.0 / self.gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_percentile_holds() {
        let mut rng = rand::rng();
        let mut g = ExponentialGenerator::new(95.0, 1000.0).unwrap();
        let below = (0..100000).filter(|_| g.next(&mut rng) < 1000).count();
        let share = below as f64 / 100000.0;
        assert!((share - 0.95).abs() < 0.01, "share {}", share);
    }

    #[test]
    fn exponential_mean() {
        let mut rng = rand::rng();
        let mut g = ExponentialGenerator::with_mean(50.0).unwrap();
        assert_eq!(g.mean(), 50.0);
        let sum: u64 = (0..100000).map(|_| g.next(&mut rng)).sum();
        // flooring shaves about half a unit off the continuous mean
        let mean = sum as f64 / 100000.0;
        assert!(mean > 47.0 && mean < 51.0, "mean {}", mean);
    }

    #[test]
    fn exponential_invalid() {
        assert!(ExponentialGenerator::new(0.0, 10.0).is_err());
        assert!(ExponentialGenerator::new(100.0, 10.0).is_err());
        assert!(ExponentialGenerator::new(95.0, 0.0).is_err());
        assert!(ExponentialGenerator::with_mean(-1.0).is_err());
    }
}
