use super::IntegerGenerator;
use crate::{Error, Result};
use rand::distr::{Distribution, Uniform};
use rand::Rng;

/// Uniform over `[lo, hi]`, both ends inclusive.
#[derive(Clone, Debug)]
pub struct UniformGenerator {
    lo: u64,
    hi: u64,
    dist: Uniform<u64>,
    last: u64,
}

impl UniformGenerator {
    pub fn new(lo: u64, hi: u64) -> Result<Self> {
        if hi < lo {
            return Err(Error::EmptyRange { lo, hi });
        }
        let dist = Uniform::new_inclusive(lo, hi).map_err(|_| Error::EmptyRange { lo, hi })?;
        Ok(Self {
            lo,
            hi,
            dist,
            last: lo,
        })
    }
}

impl IntegerGenerator for UniformGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        self.last = self.dist.sample(rng);
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }

    fn mean(&self) -> f64 {
        (self.lo as f64 + self.hi as f64) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    #[test]
    fn uniform_bounds_and_spread() {
        let mut rng = rand::rng();
        let mut g = UniformGenerator::new(0, 99).unwrap();
        let mut dist: HashMap<u64, u64> = HashMap::new();
        // 100 values, 1m draws so ~10k each. Bound to 9k to 11k.
        for _ in 0..1000000 {
            let v = g.next(&mut rng);
            assert!(v <= 99);
            assert_eq!(g.last(), v);
            *dist.entry(v).or_default() += 1;
        }
        assert_eq!(dist.len(), 100);
        for c in dist.values() {
            assert!(*c < 11000 && *c > 9000);
        }
    }

    #[test]
    fn uniform_single_value() {
        let mut rng = rand::rng();
        let mut g = UniformGenerator::new(7, 7).unwrap();
        assert_eq!(g.next(&mut rng), 7);
        assert_eq!(g.mean(), 7.0);
    }

    #[test]
    fn uniform_empty_range() {
        assert!(matches!(
            UniformGenerator::new(5, 4),
            Err(Error::EmptyRange { lo: 5, hi: 4 })
        ));
    }
}
