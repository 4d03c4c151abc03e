use super::zipfian::ZipfianGenerator;
use super::IntegerGenerator;
use crate::keyspace::KeySpace;
use crate::Result;
use rand::Rng;

/// Zipfian over the inserted ordinals, skewed towards the most recent insert.
///
/// The item count follows the key space, so the underlying Zipfian grows its normalization as
/// records are inserted.
#[derive(Clone, Debug)]
pub struct SkewedLatestGenerator {
    keyspace: KeySpace,
    zipfian: ZipfianGenerator,
    last: u64,
}

impl SkewedLatestGenerator {
    pub fn new(keyspace: KeySpace, theta: f64) -> Result<Self> {
        let count = keyspace.boundary().max(1);
        let zipfian = ZipfianGenerator::with_theta(0, count - 1, theta)?;
        Ok(Self {
            keyspace,
            zipfian,
            last: 0,
        })
    }
}

impl IntegerGenerator for SkewedLatestGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        let count = self.keyspace.boundary().max(1);
        let rank = self.zipfian.next_with_count(rng, count);
        self.last = (count - 1).saturating_sub(rank);
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }

    fn mean(&self) -> f64 {
        let count = self.keyspace.boundary().max(1);
        (count - 1) as f64 - self.zipfian.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ZIPFIAN_CONSTANT;

    #[test]
    fn latest_favors_recent_inserts() {
        let mut rng = rand::rng();
        let ks = KeySpace::new(100);
        let mut g = SkewedLatestGenerator::new(ks.clone(), ZIPFIAN_CONSTANT).unwrap();
        let mut counts = vec![0u64; 100];
        for _ in 0..100000 {
            let v = g.next(&mut rng);
            assert!(v < 100);
            counts[v as usize] += 1;
        }
        assert!(counts[99] > counts[50]);
        assert!(counts[50] > counts[0]);
    }

    #[test]
    fn latest_grows_with_the_key_space() {
        let mut rng = rand::rng();
        let ks = KeySpace::new(10);
        let mut g = SkewedLatestGenerator::new(ks.clone(), ZIPFIAN_CONSTANT).unwrap();
        for _ in 0..90 {
            ks.next_insert_ordinal();
        }
        let mut top = 0;
        for _ in 0..10000 {
            let v = g.next(&mut rng);
            assert!(v < 100);
            if v == 99 {
                top += 1;
            }
        }
        // rank 0 carries about 19% of the mass over 100 items
        assert!(top > 1500, "{} draws of the newest ordinal", top);
        assert!(g.mean() > 50.0);
    }
}
