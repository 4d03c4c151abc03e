use super::IntegerGenerator;
use rand::Rng;

/// Always produces the same value.
#[derive(Clone, Debug)]
pub struct ConstantGenerator {
    value: u64,
}

impl ConstantGenerator {
    pub fn new(value: u64) -> Self {
        Self { value }
    }
}

impl IntegerGenerator for ConstantGenerator {
    fn next<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> u64 {
        self.value
    }

    fn last(&self) -> u64 {
        self.value
    }

    fn mean(&self) -> f64 {
        self.value as f64
    }
}
