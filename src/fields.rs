//! Synthesized record payloads.

use crate::generator::{Generator, IntegerGenerator, UniformGenerator};
use crate::{Error, FieldMap, Result};
use rand::distr::{Alphanumeric, Distribution};
use rand::Rng;

pub fn field_name(index: u64) -> String {
    format!("field{}", index)
}

/// Builds field maps with random content. Each worker owns a clone, so the length and field
/// generators are never shared.
#[derive(Clone, Debug)]
pub struct FieldSynthesizer {
    field_count: u64,
    length: Generator,
    chooser: UniformGenerator,
}

impl FieldSynthesizer {
    pub fn new(field_count: u64, length: Generator) -> Result<Self> {
        if field_count == 0 {
            return Err(Error::InvalidOption {
                name: "fieldcount",
                detail: "a record needs at least one field".to_string(),
            });
        }
        let chooser = UniformGenerator::new(0, field_count - 1)?;
        Ok(Self {
            field_count,
            length,
            chooser,
        })
    }

    pub fn field_count(&self) -> u64 {
        self.field_count
    }

    /// The mean payload length, used to size occupancy-driven workloads.
    pub fn mean_length(&self) -> f64 {
        self.length.mean()
    }

    fn payload<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Box<[u8]> {
        let len = self.length.next(rng) as usize;
        (0..len).map(|_| Alphanumeric.sample(rng)).collect()
    }

    /// A full record with every field.
    pub fn build_record<R: Rng + ?Sized>(&mut self, rng: &mut R) -> FieldMap {
        let mut fields = FieldMap::with_capacity(self.field_count as usize);
        for i in 0..self.field_count {
            let data = self.payload(rng);
            fields.insert(field_name(i), data);
        }
        fields
    }

    /// A single, uniformly chosen field with fresh content.
    pub fn build_partial_update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> FieldMap {
        let name = self.choose_field(rng);
        let data = self.payload(rng);
        let mut fields = FieldMap::with_capacity(1);
        fields.insert(name, data);
        fields
    }

    /// The name of a uniformly chosen field.
    pub fn choose_field<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        field_name(self.chooser.next(rng))
    }
}
