//! Bookkeeping of which record ordinals exist.
//!
//! Ordinals below [`KeySpace::boundary`] have been handed out to an insert; ordinals at or above
//! it have not. Inserts take the boundary and advance it. Every other operation draws an ordinal
//! from its request generator and rejects it until it falls below the boundary.

use crate::generator::{fnv_hash64, AtomicCounter, Generator, IntegerGenerator};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

/// How ordinals become record keys.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsertOrder {
    /// `user<ordinal>`, so keys sort in insertion order (modulo string ordering).
    Ordered,
    /// `user<fnv64(ordinal)>`, spreading consecutive inserts over the key space.
    #[default]
    Hashed,
}

/// Turn an ordinal into the key the store sees.
pub fn build_key(ordinal: u64, order: InsertOrder) -> String {
    match order {
        InsertOrder::Ordered => format!("user{}", ordinal),
        InsertOrder::Hashed => format!("user{}", fnv_hash64(ordinal)),
    }
}

/// The shared insertion counter of one phase.
#[derive(Clone, Debug)]
pub struct KeySpace {
    counter: Arc<AtomicCounter>,
}

impl KeySpace {
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicCounter::new(start)),
        }
    }

    /// Claim the next ordinal for an insert.
    pub fn next_insert_ordinal(&self) -> u64 {
        self.counter.fetch_next()
    }

    /// Exclusive upper bound of the ordinals that may be offered to the store.
    pub fn boundary(&self) -> u64 {
        self.counter.current()
    }

    /// Draw an ordinal from `gen` until it is below the boundary.
    ///
    /// With `from_latest`, draws are distances back from the most recent ordinal instead of
    /// ordinals. Returns `None` when `max_retries` draws were all rejected, or at once when the
    /// key space is empty and `max_retries` is set. Without a cap, an empty key space is waited on
    /// until a concurrent insert claims an ordinal.
    pub fn draw_ordinal<R: Rng + ?Sized>(
        &self,
        gen: &mut Generator,
        rng: &mut R,
        from_latest: bool,
        max_retries: Option<u64>,
    ) -> Option<u64> {
        let mut attempts = 0u64;
        loop {
            let boundary = self.boundary();
            if boundary == 0 {
                if max_retries.is_some() {
                    return None;
                }
                std::thread::yield_now();
                continue;
            }
            if let Some(max) = max_retries {
                if attempts >= max {
                    return None;
                }
            }
            attempts += 1;
            let draw = gen.next(rng);
            if from_latest {
                if let Some(ordinal) = (boundary - 1).checked_sub(draw) {
                    return Some(ordinal);
                }
            } else if draw < boundary {
                return Some(draw);
            }
        }
    }
}
