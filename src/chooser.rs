//! The weighted operation mix.

use crate::{Error, Result};
use rand::Rng;
use std::fmt;

/// The kinds of operations a workload issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Update,
    Insert,
    Scan,
    ReadModifyWrite,
}

impl OperationKind {
    /// The measurement label of the kind.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Read => "READ",
            OperationKind::Update => "UPDATE",
            OperationKind::Insert => "INSERT",
            OperationKind::Scan => "SCAN",
            OperationKind::ReadModifyWrite => "READ-MODIFY-WRITE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Picks an operation kind with probability proportional to its weight.
///
/// Kinds with zero weight are left out of the table entirely, so they are never chosen. The
/// weights are normalized by their sum; a sum above one is rejected rather than rescaled.
#[derive(Clone, Debug)]
pub struct OperationChooser {
    table: Vec<(f64, OperationKind)>,
}

impl OperationChooser {
    pub fn new(read: f64, update: f64, insert: f64, scan: f64, rmw: f64) -> Result<Self> {
        let weights = [
            (read, OperationKind::Read),
            (update, OperationKind::Update),
            (insert, OperationKind::Insert),
            (scan, OperationKind::Scan),
            (rmw, OperationKind::ReadModifyWrite),
        ];
        for (w, kind) in weights.iter() {
            if !(*w >= 0.0) {
                return Err(Error::InvalidOption {
                    name: "operation proportion",
                    detail: format!("{} proportion {} is negative", kind, w),
                });
            }
        }
        let sum: f64 = weights.iter().map(|(w, _)| w).sum();
        if sum == 0.0 {
            return Err(Error::ZeroProportions);
        }
        // tolerate rounding in hand-written fractions such as 0.95 + 0.05
        if sum > 1.0 + 1e-9 {
            return Err(Error::InvalidOption {
                name: "operation proportion",
                detail: format!("proportions sum to {}, more than 1", sum),
            });
        }
        let mut table = Vec::new();
        let mut cumulative = 0.0;
        for (w, kind) in weights {
            if w > 0.0 {
                cumulative += w / sum;
                table.push((cumulative, kind));
            }
        }
        Ok(Self { table })
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> OperationKind {
        let u: f64 = rng.random();
        for (cumulative, kind) in self.table.iter() {
            if u < *cumulative {
                return *kind;
            }
        }
        // u is just below 1 and the cumulative sum rounded below it
        self.table[self.table.len() - 1].1
    }

    /// Whether the kind can ever be chosen.
    pub fn contains(&self, kind: OperationKind) -> bool {
        self.table.iter().any(|(_, k)| *k == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    #[test]
    fn chooser_follows_weights() {
        let mut rng = rand::rng();
        let c = OperationChooser::new(0.9, 0.0, 0.1, 0.0, 0.0).unwrap();
        let mut counts: HashMap<OperationKind, usize> = HashMap::new();
        for _ in 0..100000 {
            *counts.entry(c.choose(&mut rng)).or_default() += 1;
        }
        let reads = *counts.get(&OperationKind::Read).unwrap_or(&0) as f64 / 100000.0;
        assert!((reads - 0.9).abs() < 0.01, "read share {}", reads);
        assert_eq!(counts.len(), 2);
        assert!(!c.contains(OperationKind::Scan));
    }

    #[test]
    fn chooser_normalizes_partial_sums() {
        let mut rng = rand::rng();
        let c = OperationChooser::new(0.0, 0.0, 0.0, 0.0, 0.5).unwrap();
        for _ in 0..1000 {
            assert_eq!(c.choose(&mut rng), OperationKind::ReadModifyWrite);
        }
    }

    #[test]
    fn chooser_rejects_bad_weights() {
        assert!(matches!(
            OperationChooser::new(0.0, 0.0, 0.0, 0.0, 0.0),
            Err(Error::ZeroProportions)
        ));
        assert!(matches!(
            OperationChooser::new(0.9, 0.9, 0.0, 0.0, 0.0),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            OperationChooser::new(-0.1, 0.5, 0.0, 0.0, 0.0),
            Err(Error::InvalidOption { .. })
        ));
        assert!(OperationChooser::new(0.95, 0.05, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn labels() {
        assert_eq!(OperationKind::ReadModifyWrite.label(), "READ-MODIFY-WRITE");
        assert_eq!(OperationKind::Read.to_string(), "READ");
    }
}
