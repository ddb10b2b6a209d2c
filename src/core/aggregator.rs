//! Cached aggregate target per class.

use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::RequestLedger;

/// Outcome of a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recompute {
    /// Target before the mutation.
    pub old_target: i32,
    /// Target after the mutation.
    pub new_target: i32,
    /// Whether the target moved.
    pub changed: bool,
}

impl Recompute {
    /// Outcome for a mutation that was skipped.
    pub const fn unchanged(target: i32) -> Self {
        Self {
            old_target: target,
            new_target: target,
            changed: false,
        }
    }
}

/// Holds the published target of one class.
///
/// The target lives in an `AtomicI32` so readers never take the class lock
/// and never observe a torn value. Writers must hold the class lock while
/// calling [`Aggregator::recompute`].
#[derive(Debug)]
pub struct Aggregator {
    target: AtomicI32,
}

impl Aggregator {
    /// Create an aggregator publishing `initial`.
    pub const fn new(initial: i32) -> Self {
        Self {
            target: AtomicI32::new(initial),
        }
    }

    /// Lock-free read of the published target.
    pub fn current(&self) -> i32 {
        self.target.load(Ordering::Acquire)
    }

    /// Fold the ledger and publish the result. Never fails.
    pub fn recompute(&self, ledger: &RequestLedger) -> Recompute {
        let new_target = ledger.extremum();
        let old_target = self.target.swap(new_target, Ordering::AcqRel);
        Recompute {
            old_target,
            new_target,
            changed: old_target != new_target,
        }
    }
}
