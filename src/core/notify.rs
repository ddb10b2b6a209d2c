//! Observer chains and synchronous change dispatch.
//!
//! Observers run on the mutating caller's path while the class lock is held
//! (and the partner's lock, for paired classes). Read APIs such as
//! `current_target`, `request_count` and `snapshot` never take a class lock
//! and are safe to call from an observer. Observers must return quickly and
//! must not open, update or close requests: the class locks are not
//! reentrant.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::core::{AppResult, ClassId};

/// Identity of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Build an id from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// A target change delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetChange {
    /// Class whose target moved.
    pub class: ClassId,
    /// Class name.
    pub class_name: String,
    /// Target before the change.
    pub previous: i32,
    /// Target after the change.
    pub target: i32,
}

/// Capability notified when a class target changes.
///
/// Called with the class lock held. Implementations may read targets, request
/// counts and snapshots, but must not mutate requests.
pub trait TargetObserver: Send + Sync {
    /// Handle a change. Errors are logged and do not stop dispatch.
    fn on_target_changed(&self, change: &TargetChange) -> AppResult<()>;
}

impl<F> TargetObserver for F
where
    F: Fn(&TargetChange) -> AppResult<()> + Send + Sync,
{
    fn on_target_changed(&self, change: &TargetChange) -> AppResult<()> {
        self(change)
    }
}

/// Registration-ordered list of observers for one class.
#[derive(Default)]
pub struct ObserverChain {
    entries: Vec<(ObserverId, Arc<dyn TargetObserver>)>,
}

impl ObserverChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer at the end of the chain.
    pub fn register(&mut self, id: ObserverId, observer: Arc<dyn TargetObserver>) {
        self.entries.push((id, observer));
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the chain so dispatch can run without holding the chain lock.
    pub fn snapshot(&self) -> Vec<(ObserverId, Arc<dyn TargetObserver>)> {
        self.entries.clone()
    }
}

/// Result of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Observers that returned `Ok`.
    pub delivered: usize,
    /// Observers that returned an error or panicked.
    pub failed: usize,
}

/// Invoke every observer in order. A failing observer is isolated.
pub fn dispatch(
    observers: &[(ObserverId, Arc<dyn TargetObserver>)],
    change: &TargetChange,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for (id, observer) in observers {
        match catch_unwind(AssertUnwindSafe(|| observer.on_target_changed(change))) {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(e)) => {
                report.failed += 1;
                error!(
                    "observer {} on class `{}` failed: {:#}",
                    id, change.class_name, e
                );
            }
            Err(_) => {
                report.failed += 1;
                error!("observer {} on class `{}` panicked", id, change.class_name);
            }
        }
    }
    report
}

/// Observer that forwards changes into a channel for consumers on other threads.
#[cfg(not(target_arch = "wasm32"))]
pub struct ChannelObserver {
    tx: crossbeam_channel::Sender<TargetChange>,
}

#[cfg(not(target_arch = "wasm32"))]
impl ChannelObserver {
    /// Create an observer and the receiving end of its unbounded channel.
    pub fn unbounded() -> (Self, crossbeam_channel::Receiver<TargetChange>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl TargetObserver for ChannelObserver {
    fn on_target_changed(&self, change: &TargetChange) -> AppResult<()> {
        self.tx
            .send(change.clone())
            .map_err(|_| anyhow::anyhow!("channel receiver dropped"))
    }
}
