//! The aggregation engine and its session/handle layer.
//!
//! Each class owns its own lock, ledger, cached target and observer chain.
//! A mutation (ledger change, recompute, notification) runs as one critical
//! section under that class's lock, so independent classes never contend.
//! Target reads are lock-free.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::notify::dispatch;
use crate::core::{
    AggregationRule, Aggregator, ClassId, ClassRegistry, ClassSpec, CrossClassValidator,
    ObserverChain, ObserverId, PairSpec, QosError, Recompute, RequestId, RequestLedger,
    Requirement, TargetChange, TargetObserver,
};

/// Per-class activity counters.
#[derive(Debug, Default)]
struct ClassCounters {
    updates: AtomicU64,
    notifications: AtomicU64,
    clamps: AtomicU64,
    observer_failures: AtomicU64,
}

/// Mutable state of one class, guarded by the class lock.
struct ClassSlot {
    spec: ClassSpec,
    ledger: Mutex<RequestLedger>,
    aggregator: Aggregator,
    observers: RwLock<ObserverChain>,
    counters: ClassCounters,
    /// Ledger sizes published after every mutation, readable without the lock.
    requests: AtomicUsize,
    concrete_requests: AtomicUsize,
}

impl ClassSlot {
    fn new(spec: ClassSpec) -> Self {
        Self {
            ledger: Mutex::new(RequestLedger::new(spec.rule, spec.default_value)),
            aggregator: Aggregator::new(spec.default_value),
            observers: RwLock::new(ObserverChain::new()),
            counters: ClassCounters::default(),
            requests: AtomicUsize::new(0),
            concrete_requests: AtomicUsize::new(0),
            spec,
        }
    }

    fn publish_counts(&self, ledger: &RequestLedger) {
        self.requests.store(ledger.len(), Ordering::Release);
        self.concrete_requests
            .store(ledger.concrete_len(), Ordering::Release);
    }
}

/// Ledger lock of a class, plus its partner's when the class is paired.
struct ClassGuard<'a> {
    ledger: MutexGuard<'a, RequestLedger>,
    _partner: Option<MutexGuard<'a, RequestLedger>>,
}

/// Everything fixed by `define_classes`.
struct ClassTable {
    registry: ClassRegistry,
    validator: CrossClassValidator,
    slots: Vec<ClassSlot>,
}

impl ClassTable {
    fn slot(&self, class: ClassId) -> Result<&ClassSlot, QosError> {
        self.slots
            .get(class.index())
            .ok_or_else(|| QosError::UnknownClass(class.to_string()))
    }

    /// Lock a class ledger. Paired classes lock both members, lower index
    /// first, so a clamp always sees a partner target that cannot move.
    fn lock(&self, class: ClassId) -> Result<(&ClassSlot, ClassGuard<'_>), QosError> {
        let slot = self.slot(class)?;
        let partner = self
            .validator
            .partner(class)
            .and_then(|(_, id)| self.slots.get(id.index()).map(|s| (id, s)));
        let guard = match partner {
            Some((id, other)) if id.index() < class.index() => {
                let partner = other.ledger.lock();
                ClassGuard {
                    ledger: slot.ledger.lock(),
                    _partner: Some(partner),
                }
            }
            Some((_, other)) => {
                let ledger = slot.ledger.lock();
                ClassGuard {
                    ledger,
                    _partner: Some(other.ledger.lock()),
                }
            }
            None => ClassGuard {
                ledger: slot.ledger.lock(),
                _partner: None,
            },
        };
        Ok((slot, guard))
    }
}

struct EngineInner {
    table: OnceLock<ClassTable>,
    next_request: AtomicU64,
    next_observer: AtomicU64,
}

/// Point-in-time view of one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSnapshot {
    /// Class index.
    pub id: ClassId,
    /// Class name.
    pub name: String,
    /// Aggregation rule.
    pub rule: AggregationRule,
    /// Default target.
    pub default_value: i32,
    /// Current target.
    pub target: i32,
    /// Open requests, placeholders included.
    pub requests: usize,
    /// Open requests with a concrete value.
    pub concrete_requests: usize,
    /// Registered observers.
    pub observers: usize,
    /// Ledger mutations applied.
    pub updates: u64,
    /// Target changes dispatched.
    pub notifications: u64,
    /// Requests adjusted by the cross-class validator.
    pub clamps: u64,
    /// Observer invocations that failed or panicked.
    pub observer_failures: u64,
}

/// Shared handle to the aggregation engine.
///
/// Cloning is cheap; all clones refer to the same classes and ledgers.
///
/// ```
/// use prometheus_qos::core::{AggregationRule, ClassSpec, QosEngine};
///
/// let engine = QosEngine::new();
/// engine
///     .define_classes(vec![ClassSpec::new("lat", AggregationRule::Min, 2_000_000)])
///     .unwrap();
/// let lat = engine.class_index_by_name("lat").unwrap();
///
/// let mut handle = engine.open(lat).unwrap();
/// handle.update(100).unwrap();
/// assert_eq!(engine.current_target(lat).unwrap(), 100);
///
/// handle.close();
/// assert_eq!(engine.current_target(lat).unwrap(), 2_000_000);
/// ```
#[derive(Clone)]
pub struct QosEngine {
    inner: Arc<EngineInner>,
}

impl Default for QosEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QosEngine {
    /// Create an engine with no classes. Every operation except
    /// [`QosEngine::define_classes`] fails with `NotInitialized` until classes are loaded.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                table: OnceLock::new(),
                next_request: AtomicU64::new(1),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    /// Load the class catalogue without pairs.
    pub fn define_classes(&self, classes: Vec<ClassSpec>) -> Result<(), QosError> {
        self.define_classes_with_pairs(classes, &[])
    }

    /// Load the class catalogue and the `{lower, upper}` pair declarations.
    /// May succeed only once per engine.
    pub fn define_classes_with_pairs(
        &self,
        classes: Vec<ClassSpec>,
        pairs: &[PairSpec],
    ) -> Result<(), QosError> {
        if self.inner.table.get().is_some() {
            return Err(QosError::AlreadyInitialized);
        }
        let registry = ClassRegistry::new(classes)?;
        let validator = CrossClassValidator::new(&registry, pairs)?;
        let slots = registry
            .iter()
            .map(|(_, spec)| ClassSlot::new(spec.clone()))
            .collect();
        let count = registry.len();
        self.inner
            .table
            .set(ClassTable {
                registry,
                validator,
                slots,
            })
            .map_err(|_| QosError::AlreadyInitialized)?;
        info!("defined {} qos classes ({} pairs)", count, pairs.len());
        Ok(())
    }

    /// Whether classes have been loaded.
    pub fn is_initialized(&self) -> bool {
        self.inner.table.get().is_some()
    }

    fn table(&self) -> Result<&ClassTable, QosError> {
        self.inner.table.get().ok_or(QosError::NotInitialized)
    }

    /// Resolve a class name.
    pub fn class_index_by_name(&self, name: &str) -> Result<ClassId, QosError> {
        self.table()?.registry.index_of(name)
    }

    /// Definition of a class.
    pub fn class(&self, class: ClassId) -> Result<ClassSpec, QosError> {
        Ok(self.table()?.slot(class)?.spec.clone())
    }

    /// All classes in index order.
    pub fn classes(&self) -> Result<Vec<(ClassId, ClassSpec)>, QosError> {
        Ok(self
            .table()?
            .registry
            .iter()
            .map(|(id, spec)| (id, spec.clone()))
            .collect())
    }

    /// Lock-free read of the cached target.
    pub fn current_target(&self, class: ClassId) -> Result<i32, QosError> {
        Ok(self.table()?.slot(class)?.aggregator.current())
    }

    /// Cached target looked up by class name.
    pub fn current_target_by_name(&self, name: &str) -> Result<i32, QosError> {
        let class = self.class_index_by_name(name)?;
        self.current_target(class)
    }

    /// Open a request with no preference.
    pub fn open(&self, class: ClassId) -> Result<RequestHandle, QosError> {
        self.add_request(class, Requirement::NoPreference)
    }

    /// Open a request on a class looked up by name.
    pub fn open_by_name(&self, name: &str) -> Result<RequestHandle, QosError> {
        let class = self.class_index_by_name(name)?;
        self.open(class)
    }

    /// Open a request with an initial requirement.
    pub fn add_request(
        &self,
        class: ClassId,
        requirement: Requirement,
    ) -> Result<RequestHandle, QosError> {
        let table = self.table()?;
        let id = RequestId::new(self.inner.next_request.fetch_add(1, Ordering::Relaxed));

        let (slot, mut guard) = table.lock(class)?;
        let requirement = Self::clamp(table, slot, class, requirement);
        guard.ledger.insert(id, requirement);
        slot.publish_counts(&guard.ledger);
        slot.counters.updates.fetch_add(1, Ordering::Relaxed);
        let outcome = slot.aggregator.recompute(&guard.ledger);
        debug!("opened {} on `{}` with {:?}", id, slot.spec.name, requirement);
        Self::notify(slot, class, outcome);
        drop(guard);

        Ok(RequestHandle {
            engine: self.clone(),
            class,
            id,
            state: HandleState::Open,
        })
    }

    /// Replace the value of an open request.
    fn update_request(
        &self,
        class: ClassId,
        id: RequestId,
        requirement: Requirement,
    ) -> Result<Recompute, QosError> {
        let table = self.table()?;
        let (slot, mut guard) = table.lock(class)?;
        let current = guard.ledger.get(id).ok_or(QosError::InvalidHandle)?;
        let requirement = Self::clamp(table, slot, class, requirement);
        if current == requirement {
            return Ok(Recompute::unchanged(slot.aggregator.current()));
        }
        guard.ledger.update(id, requirement);
        slot.publish_counts(&guard.ledger);
        slot.counters.updates.fetch_add(1, Ordering::Relaxed);
        let outcome = slot.aggregator.recompute(&guard.ledger);
        debug!("updated {} on `{}` to {:?}", id, slot.spec.name, requirement);
        Self::notify(slot, class, outcome);
        Ok(outcome)
    }

    /// Retract a request. Absent requests are ignored.
    fn close_request(&self, class: ClassId, id: RequestId) -> Recompute {
        let Ok((slot, mut guard)) = self.table().and_then(|t| t.lock(class)) else {
            return Recompute::unchanged(0);
        };
        if guard.ledger.remove(id).is_none() {
            return Recompute::unchanged(slot.aggregator.current());
        }
        slot.publish_counts(&guard.ledger);
        slot.counters.updates.fetch_add(1, Ordering::Relaxed);
        let outcome = slot.aggregator.recompute(&guard.ledger);
        debug!("closed {} on `{}`", id, slot.spec.name);
        Self::notify(slot, class, outcome);
        outcome
    }

    fn clamp(
        table: &ClassTable,
        slot: &ClassSlot,
        class: ClassId,
        requirement: Requirement,
    ) -> Requirement {
        let decision = table.validator.clamp(class, requirement, |partner| {
            table
                .slots
                .get(partner.index())
                .map_or(0, |s| s.aggregator.current())
        });
        if let Some((partner, bound)) = decision.bound {
            slot.counters.clamps.fetch_add(1, Ordering::Relaxed);
            let partner_name = table
                .registry
                .get(partner)
                .map_or("?", |spec| spec.name.as_str());
            warn!(
                "request {:?} on `{}` crosses `{}` target {}, clamped",
                requirement, slot.spec.name, partner_name, bound
            );
        }
        decision.applied
    }

    /// Dispatch a change while the class lock is still held.
    fn notify(slot: &ClassSlot, class: ClassId, outcome: Recompute) {
        if !outcome.changed {
            return;
        }
        debug!(
            "target of `{}` moved {} -> {}",
            slot.spec.name, outcome.old_target, outcome.new_target
        );
        let observers = slot.observers.read().snapshot();
        slot.counters.notifications.fetch_add(1, Ordering::Relaxed);
        if observers.is_empty() {
            return;
        }
        let change = TargetChange {
            class,
            class_name: slot.spec.name.clone(),
            previous: outcome.old_target,
            target: outcome.new_target,
        };
        let report = dispatch(&observers, &change);
        if report.failed > 0 {
            slot.counters
                .observer_failures
                .fetch_add(report.failed as u64, Ordering::Relaxed);
        }
    }

    /// Append an observer to a class chain.
    pub fn register_observer(
        &self,
        class: ClassId,
        observer: Arc<dyn TargetObserver>,
    ) -> Result<ObserverId, QosError> {
        let slot = self.table()?.slot(class)?;
        let id = ObserverId::new(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        slot.observers.write().register(id, observer);
        debug!("registered observer {} on `{}`", id, slot.spec.name);
        Ok(id)
    }

    /// Remove an observer. Returns `false` if it was not registered on the class.
    pub fn unregister_observer(&self, class: ClassId, id: ObserverId) -> Result<bool, QosError> {
        let slot = self.table()?.slot(class)?;
        let removed = slot.observers.write().unregister(id);
        if removed {
            debug!("unregistered observer {} from `{}`", id, slot.spec.name);
        }
        Ok(removed)
    }

    /// Number of open requests on a class. Does not take the class lock.
    pub fn request_count(&self, class: ClassId) -> Result<usize, QosError> {
        Ok(self.table()?.slot(class)?.requests.load(Ordering::Acquire))
    }

    /// Snapshot of every class.
    pub fn snapshot(&self) -> Result<Vec<ClassSnapshot>, QosError> {
        let table = self.table()?;
        Ok(table
            .registry
            .iter()
            .zip(&table.slots)
            .map(|((id, spec), slot)| ClassSnapshot {
                id,
                name: spec.name.clone(),
                rule: spec.rule,
                default_value: spec.default_value,
                target: slot.aggregator.current(),
                requests: slot.requests.load(Ordering::Acquire),
                concrete_requests: slot.concrete_requests.load(Ordering::Acquire),
                observers: slot.observers.read().len(),
                updates: slot.counters.updates.load(Ordering::Relaxed),
                notifications: slot.counters.notifications.load(Ordering::Relaxed),
                clamps: slot.counters.clamps.load(Ordering::Relaxed),
                observer_failures: slot.counters.observer_failures.load(Ordering::Relaxed),
            })
            .collect())
    }
}

/// Lifecycle of a request handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Contributing to its class ledger.
    Open,
    /// Retracted; terminal.
    Closed,
}

/// Caller-owned token for exactly one request.
///
/// Dropping the handle closes the request, so a request never outlives the
/// code that owns it.
pub struct RequestHandle {
    engine: QosEngine,
    class: ClassId,
    id: RequestId,
    state: HandleState,
}

impl RequestHandle {
    /// Class the request belongs to.
    pub const fn class(&self) -> ClassId {
        self.class
    }

    /// Request identity.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> HandleState {
        self.state
    }

    /// Whether the request is still present in its ledger.
    ///
    /// Only the owning handle can retract its request, so this reads the
    /// handle state and never takes the class lock.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, HandleState::Open)
    }

    /// Engine the handle was opened on.
    pub const fn engine(&self) -> &QosEngine {
        &self.engine
    }

    /// Replace the requested value. Fails with `InvalidHandle` once closed.
    pub fn update(&mut self, requirement: impl Into<Requirement>) -> Result<Recompute, QosError> {
        if self.state == HandleState::Closed {
            return Err(QosError::InvalidHandle);
        }
        self.engine
            .update_request(self.class, self.id, requirement.into())
    }

    /// Retract the request. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == HandleState::Closed {
            return;
        }
        self.state = HandleState::Closed;
        self.engine.close_request(self.class, self.id);
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("class", &self.class)
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
