//! Core aggregation engine: registry, ledger, aggregator, dispatch and handles.

pub mod aggregator;
pub mod class;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod validator;

pub use aggregator::{Aggregator, Recompute};
pub use class::{AggregationRule, ClassId, ClassRegistry, ClassSpec, PairSpec};
pub use engine::{ClassSnapshot, HandleState, QosEngine, RequestHandle};
pub use error::{AppResult, QosError};
pub use ledger::{RequestId, RequestLedger, Requirement, NO_PREFERENCE_RAW};
#[cfg(not(target_arch = "wasm32"))]
pub use notify::ChannelObserver;
pub use notify::{DispatchReport, ObserverChain, ObserverId, TargetChange, TargetObserver};
pub use validator::{ClampDecision, CrossClassValidator, PairRole};
