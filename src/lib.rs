//! # Prometheus QoS
//!
//! A system-wide constraint aggregation engine for power and performance
//! governors.
//!
//! Many independent callers each register a numeric requirement ("latency at
//! most X", "throughput at least Y") against a small set of named resource
//! classes. For every class the engine continuously maintains the single
//! target that satisfies all live requirements at once: the minimum for
//! ceiling classes, the maximum for floor classes, or the class default when
//! nobody has expressed a preference. Governors, frequency scalers and
//! admission controllers read that target, or observe its changes, to decide
//! how hard to throttle or boost a resource.
//!
//! ## Key Features
//!
//! - **Per-class locking**: mutations on independent classes never contend
//! - **Lock-free reads**: targets are published through atomics
//! - **O(log n) aggregation**: value-ordered ledgers keep the extremum cheap
//! - **Isolated observers**: a failing or panicking observer never blocks others
//! - **Paired windows**: `{lower, upper}` classes can never invert
//! - **Scoped handles**: dropping a handle retracts its request
//!
//! ## Usage
//!
//! ```rust
//! use prometheus_qos::builders::EngineBuilder;
//! use prometheus_qos::core::AggregationRule;
//!
//! let engine = EngineBuilder::new()
//!     .class("lat", AggregationRule::Min, 2_000_000)
//!     .class("thr", AggregationRule::Max, 0)
//!     .build()?;
//!
//! let lat = engine.class_index_by_name("lat")?;
//! let mut a = engine.open(lat)?;
//! let mut b = engine.open(lat)?;
//! a.update(100)?;
//! b.update(50)?;
//! assert_eq!(engine.current_target(lat)?, 50);
//!
//! a.close();
//! b.close();
//! assert_eq!(engine.current_target(lat)?, 2_000_000);
//! # Ok::<(), prometheus_qos::core::QosError>(())
//! ```
//!
//! For complete examples, see:
//! - `tests/engine_test.rs` - Session, observer and aggregation scenarios
//! - `tests/endpoint_test.rs` - Byte endpoint transport

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core aggregation engine.
pub mod core;
/// Configuration models for class catalogues.
pub mod config;
/// Builders to construct engines from configuration.
pub mod builders;
/// External transports (byte endpoints, async watches).
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    AggregationRule, ClassId, ClassSpec, PairSpec, QosEngine, QosError, RequestHandle,
    Requirement, TargetChange, TargetObserver,
};
