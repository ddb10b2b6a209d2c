//! Per-class request ledger with O(log n) extremum lookup.
//!
//! Requests are tracked twice: by identity, so a request can be found and
//! replaced, and in a value-ordered multiset, so the minimum and maximum are
//! the first and last keys of a `BTreeMap`. "No preference" requests occupy
//! an identity slot but never enter the ordered multiset.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::AggregationRule;

/// Raw wire encoding of [`Requirement::NoPreference`].
pub const NO_PREFERENCE_RAW: i32 = -1;

/// Unique identity of a request within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Build an id from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Value a request contributes to its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Placeholder that keeps the slot but contributes nothing.
    NoPreference,
    /// A concrete requirement.
    Value(i32),
}

impl Requirement {
    /// Decode the raw wire form, where `-1` means no preference.
    pub const fn from_raw(raw: i32) -> Self {
        if raw == NO_PREFERENCE_RAW {
            Self::NoPreference
        } else {
            Self::Value(raw)
        }
    }

    /// Concrete value, if any.
    pub const fn value(self) -> Option<i32> {
        match self {
            Self::NoPreference => None,
            Self::Value(v) => Some(v),
        }
    }
}

impl From<i32> for Requirement {
    fn from(value: i32) -> Self {
        Self::Value(value)
    }
}

/// Live requests of one class.
#[derive(Debug, Clone)]
pub struct RequestLedger {
    rule: AggregationRule,
    default_value: i32,
    entries: HashMap<RequestId, Requirement>,
    /// value -> number of requests currently holding it
    ordered: BTreeMap<i32, usize>,
}

impl RequestLedger {
    /// Create an empty ledger for a class.
    pub fn new(rule: AggregationRule, default_value: i32) -> Self {
        Self {
            rule,
            default_value,
            entries: HashMap::new(),
            ordered: BTreeMap::new(),
        }
    }

    /// Add a request. Returns `false` and leaves the ledger untouched if the
    /// identity is already present.
    pub fn insert(&mut self, id: RequestId, requirement: Requirement) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, requirement);
        self.add_value(requirement);
        true
    }

    /// Replace the value of an existing request in a single step.
    ///
    /// Returns `false` if the identity is absent; nothing is inserted then.
    pub fn update(&mut self, id: RequestId, requirement: Requirement) -> bool {
        let Some(slot) = self.entries.get_mut(&id) else {
            return false;
        };
        let previous = std::mem::replace(slot, requirement);
        self.drop_value(previous);
        self.add_value(requirement);
        true
    }

    /// Remove a request, returning its last value. Absent ids are a no-op.
    pub fn remove(&mut self, id: RequestId) -> Option<Requirement> {
        let previous = self.entries.remove(&id)?;
        self.drop_value(previous);
        Some(previous)
    }

    /// Current value of a request.
    pub fn get(&self, id: RequestId) -> Option<Requirement> {
        self.entries.get(&id).copied()
    }

    /// Extremal concrete value under the class rule, or the class default.
    pub fn extremum(&self) -> i32 {
        let extremal = match self.rule {
            AggregationRule::Min => self.ordered.first_key_value(),
            AggregationRule::Max => self.ordered.last_key_value(),
        };
        extremal.map_or(self.default_value, |(value, _)| *value)
    }

    /// Number of requests, placeholders included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no request is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of requests with a concrete value.
    pub fn concrete_len(&self) -> usize {
        self.ordered.values().sum()
    }

    fn add_value(&mut self, requirement: Requirement) {
        if let Requirement::Value(v) = requirement {
            *self.ordered.entry(v).or_insert(0) += 1;
        }
    }

    fn drop_value(&mut self, requirement: Requirement) {
        let Requirement::Value(v) = requirement else {
            return;
        };
        if let Some(count) = self.ordered.get_mut(&v) {
            *count -= 1;
            if *count == 0 {
                self.ordered.remove(&v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> RequestId {
        RequestId::new(n)
    }

    #[test]
    fn test_empty_ledger_uses_default() {
        let ledger = RequestLedger::new(AggregationRule::Min, 2_000_000);
        assert_eq!(ledger.extremum(), 2_000_000);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_min_and_max_extremum() {
        let mut min = RequestLedger::new(AggregationRule::Min, 100);
        let mut max = RequestLedger::new(AggregationRule::Max, 0);
        for (n, v) in [(1, 40), (2, 10), (3, 70)] {
            min.insert(id(n), Requirement::Value(v));
            max.insert(id(n), Requirement::Value(v));
        }
        assert_eq!(min.extremum(), 10);
        assert_eq!(max.extremum(), 70);
    }

    #[test]
    fn test_placeholder_occupies_slot_only() {
        let mut ledger = RequestLedger::new(AggregationRule::Min, 500);
        assert!(ledger.insert(id(1), Requirement::NoPreference));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.concrete_len(), 0);
        assert_eq!(ledger.extremum(), 500);

        // a concrete value above the default still wins over the placeholder
        ledger.insert(id(2), Requirement::Value(900));
        assert_eq!(ledger.extremum(), 900);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut ledger = RequestLedger::new(AggregationRule::Max, 0);
        assert!(ledger.insert(id(1), Requirement::Value(5)));
        assert!(!ledger.insert(id(1), Requirement::Value(50)));
        assert_eq!(ledger.extremum(), 5);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_update_replaces_single_entry() {
        let mut ledger = RequestLedger::new(AggregationRule::Max, 0);
        ledger.insert(id(1), Requirement::NoPreference);
        assert!(ledger.update(id(1), Requirement::Value(10)));
        assert!(ledger.update(id(1), Requirement::Value(3)));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.concrete_len(), 1);
        assert_eq!(ledger.get(id(1)), Some(Requirement::Value(3)));
        assert_eq!(ledger.extremum(), 3);
    }

    #[test]
    fn test_update_absent_is_rejected() {
        let mut ledger = RequestLedger::new(AggregationRule::Max, 0);
        assert!(!ledger.update(id(9), Requirement::Value(1)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_duplicate_values_counted() {
        let mut ledger = RequestLedger::new(AggregationRule::Min, 100);
        ledger.insert(id(1), Requirement::Value(7));
        ledger.insert(id(2), Requirement::Value(7));
        ledger.remove(id(1));
        assert_eq!(ledger.extremum(), 7);
        ledger.remove(id(2));
        assert_eq!(ledger.extremum(), 100);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut ledger = RequestLedger::new(AggregationRule::Min, 100);
        ledger.insert(id(1), Requirement::Value(5));
        assert_eq!(ledger.remove(id(1)), Some(Requirement::Value(5)));
        assert_eq!(ledger.remove(id(1)), None);
        assert_eq!(ledger.extremum(), 100);
    }

    #[test]
    fn test_requirement_from_raw() {
        assert_eq!(Requirement::from_raw(-1), Requirement::NoPreference);
        assert_eq!(Requirement::from_raw(42), Requirement::Value(42));
        assert_eq!(Requirement::from(7).value(), Some(7));
    }
}
