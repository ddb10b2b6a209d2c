//! Class registry: the fixed catalogue of resource classes.
//!
//! Classes are defined once at startup and never change afterwards, so the
//! registry is shared read-only by every other component. Lookups by
//! [`ClassId`] are O(1) indexes into a dense table.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::QosError;

/// Dense index of a class inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(usize);

impl ClassId {
    /// Build an id from a raw index. Ids are validated on use.
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Raw index into the class table.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the live requests of a class fold into one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationRule {
    /// The smallest request wins (latency ceilings).
    Min,
    /// The largest request wins (throughput floors).
    Max,
}

/// Definition of a single class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Unique, stable class name.
    pub name: String,
    /// Aggregation rule.
    pub rule: AggregationRule,
    /// Target used when no concrete request exists.
    pub default_value: i32,
}

impl ClassSpec {
    /// Create a class definition.
    pub fn new(name: impl Into<String>, rule: AggregationRule, default_value: i32) -> Self {
        Self {
            name: name.into(),
            rule,
            default_value,
        }
    }
}

/// Declares two classes as a `{lower, upper}` window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSpec {
    /// Class whose target acts as the floor.
    pub lower: String,
    /// Class whose target acts as the ceiling.
    pub upper: String,
}

impl PairSpec {
    /// Create a pair declaration from class names.
    pub fn new(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.into(),
        }
    }
}

/// Immutable class table with name lookup.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    specs: Vec<ClassSpec>,
    by_name: HashMap<String, ClassId>,
}

impl ClassRegistry {
    /// Build the registry, rejecting empty or duplicate names.
    pub fn new(specs: Vec<ClassSpec>) -> Result<Self, QosError> {
        if specs.is_empty() {
            return Err(QosError::InvalidConfig("at least one class must be defined".into()));
        }
        let mut by_name = HashMap::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(QosError::InvalidConfig(format!("class {index} has an empty name")));
            }
            if by_name.insert(spec.name.clone(), ClassId(index)).is_some() {
                return Err(QosError::InvalidConfig(format!(
                    "class `{}` defined twice",
                    spec.name
                )));
            }
        }
        Ok(Self { specs, by_name })
    }

    /// Resolve a class name to its index.
    pub fn index_of(&self, name: &str) -> Result<ClassId, QosError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| QosError::UnknownClass(name.to_string()))
    }

    /// Look up a class definition.
    pub fn get(&self, id: ClassId) -> Result<&ClassSpec, QosError> {
        self.specs
            .get(id.0)
            .ok_or_else(|| QosError::UnknownClass(id.to_string()))
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when no class is defined. Never true for a built registry.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterate classes in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ClassSpec)> {
        self.specs.iter().enumerate().map(|(i, spec)| (ClassId(i), spec))
    }
}
