//! Builders to construct engines from configuration.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::{AggregationRule, ClassSpec, PairSpec, QosEngine, QosError, TargetObserver};

/// Build an engine from a validated configuration.
pub fn build_engine(cfg: &EngineConfig) -> Result<QosEngine, QosError> {
    cfg.validate().map_err(QosError::InvalidConfig)?;
    let engine = QosEngine::new();
    engine.define_classes_with_pairs(cfg.classes.clone(), &cfg.pairs)?;
    Ok(engine)
}

/// Fluent builder for engines assembled in code.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    observers: Vec<(String, Arc<dyn TargetObserver>)>,
}

impl EngineBuilder {
    /// Start with no classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    /// Add a class.
    #[must_use]
    pub fn class(mut self, name: impl Into<String>, rule: AggregationRule, default_value: i32) -> Self {
        self.config.classes.push(ClassSpec::new(name, rule, default_value));
        self
    }

    /// Declare a `{lower, upper}` pair.
    #[must_use]
    pub fn pair(mut self, lower: impl Into<String>, upper: impl Into<String>) -> Self {
        self.config.pairs.push(PairSpec::new(lower, upper));
        self
    }

    /// Register an observer on a class once the engine is built.
    #[must_use]
    pub fn observer(mut self, class: impl Into<String>, observer: Arc<dyn TargetObserver>) -> Self {
        self.observers.push((class.into(), observer));
        self
    }

    /// Configuration accumulated so far.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate, define classes and attach observers.
    pub fn build(self) -> Result<QosEngine, QosError> {
        let engine = build_engine(&self.config)?;
        for (class, observer) in self.observers {
            let id = engine.class_index_by_name(&class)?;
            engine.register_observer(id, observer)?;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defines_classes() {
        let engine = EngineBuilder::new()
            .class("lat", AggregationRule::Min, 2_000_000)
            .class("thr", AggregationRule::Max, 0)
            .build()
            .unwrap();
        assert_eq!(engine.current_target_by_name("lat").unwrap(), 2_000_000);
        assert_eq!(engine.classes().unwrap().len(), 2);
    }

    #[test]
    fn test_builder_rejects_empty() {
        assert!(matches!(
            EngineBuilder::new().build(),
            Err(QosError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builder_observer_on_unknown_class() {
        let result = EngineBuilder::new()
            .class("lat", AggregationRule::Min, 0)
            .observer("nope", Arc::new(|_: &crate::core::TargetChange| -> crate::core::AppResult<()> { Ok(()) }))
            .build();
        assert!(matches!(result, Err(QosError::UnknownClass(_))));
    }
}
