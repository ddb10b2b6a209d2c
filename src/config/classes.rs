//! Engine configuration structures.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::{ClassSpec, PairSpec};

/// Environment variable naming a JSON class catalogue to load.
pub const CLASSES_FILE_ENV: &str = "QOS_CLASSES_FILE";

/// Root engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Classes in index order.
    pub classes: Vec<ClassSpec>,
    /// `{lower, upper}` pairs subject to cross-class clamping.
    #[serde(default)]
    pub pairs: Vec<PairSpec>,
}

impl EngineConfig {
    /// Validate class names and pair declarations.
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("at least one class must be defined".into());
        }
        let mut names = HashSet::with_capacity(self.classes.len());
        for class in &self.classes {
            if class.name.is_empty() {
                return Err("class name must not be empty".into());
            }
            if !names.insert(class.name.as_str()) {
                return Err(format!("class `{}` defined twice", class.name));
            }
        }

        let mut paired = HashSet::new();
        for pair in &self.pairs {
            for member in [&pair.lower, &pair.upper] {
                if !names.contains(member.as_str()) {
                    return Err(format!("pair member `{member}` is not a defined class"));
                }
                if !paired.insert(member.as_str()) {
                    return Err(format!("class `{member}` belongs to more than one pair"));
                }
            }
            if pair.lower == pair.upper {
                return Err(format!("class `{}` cannot be paired with itself", pair.lower));
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment.
    ///
    /// Reads `.env` if present. When `QOS_CLASSES_FILE` is set its JSON
    /// content is used, otherwise the built-in platform catalogue.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        match std::env::var(CLASSES_FILE_ENV) {
            Ok(path) => {
                let input = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read `{path}`: {e}"))?;
                Self::from_json_str(&input)
            }
            Err(_) => Ok(Self::platform_default()),
        }
    }
}
