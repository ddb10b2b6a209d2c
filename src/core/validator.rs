//! Cross-class clamping for paired `{lower, upper}` classes.
//!
//! A request on the upper member is raised to at least the lower member's
//! current target, and a request on the lower member is capped at the upper
//! member's current target. The caller is not told about the adjustment.

use crate::core::{ClassId, ClassRegistry, PairSpec, QosError, Requirement};

/// Role of a class inside a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRole {
    /// Floor of the window.
    Lower,
    /// Ceiling of the window.
    Upper,
}

/// Result of validating one incoming requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampDecision {
    /// Value to store in the ledger.
    pub applied: Requirement,
    /// Partner target the value was clamped to, if it was adjusted.
    pub bound: Option<(ClassId, i32)>,
}

/// Pair table indexed by class.
#[derive(Debug, Clone)]
pub struct CrossClassValidator {
    partners: Vec<Option<(PairRole, ClassId)>>,
}

impl CrossClassValidator {
    /// Resolve pair declarations against the registry.
    pub fn new(registry: &ClassRegistry, pairs: &[PairSpec]) -> Result<Self, QosError> {
        let mut partners = vec![None; registry.len()];
        for pair in pairs {
            let lower = registry.index_of(&pair.lower)?;
            let upper = registry.index_of(&pair.upper)?;
            if lower == upper {
                return Err(QosError::InvalidConfig(format!(
                    "class `{}` cannot be paired with itself",
                    pair.lower
                )));
            }
            for id in [lower, upper] {
                if partners[id.index()].is_some() {
                    return Err(QosError::InvalidConfig(format!(
                        "class {id} belongs to more than one pair"
                    )));
                }
            }
            partners[lower.index()] = Some((PairRole::Lower, upper));
            partners[upper.index()] = Some((PairRole::Upper, lower));
        }
        Ok(Self { partners })
    }

    /// Role and partner of a class, if it is paired.
    pub fn partner(&self, class: ClassId) -> Option<(PairRole, ClassId)> {
        self.partners.get(class.index()).copied().flatten()
    }

    /// Clamp a requirement against the partner's current target.
    ///
    /// `target_of` reads a class target; the engine passes its lock-free read.
    pub fn clamp(
        &self,
        class: ClassId,
        requirement: Requirement,
        target_of: impl Fn(ClassId) -> i32,
    ) -> ClampDecision {
        let unchanged = ClampDecision {
            applied: requirement,
            bound: None,
        };
        let (Requirement::Value(value), Some((role, partner))) = (requirement, self.partner(class))
        else {
            return unchanged;
        };
        let bound = target_of(partner);
        let out_of_window = match role {
            PairRole::Upper => value < bound,
            PairRole::Lower => value > bound,
        };
        if out_of_window {
            ClampDecision {
                applied: Requirement::Value(bound),
                bound: Some((partner, bound)),
            }
        } else {
            unchanged
        }
    }
}
