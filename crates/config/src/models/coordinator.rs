use scheduler_domain::TransitionTable;
use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

pub const DISPATCH_POLICIES: [&str; 3] = ["fifo", "priority", "scored"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// `fifo`, `priority` or `scored`. Strategies that need a specific policy
    /// (the heuristic one) override this.
    pub dispatch_policy: String,
    /// How many times a queued request may be overtaken by younger ones
    /// before it is served regardless of priority or score.
    pub starvation_limit: u32,
    /// Replaces the built-in lifecycle table when set.
    pub transition_table: Option<TransitionTable>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            dispatch_policy: "fifo".to_string(),
            starvation_limit: 32,
            transition_table: None,
        }
    }
}

impl ConfigValidator for CoordinatorConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_one_of(
            &self.dispatch_policy,
            "coordinator.dispatch_policy",
            &DISPATCH_POLICIES,
        )?;
        if self.starvation_limit == 0 {
            return Err(crate::ConfigError::Validation(
                "coordinator.starvation_limit must be greater than 0".to_string(),
            ));
        }
        // The table itself is checked when a strategy starts, so that a bad
        // table fails only the runs that use it.
        Ok(())
    }
}
