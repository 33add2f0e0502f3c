use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategiesConfig {
    /// Strategy codes run by the benchmark, in order.
    pub enabled: Vec<String>,
    /// Lock-polling loop period.
    pub polling_interval_ms: u64,
    pub heuristic: HeuristicConfig,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                "lock".to_string(),
                "actor".to_string(),
                "autonomous".to_string(),
                "pubsub-single".to_string(),
                "pubsub-dedicated".to_string(),
                "heuristic".to_string(),
                "batch".to_string(),
            ],
            polling_interval_ms: 1,
            heuristic: HeuristicConfig::default(),
        }
    }
}

impl ConfigValidator for StrategiesConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.enabled.is_empty() {
            return Err(crate::ConfigError::Validation(
                "strategies.enabled cannot be empty".to_string(),
            ));
        }
        for code in &self.enabled {
            ValidationUtils::validate_not_empty(code, "strategies.enabled")?;
        }
        if self.polling_interval_ms == 0 {
            return Err(crate::ConfigError::Validation(
                "strategies.polling_interval_ms must be greater than 0".to_string(),
            ));
        }
        self.heuristic.validate()
    }
}

pub const HEURISTIC_SCORERS: [&str; 2] = ["arrival", "pheromone"];

/// Weights for the pheromone scorer. The values are tuning knobs only; no
/// particular setting is part of the dispatch contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeuristicConfig {
    pub scorer: String,
    pub deposit: f64,
    pub evaporation: f64,
    pub age_weight: f64,
    /// Number of compatible queued requests the scorer looks at per dispatch.
    pub lookahead: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            scorer: "pheromone".to_string(),
            deposit: 1.0,
            evaporation: 0.05,
            age_weight: 1.0,
            lookahead: 64,
        }
    }
}

impl ConfigValidator for HeuristicConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_one_of(
            &self.scorer,
            "strategies.heuristic.scorer",
            &HEURISTIC_SCORERS,
        )?;
        ValidationUtils::validate_ratio(self.evaporation, "strategies.heuristic.evaporation")?;
        ValidationUtils::validate_count(
            self.lookahead,
            "strategies.heuristic.lookahead",
            100_000,
        )?;
        if self.deposit < 0.0 || self.age_weight < 0.0 {
            return Err(crate::ConfigError::Validation(
                "strategies.heuristic weights must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
