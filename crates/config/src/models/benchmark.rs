use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub robots: usize,
    pub carrier_groups: usize,
    pub items_per_group: usize,
    pub cycles: usize,
    /// Process stations items are carried to.
    pub stations: usize,
    /// Pause between two issued requests; 0 issues as fast as possible.
    pub request_interval_us: u64,
    /// Cap on requests issued but not yet completed; 0 means no cap.
    pub max_in_flight: usize,
    pub pickup_delay_us: u64,
    pub place_delay_us: u64,
    pub timeout_seconds: u64,
    /// Minimum completed/total ratio for a passing run.
    pub pass_threshold: f64,
    /// Distinct priority values assigned to requests; 0 leaves them unset.
    pub priority_levels: u8,
    pub seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            robots: 3,
            carrier_groups: 10,
            items_per_group: 25,
            cycles: 10,
            stations: 4,
            request_interval_us: 0,
            max_in_flight: 1024,
            pickup_delay_us: 0,
            place_delay_us: 0,
            timeout_seconds: 120,
            pass_threshold: 1.0,
            priority_levels: 0,
            seed: 42,
        }
    }
}

impl BenchmarkConfig {
    pub fn total_transfers(&self) -> usize {
        self.carrier_groups * self.items_per_group * self.cycles
    }
}

impl ConfigValidator for BenchmarkConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.robots, "benchmark.robots", 1024)?;
        ValidationUtils::validate_count(self.carrier_groups, "benchmark.carrier_groups", 10_000)?;
        ValidationUtils::validate_count(
            self.items_per_group,
            "benchmark.items_per_group",
            100_000,
        )?;
        ValidationUtils::validate_count(self.cycles, "benchmark.cycles", 1_000_000)?;
        ValidationUtils::validate_count(self.stations, "benchmark.stations", 1024)?;
        ValidationUtils::validate_timeout_seconds(self.timeout_seconds, "benchmark.timeout_seconds")?;
        ValidationUtils::validate_ratio(self.pass_threshold, "benchmark.pass_threshold")?;
        if self.pass_threshold == 0.0 {
            return Err(crate::ConfigError::Validation(
                "benchmark.pass_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
