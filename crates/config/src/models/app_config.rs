use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    benchmark::BenchmarkConfig, coordinator::CoordinatorConfig,
    observability::ObservabilityConfig, strategies::StrategiesConfig,
};
use crate::validation::ConfigValidator;

const DEFAULT_PATHS: [&str; 3] = [
    "config/wafer-scheduler.toml",
    "wafer-scheduler.toml",
    "/etc/wafer-scheduler/config.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub coordinator: CoordinatorConfig,
    pub strategies: StrategiesConfig,
    pub benchmark: BenchmarkConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load from an explicit TOML file, or the first default path that exists,
    /// then apply `WAFER__SECTION__FIELD` environment overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("config file does not exist: {}", path));
            }
        } else if let Some(path) = DEFAULT_PATHS.iter().find(|p| Path::new(p).exists()) {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("WAFER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.coordinator.validate()?;
        self.strategies.validate()?;
        self.benchmark.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
