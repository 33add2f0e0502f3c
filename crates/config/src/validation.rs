use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 86_400 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 86400"
            )));
        }
        Ok(())
    }

    pub fn validate_count(count: usize, field_name: &str, max: usize) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    pub fn validate_ratio(value: f64, field_name: &str) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be between 0.0 and 1.0"
            )));
        }
        Ok(())
    }

    pub fn validate_one_of(value: &str, field_name: &str, options: &[&str]) -> ConfigResult<()> {
        if !options.contains(&value) {
            return Err(crate::ConfigError::Validation(format!(
                "Invalid {field_name}: {value}. Valid options: {options:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_utils() {
        assert!(ValidationUtils::validate_not_empty("lock", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("  ", "field").is_err());

        assert!(ValidationUtils::validate_timeout_seconds(30, "t").is_ok());
        assert!(ValidationUtils::validate_timeout_seconds(0, "t").is_err());

        assert!(ValidationUtils::validate_count(3, "robots", 64).is_ok());
        assert!(ValidationUtils::validate_count(0, "robots", 64).is_err());
        assert!(ValidationUtils::validate_count(65, "robots", 64).is_err());

        assert!(ValidationUtils::validate_ratio(1.0, "r").is_ok());
        assert!(ValidationUtils::validate_ratio(1.5, "r").is_err());

        assert!(ValidationUtils::validate_one_of("fifo", "p", &["fifo", "priority"]).is_ok());
        assert!(ValidationUtils::validate_one_of("lifo", "p", &["fifo", "priority"]).is_err());
    }
}
