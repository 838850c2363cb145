//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RelayConfig, RoutingConfig, RuntimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RelayConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_routing_config(&config.routing)?;
    validate_runtime_config(&config.runtime)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output is 'file' but logging.file_path is not set",
        ));
    }

    #[cfg(not(feature = "json-log"))]
    if logging.format == super::schema::LogFormat::Json {
        return Err(ConfigError::validation(
            "logging.format 'json' requires the json-log feature",
        ));
    }

    for module in logging.filters.keys() {
        if module.is_empty() || module.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "invalid module in logging.filters: '{module}'"
            )));
        }
    }

    Ok(())
}

fn validate_routing_config(routing: &RoutingConfig) -> ConfigResult<()> {
    if routing.use_cache && routing.cache_path.is_none() {
        return Err(ConfigError::validation(
            "routing.use_cache is set but routing.cache_path is not",
        ));
    }
    Ok(())
}

fn validate_runtime_config(runtime: &RuntimeConfig) -> ConfigResult<()> {
    if runtime.max_concurrency == 0 {
        return Err(ConfigError::validation(
            "runtime.max_concurrency must be greater than 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = RelayConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
        config.logging.file_path = Some(PathBuf::from("relay.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_cache_needs_path() {
        let mut config = RelayConfig::default();
        config.routing.use_cache = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = RelayConfig::default();
        config.runtime.max_concurrency = 0;
        assert!(validate_config(&config).is_err());
    }
}
