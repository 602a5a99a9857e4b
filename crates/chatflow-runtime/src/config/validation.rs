//! Configuration validation utilities.
//!
//! Hard errors stop startup; oddities that still yield a working pipeline
//! are logged with `warn!`.

use std::collections::HashSet;

use chatflow_pipeline::PipelineConfig;
use regex::Regex;
use tracing::warn;

use super::error::{ConfigError, ConfigResult};
use super::schema::{ChatflowConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ChatflowConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_pipeline_config(&config.pipeline)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file-path"));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Empty log filter target: '{target}'"
        )));
    }

    Ok(())
}

fn validate_pipeline_config(pipeline: &PipelineConfig) -> ConfigResult<()> {
    for pattern in &pipeline.trigger.ignore_rules.regexp {
        Regex::new(pattern).map_err(|e| ConfigError::invalid_pattern(pattern, e.to_string()))?;
    }

    if pipeline
        .trigger
        .ignore_rules
        .prefix
        .iter()
        .any(String::is_empty)
    {
        return Err(ConfigError::validation(
            "An empty ignore prefix would drop every message",
        ));
    }

    validate_command_prefixes(&pipeline.command.prefix);
    Ok(())
}

fn validate_command_prefixes(prefixes: &[String]) {
    if prefixes.is_empty() {
        warn!("No command prefixes configured, every message goes to chat");
        return;
    }

    let mut seen = HashSet::new();
    for prefix in prefixes {
        if prefix.is_empty() {
            warn!("Empty command prefix is ignored");
        } else if !seen.insert(prefix.as_str()) {
            warn!(prefix = %prefix, "Duplicate command prefix");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&ChatflowConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = ChatflowConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("chatflow.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_ignore_regexp() {
        let mut config = ChatflowConfig::default();
        config.pipeline.trigger.ignore_rules.regexp = vec!["^ok$".into(), "(unclosed".into()];

        let Err(ConfigError::InvalidPattern { pattern, .. }) = validate_config(&config) else {
            panic!("expected an invalid pattern error");
        };
        assert_eq!(pattern, "(unclosed");
    }

    #[test]
    fn test_empty_ignore_prefix_rejected() {
        let mut config = ChatflowConfig::default();
        config.pipeline.trigger.ignore_rules.prefix = vec![String::new()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_odd_command_prefixes_only_warn() {
        let mut config = ChatflowConfig::default();
        config.pipeline.command.prefix = vec!["!".into(), "!".into(), String::new()];
        assert!(validate_config(&config).is_ok());

        config.pipeline.command.prefix.clear();
        assert!(validate_config(&config).is_ok());
    }
}
