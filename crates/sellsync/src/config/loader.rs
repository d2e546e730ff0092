use std::path::Path;

use crate::config::schema::{Config, JobBackendKind};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Upper bound on retry steps so a misconfigured schedule cannot stall a draft for hours.
const MAX_RETRY_STEPS: usize = 10;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.jobs.backend == JobBackendKind::Sqlite
        && config.jobs.resolved_database_path().is_none()
    {
        return Err(ConfigError::Validation {
            message: "sqlite job backend requires jobs.database_path (no home directory found)"
                .to_string(),
        });
    }

    if config.drafts.retry_delays_ms.len() > MAX_RETRY_STEPS {
        return Err(ConfigError::Validation {
            message: format!(
                "drafts.retry_delays_ms has {} steps, at most {} allowed",
                config.drafts.retry_delays_ms.len(),
                MAX_RETRY_STEPS
            ),
        });
    }

    if config.ai.enabled && !is_http_url(&config.ai.endpoint) {
        return Err(ConfigError::Validation {
            message: format!("ai.endpoint is not an http(s) URL: {}", config.ai.endpoint),
        });
    }

    if let Some(base) = &config.drafts.api_base_url {
        if !is_http_url(base) {
            return Err(ConfigError::Validation {
                message: format!("drafts.api_base_url is not an http(s) URL: {}", base),
            });
        }
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.jobs.backend, JobBackendKind::Memory);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "jobs": {
                "backend": "sqlite",
                "database_path": "/tmp/sellsync-test.db",
                "retention_secs": 600,
                "max_concurrent": 2,
                "sync_parse_max_bytes": 1024
            },
            "ai": {
                "enabled": true,
                "endpoint": "http://localhost:8080/v1/chat/completions",
                "model": "local-model",
                "api_key_env_var": "MY_KEY"
            },
            "drafts": {
                "api_base_url": "https://shop.example/api",
                "debounce_ms": 500,
                "retry_delays_ms": [1000, 3000]
            },
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.jobs.backend, JobBackendKind::Sqlite);
        assert_eq!(config.jobs.max_concurrent, 2);
        assert_eq!(config.jobs.sync_parse_max_bytes, 1024);
        assert_eq!(config.ai.model, "local-model");
        assert_eq!(config.drafts.retry_delays_ms, vec![1000, 3000]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_unknown_field_rejected_by_schema() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_backend_rejected_by_schema() {
        let result = load_config_from_str(r#"{ "version": "1.0", "jobs": { "backend": "redis" } }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_too_many_retry_steps() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "drafts": { "retry_delays_ms": [1,1,1,1,1,1,1,1,1,1,1] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_enabled_ai_needs_http_endpoint() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "ai": { "enabled": true, "endpoint": "ftp://nope" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_malformed_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/definitely/not/here/sellsync.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
