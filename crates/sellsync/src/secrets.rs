//! API key resolution for the AI extractor.
//!
//! A key may come from three places, checked in this order:
//!
//! 1. **Inline value** in the config (`api_key`), handy for local testing
//! 2. **Key file** (`api_key_file`), the mounted-secret pattern
//! 3. **Environment variable** (`api_key_env_var`)
//!
//! A missing key is not an error for callers of [`resolve_api_key`]: the
//! extractor simply runs heuristic-only.

use secrecy::SecretString;
use std::fs;

use crate::config::AiConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No key source configured (need one of: inline value, key file, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read key file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Key file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a key can be read from. Empty strings count as "not configured".
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySource<'a> {
    pub inline: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> KeySource<'a> {
    pub fn from_ai_config(config: &'a AiConfig) -> Self {
        Self {
            inline: config.api_key.as_deref(),
            file: config.api_key_file.as_deref(),
            env_var: config.api_key_env_var.as_deref(),
        }
    }

    pub fn is_configured(&self) -> bool {
        [self.inline, self.file, self.env_var]
            .iter()
            .any(|s| s.is_some_and(|v| !v.is_empty()))
    }

    /// Resolves the key, erroring when a configured source cannot be read.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = self.inline.filter(|v| !v.is_empty()) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = self.file.filter(|p| !p.is_empty()) {
            let expanded = expand_home(path);
            let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EmptyFile { path: expanded });
            }
            return Ok(SecretString::from(trimmed.to_string()));
        }

        if let Some(name) = self.env_var.filter(|n| !n.is_empty()) {
            return match std::env::var(name) {
                Ok(value) if !value.trim().is_empty() => {
                    Ok(SecretString::from(value.trim().to_string()))
                }
                Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

/// Resolves the AI API key, mapping every "no key" outcome to `None`.
///
/// Only an unreadable key file is reported as an error; an unset environment
/// variable just means the deployment has no AI credentials.
pub fn resolve_api_key(config: &AiConfig) -> Result<Option<SecretString>> {
    match KeySource::from_ai_config(config).resolve() {
        Ok(key) => Ok(Some(key)),
        Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the user's home directory. `~user` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().into_owned();
            if path == "~" {
                return home;
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
