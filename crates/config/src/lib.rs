//! Configuration loading, validation, and management for threadloom.
//!
//! Loads configuration from `~/.threadloom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.threadloom/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Thread this store is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Resource (user / tenant) this store is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Allow new assistant output to merge into a recalled assistant message
    #[serde(default = "default_true")]
    pub merge_across_recall: bool,

    /// Text of the user turn injected at the head of prompts that need one
    #[serde(default = "default_placeholder_user_text")]
    pub placeholder_user_text: String,

    /// System messages registered when the store is created
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<SystemPromptConfig>,
}

fn default_true() -> bool {
    true
}
fn default_placeholder_user_text() -> String {
    " ".into()
}

/// A system message, optionally grouped under a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptConfig {
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl StoreConfig {
    /// Load configuration from the default path (~/.threadloom/config.toml).
    ///
    /// Environment variables override the file:
    /// - `THREADLOOM_THREAD_ID`
    /// - `THREADLOOM_RESOURCE_ID`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(thread_id) = std::env::var("THREADLOOM_THREAD_ID") {
            config.thread_id = Some(thread_id);
        }
        if let Ok(resource_id) = std::env::var("THREADLOOM_RESOURCE_ID") {
            config.resource_id = Some(resource_id);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".threadloom")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.placeholder_user_text.is_empty() {
            return Err(ConfigError::ValidationError(
                "placeholder_user_text must not be empty".into(),
            ));
        }

        for (name, value) in [("thread_id", &self.thread_id), ("resource_id", &self.resource_id)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must not be blank when set"
                )));
            }
        }

        if let Some(index) = self.system.iter().position(|s| s.content.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "system[{index}].content must not be empty"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            resource_id: None,
            merge_across_recall: true,
            placeholder_user_text: default_placeholder_user_text(),
            system: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.merge_across_recall);
        assert_eq!(config.placeholder_user_text, " ");
        assert!(config.thread_id.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = StoreConfig {
            thread_id: Some("thread-1".into()),
            ..StoreConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: StoreConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(parsed.placeholder_user_text, config.placeholder_user_text);
    }

    #[test]
    fn empty_placeholder_rejected() {
        let config = StoreConfig {
            placeholder_user_text: String::new(),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_thread_id_rejected() {
        let config = StoreConfig {
            thread_id: Some("  ".into()),
            ..StoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thread_id"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = StoreConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert!(config.merge_across_recall);
    }

    #[test]
    fn system_prompts_parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
thread_id = "t-42"
resource_id = "user-7"
merge_across_recall = false

[[system]]
content = "You are terse."

[[system]]
content = "Cite sources."
tag = "research"
"#,
        )
        .unwrap();

        let config = StoreConfig::load_from(&path).unwrap();
        assert_eq!(config.thread_id.as_deref(), Some("t-42"));
        assert!(!config.merge_across_recall);
        assert_eq!(config.system.len(), 2);
        assert_eq!(config.system[1].tag.as_deref(), Some("research"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "thread_id = [").unwrap();
        assert!(matches!(
            StoreConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = StoreConfig::default_toml();
        assert!(toml_str.contains("merge_across_recall = true"));
        assert!(toml_str.contains("placeholder_user_text"));
    }
}
