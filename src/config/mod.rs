// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Configuration management for snapscribe

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directory to watch for new screenshots
    pub watch_dir: String,

    /// Vision classifier endpoint
    pub classifier: ClassifierConfig,

    /// Pipeline timing knobs
    #[serde(default)]
    pub tuning: TuningConfig,

    /// Naming rules
    #[serde(default)]
    pub rules: RuleConfig,

    /// Rename journal settings
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Base URL of the vision endpoint
    pub url: String,

    /// Vision model name
    pub model: String,

    /// Prompt sent with every image
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Environment variable holding the API credential, if the endpoint
    /// requires one. Resolved once at startup; a set-but-missing variable is
    /// a startup error, not a per-file one.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Timing constants for the watch pipeline.
///
/// The defaults are starting points, not tuned truths; slow network
/// filesystems or very large captures may need a longer debounce or a higher
/// poll ceiling.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct TuningConfig {
    /// Quiet period after the last raw event before a file is considered settled
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval between file-size samples while waiting for a write to finish
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of size samples before giving up on a file
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// How long a self-produced rename stays suppressible
    #[serde(default = "default_ledger_ttl_ms")]
    pub ledger_ttl_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleConfig {
    /// Maximum length of a sanitized filename stem
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: String,
}

// Default value functions
fn default_timeout() -> u64 { 120 }
fn default_debounce_ms() -> u64 { 500 }
fn default_poll_interval_ms() -> u64 { 250 }
fn default_poll_attempts() -> u32 { 12 }
fn default_ledger_ttl_ms() -> u64 { 5000 }
fn default_max_length() -> usize { 100 }
fn default_true() -> bool { true }
fn default_history_path() -> String { "snapscribe_history.jsonl".to_string() }

fn default_prompt() -> String {
    "Describe this screenshot in a short phrase suitable as a filename \
     (max 5 words). Do not include the file extension. \
     Return ONLY the phrase.".to_string()
}

impl TuningConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ledger_ttl(&self) -> Duration {
        Duration::from_millis(self.ledger_ttl_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_dir: "./screenshots".to_string(),
            classifier: ClassifierConfig::default(),
            tuning: TuningConfig::default(),
            rules: RuleConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "moondream".to_string(),
            prompt: default_prompt(),
            api_key_env: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_attempts: default_poll_attempts(),
            ledger_ttl_ms: default_ledger_ttl_ms(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_history_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::SnapscribeError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let config = AppConfig::default();
        assert_eq!(config.tuning.debounce(), Duration::from_millis(500));
        assert_eq!(config.tuning.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.tuning.poll_attempts, 12);
        assert_eq!(config.tuning.ledger_ttl(), Duration::from_secs(5));
        assert_eq!(config.rules.max_length, 100);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/snapscribe.json")).unwrap();
        assert_eq!(config.watch_dir, "./screenshots");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.watch_dir = "/tmp/shots".to_string();
        config.tuning.poll_attempts = 20;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.watch_dir, "/tmp/shots");
        assert_eq!(loaded.tuning.poll_attempts, 20);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"watch_dir": "/tmp/x", "classifier": {"url": "http://localhost:11434", "model": "moondream"}}"#,
        )
        .unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.tuning.debounce_ms, 500);
        assert!(loaded.history.enabled);
    }
}
