//! Tracker configuration.
//!
//! Compiled defaults with partial TOML overrides. This is a library
//! crate, so there is no CLI or environment layer; embedders hand the
//! core a TOML string (or just `TrackerConfig::default()`).

use std::time::Duration;

/// Errors that can occur when loading tracker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to parse the TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// TOML file structure; all fields optional for partial overrides.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TrackerConfigFile {
    tracker: TrackerFileSection,
}

/// `[tracker]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TrackerFileSection {
    notify_grace_secs: Option<u64>,
    history_months_back: Option<u32>,
    default_task_title: Option<String>,
}

/// Fully resolved tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Grace period before a "group fully completed" alert fires.
    pub notify_grace_secs: u64,
    /// How many months of completion history a range fetch covers.
    pub history_months_back: u32,
    /// Title of the starter task seeded for brand-new users.
    pub default_task_title: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            notify_grace_secs: 10,
            history_months_back: 6,
            default_task_title: "Add your first task".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Parses a TOML string, filling unset fields from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let file: TrackerConfigFile = toml::from_str(toml_str)?;
        let defaults = Self::default();
        Ok(Self {
            notify_grace_secs: file
                .tracker
                .notify_grace_secs
                .unwrap_or(defaults.notify_grace_secs),
            history_months_back: file
                .tracker
                .history_months_back
                .unwrap_or(defaults.history_months_back),
            default_task_title: file
                .tracker
                .default_task_title
                .unwrap_or(defaults.default_task_title),
        })
    }

    /// The alert grace period as a [`Duration`].
    #[must_use]
    pub const fn notify_grace(&self) -> Duration {
        Duration::from_secs(self.notify_grace_secs)
    }
}
