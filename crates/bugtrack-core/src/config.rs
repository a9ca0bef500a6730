use crate::lifecycle::BugDefaults;
use crate::model::{Priority, Severity};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project tracker directory.
pub const TRACKER_DIR: &str = ".bugtrack";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bugs: BugsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_timeout_ms(),
            busy_timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugsConfig {
    #[serde(default)]
    pub default_severity: Severity,
    #[serde(default)]
    pub default_priority: Priority,
}

impl BugsConfig {
    #[must_use]
    pub const fn defaults(&self) -> BugDefaults {
        BugDefaults {
            severity: self.default_severity,
            priority: self.default_priority,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Default acting user: an id or an email.
    #[serde(default)]
    pub user: Option<String>,
}

pub fn load_project_config(tracker_dir: &Path) -> Result<ProjectConfig> {
    let path = tracker_dir.join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Path of the user config file, if the platform has a config directory.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bugtrack/config.toml"))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(path) = user_config_path() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&path)
}

pub fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Persist `config` to the user config file, creating parent directories.
pub fn save_user_config(path: &Path, config: &UserConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to encode user config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Walk up from `start` looking for a `.bugtrack/` directory.
#[must_use]
pub fn find_tracker_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(TRACKER_DIR))
        .find(|candidate| candidate.is_dir())
}

/// Output mode after applying flag, `FORMAT` env, user config, and TTY
/// detection in that order.
pub fn resolve_output(cli_json: bool, user: &UserConfig) -> String {
    let env_format = env::var("FORMAT").ok();
    resolve_output_from(cli_json, user.output.as_deref(), env_format.as_deref())
}

fn resolve_output_from(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_timeout_ms() -> u64 {
    5000
}
