//! Configuration resolution for psmevents.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Settings file (`--config`, else `<config dir>/psmevents/settings.json`)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the binary)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::DEFAULT_CONTEXT;
use crate::error::{Error, Result};
use crate::subscribe::Category;

/// Complete psmevents configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How events are printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render `object.updated` events as a diff of old and new object.
    pub diff: bool,
    /// Context lines around each diff hunk.
    pub diff_context: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            diff: true,
            diff_context: DEFAULT_CONTEXT,
        }
    }
}

/// Which object categories to subscribe to in live mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SubscriptionConfig {
    pub sessions: bool,
    pub subscribers: bool,
    pub groups: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            sessions: true,
            subscribers: true,
            groups: false,
        }
    }
}

impl SubscriptionConfig {
    /// Whether `category` should be subscribed to.
    pub const fn enabled(&self, category: Category) -> bool {
        match category {
            Category::Session => self.sessions,
            Category::Subscriber => self.subscribers,
            Category::Group => self.groups,
        }
    }

    /// Enabled categories, in subscription order.
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.enabled(*c))
            .collect()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level filter for psmevents targets (e.g. "warn", "debug").
    pub level: String,
    /// Emit JSON log lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the global settings file is optional.
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(global) if global.exists() => load_config_file(&global)?,
            _ => Settings::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Path of the global settings file.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("psmevents").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Settings> {
    debug!(path = %path.display(), "Loading settings file");
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("PSMEVENTS_DIFF") {
        set_parsed(&mut config.render.diff, "PSMEVENTS_DIFF", &val, parse_bool);
    }
    if let Some(val) = lookup("PSMEVENTS_DIFF_CONTEXT") {
        set_parsed(
            &mut config.render.diff_context,
            "PSMEVENTS_DIFF_CONTEXT",
            &val,
            |v| v.parse().ok(),
        );
    }
    if let Some(val) = lookup("PSMEVENTS_SESSIONS") {
        set_parsed(
            &mut config.subscriptions.sessions,
            "PSMEVENTS_SESSIONS",
            &val,
            parse_bool,
        );
    }
    if let Some(val) = lookup("PSMEVENTS_SUBSCRIBERS") {
        set_parsed(
            &mut config.subscriptions.subscribers,
            "PSMEVENTS_SUBSCRIBERS",
            &val,
            parse_bool,
        );
    }
    if let Some(val) = lookup("PSMEVENTS_GROUPS") {
        set_parsed(
            &mut config.subscriptions.groups,
            "PSMEVENTS_GROUPS",
            &val,
            parse_bool,
        );
    }
    if let Some(val) = lookup("PSMEVENTS_LOG_LEVEL") {
        config.logging.level = val;
    }
}

fn set_parsed<T>(slot: &mut T, key: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) {
    match parse(raw.trim()) {
        Some(value) => *slot = value,
        None => warn!(key, value = raw, "Ignoring unparseable environment override"),
    }
}

/// Parse a boolean the way command-line flags accept them.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "yes" | "on" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "no" | "off" => Some(false),
        _ => None,
    }
}
