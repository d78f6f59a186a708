//! TOML-based application configuration.
//!
//! Stores:
//! - Focus session lengths and the long-break cadence
//! - Reward and penalty rules for the focus session
//! - Notification preference
//! - The local user identity
//!
//! Configuration is stored at `~/.config/synitheia/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Session lengths, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    /// A long break follows every N-th completed focus session.
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u32,
    #[serde(default = "default_total_sessions")]
    pub total_sessions: u32,
}

/// Points and timing rules of the focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_session_reward")]
    pub session_reward_points: u32,
    /// Deducted from the session reward per interruption.
    #[serde(default = "default_interruption_cost")]
    pub interruption_cost_points: u32,
    #[serde(default = "default_violation_penalty")]
    pub violation_penalty_points: u32,
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,
    #[serde(default = "default_break_start_delay_secs")]
    pub break_start_delay_secs: u64,
    #[serde(default = "default_continue_delay_secs")]
    pub continue_delay_secs: u64,
    #[serde(default = "default_break_warning_secs")]
    pub break_warning_secs: u64,
    /// Display/visibility changes within this window after a requested
    /// display transition are treated as part of that transition.
    #[serde(default = "default_settle_window_ms")]
    pub settle_window_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/synitheia/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub user: UserConfig,
}

// Default functions
fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_long_break_every() -> u32 {
    4
}
fn default_total_sessions() -> u32 {
    1
}
fn default_session_reward() -> u32 {
    20
}
fn default_interruption_cost() -> u32 {
    5
}
fn default_violation_penalty() -> u32 {
    20
}
fn default_grace_window_secs() -> u64 {
    10
}
fn default_break_start_delay_secs() -> u64 {
    2
}
fn default_continue_delay_secs() -> u64 {
    1
}
fn default_break_warning_secs() -> u64 {
    10
}
fn default_settle_window_ms() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_user_id() -> String {
    "local".into()
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_every: default_long_break_every(),
            total_sessions: default_total_sessions(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            session_reward_points: default_session_reward(),
            interruption_cost_points: default_interruption_cost(),
            violation_penalty_points: default_violation_penalty(),
            grace_window_secs: default_grace_window_secs(),
            break_start_delay_secs: default_break_start_delay_secs(),
            continue_delay_secs: default_continue_delay_secs(),
            break_warning_secs: default_break_warning_secs(),
            settle_window_ms: default_settle_window_ms(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(format!("expected true/false: {e}")))?,
                ),
                serde_json::Value::Number(_) => {
                    let n = value
                        .parse::<u64>()
                        .map_err(|e| invalid(format!("expected a whole number: {e}")))?;
                    serde_json::Value::Number(n.into())
                }
                serde_json::Value::Object(_) => return Err(unknown()),
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Default config location inside the data directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                tracing::debug!(path = %path.display(), "wrote default config");
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default config: {e}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.focus.focus_minutes, 25);
        assert_eq!(cfg.focus.short_break_minutes, 5);
        assert_eq!(cfg.focus.long_break_minutes, 15);
        assert_eq!(cfg.focus.long_break_every, 4);
        assert_eq!(cfg.focus.total_sessions, 1);
        assert_eq!(cfg.rules.session_reward_points, 20);
        assert_eq!(cfg.rules.violation_penalty_points, 20);
        assert_eq!(cfg.rules.grace_window_secs, 10);
        assert!(cfg.notifications.enabled);
        assert_eq!(cfg.user.id, "local");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("[focus]\nfocus_minutes = 50\n").unwrap();
        assert_eq!(cfg.focus.focus_minutes, 50);
        assert_eq!(cfg.focus.short_break_minutes, 5);
        assert_eq!(cfg.rules, RulesConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("focus.focus_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("user.id").as_deref(), Some("local"));
        assert!(cfg.get("focus.missing_key").is_none());
        assert!(cfg.get("focus").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("focus.focus_minutes", "50").unwrap();
        cfg.set("notifications.enabled", "false").unwrap();
        cfg.set("user.id", "alice").unwrap();
        assert_eq!(cfg.focus.focus_minutes, 50);
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.user.id, "alice");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("focus.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("rules", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("notifications.enabled", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("focus.focus_minutes", "-3"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let first = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first, Config::default());

        let mut edited = first.clone();
        edited.set("rules.grace_window_secs", "30").unwrap();
        edited.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.rules.grace_window_secs, 30);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "focus = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn entries_lists_leaf_keys() {
        let entries = Config::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "focus.focus_minutes" && v == "25"));
        assert!(entries.iter().any(|(k, v)| k == "user.id" && v == "local"));
    }
}
