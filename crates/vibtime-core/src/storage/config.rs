//! TOML-based application configuration.
//!
//! Stores:
//! - Tap detection settings (sensitivity, tap count, watch-mode threshold and duration)
//! - Vibration pattern encoding
//! - Safety test mode
//!
//! Configuration is stored at `~/.config/vibtime/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::pattern::EncodingMode;
use crate::safety::SafetyLimits;
use crate::tap::{TapSensitivity, DEFAULT_REQUIRED_TAP_COUNT, MAX_TAP_COUNT, MIN_TAP_COUNT};
use crate::watch_mode::{WatchDuration, DEFAULT_WATCH_THRESHOLD};

/// Tap detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Threshold level for the foreground multi-tap classifier.
    #[serde(default)]
    pub sensitivity: TapSensitivity,
    #[serde(default = "default_required_tap_count")]
    pub required_tap_count: u8,
    /// Single-tap threshold used while in watch mode. Independent of `sensitivity`.
    #[serde(default = "default_watch_threshold")]
    pub watch_threshold: f32,
    #[serde(default)]
    pub watch_duration: WatchDuration,
    /// Emit an event with the magnitude of every processed sample.
    #[serde(default)]
    pub report_acceleration: bool,
}

/// Pattern configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default)]
    pub mode: EncodingMode,
}

/// Safety governor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Use the short 5 min / 30 s limits.
    #[serde(default)]
    pub test_mode: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/vibtime/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub pattern: PatternConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

fn default_required_tap_count() -> u8 {
    DEFAULT_REQUIRED_TAP_COUNT
}
fn default_watch_threshold() -> f32 {
    DEFAULT_WATCH_THRESHOLD
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sensitivity: TapSensitivity::default(),
            required_tap_count: default_required_tap_count(),
            watch_threshold: default_watch_threshold(),
            watch_duration: WatchDuration::default(),
            report_acceleration: false,
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => {
                        return Err(ConfigError::UnknownKey(key.to_string()));
                    }
                    _ => serde_json::Value::String(value.to_ascii_lowercase()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// `~/.config/vibtime[-dev]/config.toml`
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/vibtime"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, creating it with defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable, unparsable, or invalid content.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The change is in memory only;
    /// call [`save`](Self::save) to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is mistyped or
    /// out of range. `self` is unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.detection.required_tap_count;
        if !(MIN_TAP_COUNT..=MAX_TAP_COUNT).contains(&count) {
            return Err(ConfigError::InvalidValue {
                key: "detection.required_tap_count".into(),
                message: format!("{count} is outside {MIN_TAP_COUNT}-{MAX_TAP_COUNT}"),
            });
        }
        let threshold = self.detection.watch_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "detection.watch_threshold".into(),
                message: format!("{threshold} must be a positive number"),
            });
        }
        Ok(())
    }

    /// Governor limits selected by `safety.test_mode`.
    pub fn safety_limits(&self) -> SafetyLimits {
        SafetyLimits::for_mode(self.safety.test_mode)
    }
}
