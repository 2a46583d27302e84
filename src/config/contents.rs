//! Content settings resolved per app and per content type.
//!
//! A setting `S` asked for app `A` and content type `C` is looked up as
//! `A_C_S`, then `A_S`, then the global `S`, then the built-in default.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NB_CONTENTS_KEPT: &str = "NB_CONTENTS_KEPT";
pub const TTL: &str = "TTL";
pub const AJAX_REFRESH: &str = "AJAX_REFRESH";
pub const CSS_FRAMEWORK: &str = "CSS_FRAMEWORK";

pub const DEFAULT_NB_CONTENTS_KEPT: i64 = 10;
pub const DEFAULT_TTL_SECS: i64 = 900;
pub const DEFAULT_AJAX_REFRESH: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    /// Integers, and text holding an integer (environment variables arrive as text).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(value) => Some(*value),
            SettingValue::Text(value) => value.trim().parse().ok(),
            SettingValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            SettingValue::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            SettingValue::Int(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("setting `{key}` is not configured")]
    MissingSetting { key: String },
    #[error("setting `{key}` must be {expected}")]
    InvalidType { key: String, expected: &'static str },
}

impl SettingsError {
    fn invalid_type(key: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidType {
            key: key.into(),
            expected,
        }
    }
}

/// Resolved content settings: globals plus upper-cased per-app overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentSettings {
    globals: BTreeMap<String, SettingValue>,
    overrides: BTreeMap<String, SettingValue>,
}

impl ContentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, setting: &str, value: impl Into<SettingValue>) -> Self {
        self.set_global(setting, value);
        self
    }

    pub fn with_override(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.set_override(key, value);
        self
    }

    pub fn set_global(&mut self, setting: &str, value: impl Into<SettingValue>) {
        self.globals.insert(normalize_key(setting), value.into());
    }

    pub fn set_override(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.overrides.insert(normalize_key(key), value.into());
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.overrides.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Lenient lookup; `None` when neither an override, a global nor a default exists.
    pub fn get_for(
        &self,
        setting: &str,
        app: Option<&str>,
        content_type: Option<&str>,
    ) -> Option<SettingValue> {
        self.lookup(setting, app, content_type)
            .map(|(_, value)| value)
    }

    pub fn require_for(
        &self,
        setting: &str,
        app: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<SettingValue, SettingsError> {
        self.require_entry(setting, app, content_type)
            .map(|(_, value)| value)
    }

    pub fn nb_contents_kept_for(
        &self,
        app: &str,
        content_type: &str,
    ) -> Result<usize, SettingsError> {
        let (key, value) = self.require_entry(NB_CONTENTS_KEPT, Some(app), Some(content_type))?;
        value
            .as_int()
            .and_then(|count| usize::try_from(count).ok())
            .ok_or_else(|| SettingsError::invalid_type(key, "a non-negative integer"))
    }

    pub fn ttl_for(&self, app: &str, content_type: &str) -> Result<Duration, SettingsError> {
        let (key, value) = self.require_entry(TTL, Some(app), Some(content_type))?;
        value
            .as_int()
            .and_then(|secs| u64::try_from(secs).ok())
            .map(Duration::from_secs)
            .ok_or_else(|| SettingsError::invalid_type(key, "a non-negative number of seconds"))
    }

    pub fn ajax_refresh(&self, app: &str, content_type: &str) -> Result<bool, SettingsError> {
        let (key, value) = self.require_entry(AJAX_REFRESH, Some(app), Some(content_type))?;
        value
            .as_bool()
            .ok_or_else(|| SettingsError::invalid_type(key, "a boolean"))
    }

    pub fn css_framework(&self) -> Result<Option<String>, SettingsError> {
        match self.lookup(CSS_FRAMEWORK, None, None) {
            None => Ok(None),
            Some((key, value)) => value
                .as_text()
                .map(|name| Some(name.trim().to_string()).filter(|name| !name.is_empty()))
                .ok_or_else(|| SettingsError::invalid_type(key, "a string")),
        }
    }

    fn require_entry(
        &self,
        setting: &str,
        app: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<(String, SettingValue), SettingsError> {
        self.lookup(setting, app, content_type)
            .ok_or_else(|| SettingsError::MissingSetting {
                key: normalize_key(setting),
            })
    }

    fn lookup(
        &self,
        setting: &str,
        app: Option<&str>,
        content_type: Option<&str>,
    ) -> Option<(String, SettingValue)> {
        let setting = normalize_key(setting);

        for key in override_keys(&setting, app, content_type) {
            if let Some(value) = self.overrides.get(&key) {
                return Some((key, value.clone()));
            }
        }

        if let Some(value) = self.globals.get(&setting) {
            return Some((setting, value.clone()));
        }

        builtin_default(&setting).map(|value| (setting, value))
    }
}

fn override_keys(setting: &str, app: Option<&str>, content_type: Option<&str>) -> Vec<String> {
    let Some(app) = app.map(normalize_key).filter(|app| !app.is_empty()) else {
        return Vec::new();
    };

    let mut keys = Vec::with_capacity(2);
    if let Some(content_type) = content_type
        .map(|value| normalize_key(value).replace('-', "_"))
        .filter(|value| !value.is_empty())
    {
        keys.push(format!("{app}_{content_type}_{setting}"));
    }
    keys.push(format!("{app}_{setting}"));
    keys
}

fn builtin_default(setting: &str) -> Option<SettingValue> {
    match setting {
        NB_CONTENTS_KEPT => Some(SettingValue::Int(DEFAULT_NB_CONTENTS_KEPT)),
        TTL => Some(SettingValue::Int(DEFAULT_TTL_SECS)),
        AJAX_REFRESH => Some(SettingValue::Bool(DEFAULT_AJAX_REFRESH)),
        _ => None,
    }
}

pub(crate) fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}
