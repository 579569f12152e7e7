//! Settings lookups with per-origin overrides.
//!
//! Values are resolved for a scope URL: an override registered for the URL's
//! host wins over the global value, which wins over the built-in default.

use crate::error::{BrowserError, BrowserResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Settings consulted by the network layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingKey {
    AcceptLanguage,
    UserAgent,
    DoNotTrackPolicy,
    EnableReferrer,
    CookiesPolicy,
    ThirdPartyCookiesPolicy,
    CookiesKeepMode,
    IgnoreSslErrors,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::AcceptLanguage,
        SettingKey::UserAgent,
        SettingKey::DoNotTrackPolicy,
        SettingKey::EnableReferrer,
        SettingKey::CookiesPolicy,
        SettingKey::ThirdPartyCookiesPolicy,
        SettingKey::CookiesKeepMode,
        SettingKey::IgnoreSslErrors,
    ];

    /// Persistent name of the setting.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::AcceptLanguage => "Network/AcceptLanguage",
            SettingKey::UserAgent => "Network/UserAgent",
            SettingKey::DoNotTrackPolicy => "Network/DoNotTrackPolicy",
            SettingKey::EnableReferrer => "Network/EnableReferrer",
            SettingKey::CookiesPolicy => "Network/CookiesPolicy",
            SettingKey::ThirdPartyCookiesPolicy => "Network/ThirdPartyCookiesPolicy",
            SettingKey::CookiesKeepMode => "Network/CookiesKeepMode",
            SettingKey::IgnoreSslErrors => "Security/IgnoreSslErrors",
        }
    }

    /// Value used when neither a global value nor an override exists.
    pub fn default_value(&self) -> SettingValue {
        match self {
            SettingKey::AcceptLanguage => SettingValue::text("system,en-US;q=0.8,en;q=0.6"),
            SettingKey::UserAgent => SettingValue::text("default"),
            SettingKey::DoNotTrackPolicy => SettingValue::text("skip"),
            SettingKey::EnableReferrer => SettingValue::Bool(true),
            SettingKey::CookiesPolicy => SettingValue::text("acceptAll"),
            SettingKey::ThirdPartyCookiesPolicy => SettingValue::text("acceptAll"),
            SettingKey::CookiesKeepMode => SettingValue::text("keepUntilExpires"),
            SettingKey::IgnoreSslErrors => SettingValue::List(Vec::new()),
        }
    }

    fn check(&self, value: &SettingValue) -> BrowserResult<()> {
        let ok = matches!(
            (self.default_value(), value),
            (SettingValue::Bool(_), SettingValue::Bool(_))
                | (SettingValue::Text(_), SettingValue::Text(_))
                | (SettingValue::List(_), SettingValue::List(_))
        );

        if ok {
            Ok(())
        } else {
            Err(BrowserError::setting_type(
                self.as_str(),
                self.default_value().type_name(),
            ))
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| BrowserError::unknown_setting(s))
    }
}

/// A setting value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn text(value: impl Into<String>) -> Self {
        SettingValue::Text(value.into())
    }

    /// Text content, or an empty string for non-text values.
    pub fn as_text(&self) -> &str {
        match self {
            SettingValue::Text(text) => text,
            _ => "",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[String] {
        match self {
            SettingValue::List(list) => list,
            _ => &[],
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Text(_) => "string",
            SettingValue::List(_) => "list",
        }
    }
}

/// Settings collaborator.
pub trait Settings: Send + Sync {
    /// Get the effective value of `key` for `scope`.
    fn get(&self, key: SettingKey, scope: Option<&Url>) -> SettingValue;

    /// Store `value`, as an override for the scope's host when a scope is given.
    fn set(&self, key: SettingKey, value: SettingValue, scope: Option<&Url>) -> BrowserResult<()>;
}

type SettingTable = IndexMap<SettingKey, SettingValue>;

/// In-memory settings with per-host overrides.
#[derive(Debug, Default)]
pub struct MemorySettings {
    global: RwLock<SettingTable>,
    overrides: RwLock<IndexMap<String, SettingTable>>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    global: IndexMap<String, SettingValue>,
    #[serde(default)]
    overrides: IndexMap<String, IndexMap<String, SettingValue>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from JSON of the form
    /// `{"global": {key: value}, "overrides": {host: {key: value}}}`.
    pub fn from_json_str(json: &str) -> BrowserResult<Self> {
        let file: SettingsFile = serde_json::from_str(json)?;
        let settings = Self::new();

        {
            let mut global = settings.global.write();
            for (name, value) in file.global {
                let key = name.parse::<SettingKey>()?;
                key.check(&value)?;
                global.insert(key, value);
            }
        }

        {
            let mut overrides = settings.overrides.write();
            for (host, table) in file.overrides {
                let entry = overrides.entry(host.to_lowercase()).or_default();
                for (name, value) in table {
                    let key = name.parse::<SettingKey>()?;
                    key.check(&value)?;
                    entry.insert(key, value);
                }
            }
        }

        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> BrowserResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Register an override for a host.
    pub fn set_override(&self, host: &str, key: SettingKey, value: SettingValue) -> BrowserResult<()> {
        key.check(&value)?;
        self.overrides
            .write()
            .entry(host.to_lowercase())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    /// Remove an override for a host.
    pub fn clear_override(&self, host: &str, key: SettingKey) {
        let mut overrides = self.overrides.write();
        if let Some(table) = overrides.get_mut(&host.to_lowercase()) {
            table.shift_remove(&key);
            if table.is_empty() {
                overrides.shift_remove(&host.to_lowercase());
            }
        }
    }

    /// Whether a host has an override for `key`.
    pub fn has_override(&self, host: &str, key: SettingKey) -> bool {
        self.overrides
            .read()
            .get(&host.to_lowercase())
            .map(|table| table.contains_key(&key))
            .unwrap_or(false)
    }
}

impl Settings for MemorySettings {
    fn get(&self, key: SettingKey, scope: Option<&Url>) -> SettingValue {
        if let Some(host) = scope.and_then(|url| url.host_str()) {
            if let Some(value) = self
                .overrides
                .read()
                .get(&host.to_lowercase())
                .and_then(|table| table.get(&key))
            {
                return value.clone();
            }
        }

        self.global
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.default_value())
    }

    fn set(&self, key: SettingKey, value: SettingValue, scope: Option<&Url>) -> BrowserResult<()> {
        key.check(&value)?;

        match scope.and_then(|url| url.host_str()) {
            Some(host) => {
                tracing::debug!("Setting override {} for {}", key, host);
                self.overrides
                    .write()
                    .entry(host.to_lowercase())
                    .or_default()
                    .insert(key, value);
            }
            None => {
                self.global.write().insert(key, value);
            }
        }

        Ok(())
    }
}
