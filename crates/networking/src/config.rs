//! Network configuration, resolved once at startup.

use common::BrowserResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Process-wide network configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Default Accept-Language; `system` stands for the system locale.
    pub accept_language: String,
    /// BCP 47 tag substituted for `system`.
    pub system_locale: String,
    /// User agent used when the page names no known entry.
    pub user_agent: String,
    /// Named user agents selectable per origin.
    pub user_agents: IndexMap<String, String>,
    /// Period of the transfer status recomputation, in milliseconds.
    pub status_interval_ms: u64,
    /// Start in offline mode.
    pub working_offline: bool,
    /// Answer proxy challenges with the system credentials.
    pub use_system_proxy_authentication: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let mut user_agents = IndexMap::new();
        user_agents.insert("default".to_string(), default_user_agent());
        user_agents.insert(
            "firefox".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string(),
        );
        user_agents.insert(
            "chrome".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string(),
        );

        Self {
            accept_language: "system,en-US;q=0.8,en;q=0.6".to_string(),
            system_locale: detect_system_locale(),
            user_agent: default_user_agent(),
            user_agents,
            status_interval_ms: 500,
            working_offline: false,
            use_system_proxy_authentication: false,
        }
    }
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> BrowserResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> BrowserResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_system_locale(mut self, locale: impl Into<String>) -> Self {
        self.system_locale = locale.into();
        self
    }

    pub fn with_accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.accept_language = accept_language.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Replace `system` in an Accept-Language value with the system locale.
    pub fn expand_accept_language(&self, value: &str) -> String {
        value.replace("system", &self.system_locale)
    }

    /// The Accept-Language header sent when a page has no override.
    pub fn default_accept_language(&self) -> String {
        self.expand_accept_language(&self.accept_language)
    }

    /// User agent for a named entry, falling back to the default.
    pub fn user_agent_for(&self, name: &str) -> String {
        self.user_agents
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.user_agent.clone())
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }
}

/// Browser user agent string.
pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) OxideBrowser/{}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    )
}

/// System locale as a BCP 47 tag, from the usual locale variables.
pub fn detect_system_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|value| locale_to_bcp47(&value))
        .unwrap_or_else(|| "en-US".to_string())
}

fn locale_to_bcp47(value: &str) -> Option<String> {
    let tag = value.split(['.', '@']).next().unwrap_or("").trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}
