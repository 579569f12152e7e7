//! The browsing context (tab) a network manager serves.

use common::{SettingKey, SettingValue, Settings};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// Tab or page whose traffic is mediated.
pub trait BrowsingContext: Send + Sync {
    /// URL currently shown, if any.
    fn url(&self) -> Option<Url>;

    /// Effective option value for `scope`.
    fn option(&self, key: SettingKey, scope: Option<&Url>) -> SettingValue;

    /// Content-blocking profiles enabled for this context.
    fn content_blocking_profiles(&self) -> Vec<String>;
}

/// Browsing context backed by the settings collaborator, with page-local
/// option overrides.
pub struct PageContext {
    settings: Arc<dyn Settings>,
    url: RwLock<Option<Url>>,
    profiles: RwLock<Vec<String>>,
    options: RwLock<IndexMap<SettingKey, SettingValue>>,
}

impl PageContext {
    pub fn new(settings: Arc<dyn Settings>) -> Self {
        Self {
            settings,
            url: RwLock::new(None),
            profiles: RwLock::new(Vec::new()),
            options: RwLock::new(IndexMap::new()),
        }
    }

    pub fn set_url(&self, url: Option<Url>) {
        *self.url.write() = url;
    }

    pub fn set_content_blocking_profiles(&self, profiles: Vec<String>) {
        *self.profiles.write() = profiles;
    }

    /// Override an option for this page only.
    pub fn set_option(&self, key: SettingKey, value: SettingValue) {
        self.options.write().insert(key, value);
    }

    pub fn reset_option(&self, key: SettingKey) {
        self.options.write().shift_remove(&key);
    }
}

impl BrowsingContext for PageContext {
    fn url(&self) -> Option<Url> {
        self.url.read().clone()
    }

    fn option(&self, key: SettingKey, scope: Option<&Url>) -> SettingValue {
        if let Some(value) = self.options.read().get(&key) {
            return value.clone();
        }
        self.settings.get(key, scope)
    }

    fn content_blocking_profiles(&self) -> Vec<String> {
        self.profiles.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MemorySettings;

    #[test]
    fn test_page_option_overrides_settings() {
        let settings = Arc::new(MemorySettings::new());
        settings
            .set(SettingKey::UserAgent, SettingValue::text("chrome"), None)
            .unwrap();

        let context = PageContext::new(settings);
        assert_eq!(context.option(SettingKey::UserAgent, None).as_text(), "chrome");

        context.set_option(SettingKey::UserAgent, SettingValue::text("firefox"));
        assert_eq!(context.option(SettingKey::UserAgent, None).as_text(), "firefox");

        context.reset_option(SettingKey::UserAgent);
        assert_eq!(context.option(SettingKey::UserAgent, None).as_text(), "chrome");
    }

    #[test]
    fn test_url_and_profiles() {
        let context = PageContext::new(Arc::new(MemorySettings::new()));
        assert!(context.url().is_none());

        context.set_url(Some(Url::parse("https://example.com/").unwrap()));
        context.set_content_blocking_profiles(vec!["easylist".to_string()]);

        assert_eq!(context.url().unwrap().host_str(), Some("example.com"));
        assert_eq!(context.content_blocking_profiles(), vec!["easylist"]);
    }
}
