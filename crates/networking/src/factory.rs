//! Process-wide network state shared by every manager.

use crate::config::NetworkConfig;
use crate::cookie_gate::CookiePolicyGate;
use crate::cookies::{CookieJar, CookieStore};
use crate::timer::{ManualTicker, TickScheduler};
use crate::transport::{AllowAll, CacheProvider, ContentBlocker, Transport, TransportFactory};
use common::{Console, Settings, TracingConsole};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Owns the collaborators every network manager is built from.
pub struct NetworkFactory {
    config: Arc<NetworkConfig>,
    working_offline: AtomicBool,
    use_system_proxy_authentication: AtomicBool,
    settings: Arc<dyn Settings>,
    cookie_store: Arc<dyn CookieStore>,
    /// Held by every shared gate while it writes to `cookie_store`.
    cookie_write_lock: Arc<Mutex<()>>,
    cache: Option<Arc<dyn CacheProvider>>,
    transports: Arc<dyn TransportFactory>,
    blocker: Arc<dyn ContentBlocker>,
    console: Arc<dyn Console>,
    ticker: Arc<dyn TickScheduler>,
}

impl NetworkFactory {
    pub fn builder(
        config: NetworkConfig,
        settings: Arc<dyn Settings>,
        transports: Arc<dyn TransportFactory>,
    ) -> NetworkFactoryBuilder {
        NetworkFactoryBuilder {
            config,
            settings,
            transports,
            cookie_store: None,
            cache: None,
            blocker: None,
            console: None,
            ticker: None,
        }
    }

    pub fn config(&self) -> &Arc<NetworkConfig> {
        &self.config
    }

    pub fn settings(&self) -> &Arc<dyn Settings> {
        &self.settings
    }

    pub fn cookie_store(&self) -> &Arc<dyn CookieStore> {
        &self.cookie_store
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheProvider>> {
        self.cache.as_ref()
    }

    pub fn content_blocker(&self) -> &Arc<dyn ContentBlocker> {
        &self.blocker
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    pub fn ticker(&self) -> &Arc<dyn TickScheduler> {
        &self.ticker
    }

    pub fn is_working_offline(&self) -> bool {
        self.working_offline.load(Ordering::Relaxed)
    }

    pub fn set_working_offline(&self, offline: bool) {
        if self.working_offline.swap(offline, Ordering::Relaxed) != offline {
            info!("Working offline: {}", offline);
        }
    }

    pub fn is_using_system_proxy_authentication(&self) -> bool {
        self.use_system_proxy_authentication.load(Ordering::Relaxed)
    }

    pub fn set_use_system_proxy_authentication(&self, enabled: bool) {
        self.use_system_proxy_authentication.store(enabled, Ordering::Relaxed);
    }

    /// Cookie gate for a new manager: private managers get their own store.
    pub fn cookie_gate(&self, private: bool) -> CookiePolicyGate {
        if private {
            CookiePolicyGate::ephemeral()
        } else {
            CookiePolicyGate::shared(self.cookie_store.clone(), self.cookie_write_lock.clone())
        }
    }

    pub fn create_transport(
        &self,
        cache: Option<Arc<dyn CacheProvider>>,
        cookies: Arc<CookiePolicyGate>,
    ) -> Box<dyn Transport> {
        self.transports.create(cache, cookies)
    }

    /// Delete every cookie in the shared store.
    pub fn clear_cookies(&self) {
        let _guard = self.cookie_write_lock.lock();
        for cookie in self.cookie_store.all_cookies() {
            self.cookie_store.delete(&cookie);
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}

/// Builder for [`NetworkFactory`].
pub struct NetworkFactoryBuilder {
    config: NetworkConfig,
    settings: Arc<dyn Settings>,
    transports: Arc<dyn TransportFactory>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    cache: Option<Arc<dyn CacheProvider>>,
    blocker: Option<Arc<dyn ContentBlocker>>,
    console: Option<Arc<dyn Console>>,
    ticker: Option<Arc<dyn TickScheduler>>,
}

impl NetworkFactoryBuilder {
    /// Shared persistent cookie store. Defaults to an in-memory jar.
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn content_blocker(mut self, blocker: Arc<dyn ContentBlocker>) -> Self {
        self.blocker = Some(blocker);
        self
    }

    pub fn console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Status ticker. Without one, ticks must be delivered by hand.
    pub fn ticker(mut self, ticker: Arc<dyn TickScheduler>) -> Self {
        self.ticker = Some(ticker);
        self
    }

    pub fn build(self) -> NetworkFactory {
        NetworkFactory {
            working_offline: AtomicBool::new(self.config.working_offline),
            use_system_proxy_authentication: AtomicBool::new(self.config.use_system_proxy_authentication),
            config: Arc::new(self.config),
            settings: self.settings,
            cookie_store: self.cookie_store.unwrap_or_else(|| Arc::new(CookieJar::new())),
            cookie_write_lock: Arc::default(),
            cache: self.cache,
            transports: self.transports,
            blocker: self.blocker.unwrap_or_else(|| Arc::new(AllowAll)),
            console: self.console.unwrap_or_else(|| Arc::new(TracingConsole)),
            ticker: self.ticker.unwrap_or_else(|| Arc::new(ManualTicker::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;
    use crate::test_support::{MemoryCache, RecordingTransport};
    use common::MemorySettings;
    use url::Url;

    fn factory(config: NetworkConfig) -> NetworkFactory {
        let transports = |_: Option<Arc<dyn CacheProvider>>, _: Arc<CookiePolicyGate>| -> Box<dyn Transport> {
            Box::new(RecordingTransport::default())
        };
        NetworkFactory::builder(config, Arc::new(MemorySettings::new()), Arc::new(transports))
            .cache(Arc::new(MemoryCache::default()))
            .build()
    }

    #[test]
    fn test_flags_start_from_config() {
        let config = NetworkConfig {
            working_offline: true,
            use_system_proxy_authentication: true,
            ..NetworkConfig::default()
        };
        let factory = factory(config);

        assert!(factory.is_working_offline());
        assert!(factory.is_using_system_proxy_authentication());

        factory.set_working_offline(false);
        factory.set_use_system_proxy_authentication(false);
        assert!(!factory.is_working_offline());
        assert!(!factory.is_using_system_proxy_authentication());
    }

    #[test]
    fn test_cookie_gates() {
        let factory = factory(NetworkConfig::default());
        let page = Url::parse("https://example.com/").unwrap();

        let shared = factory.cookie_gate(false);
        shared.set_cookies_from_url(vec![Cookie::new("a", "1")], &page);
        assert_eq!(factory.cookie_store().all_cookies().len(), 1);

        let private = factory.cookie_gate(true);
        private.set_cookies_from_url(vec![Cookie::new("b", "2")], &page);
        assert_eq!(factory.cookie_store().all_cookies().len(), 1);

        factory.clear_cookies();
        assert!(factory.cookie_store().all_cookies().is_empty());
    }

    #[test]
    fn test_shared_gates_share_write_lock() {
        let factory = factory(NetworkConfig::default());
        let first = factory.cookie_gate(false);
        let second = factory.cookie_gate(false);
        let private = factory.cookie_gate(true);

        assert!(first.shares_write_lock(&second));
        assert!(!first.shares_write_lock(&private));
    }

    #[test]
    fn test_clear_cache() {
        let factory = factory(NetworkConfig::default());
        let url = Url::parse("https://example.com/a.css").unwrap();
        let cache = factory.cache().unwrap().clone();
        cache.put(&url, bytes::Bytes::from_static(b"body {}"));

        factory.clear_cache();
        assert!(cache.get(&url).is_none());
    }
}
