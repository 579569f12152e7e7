//! Cookie policy enforcement in front of a cookie store.

use crate::cookies::{Cookie, CookieJar, CookieStore};
use crate::policy::{CookieKeepMode, CookiePolicy, CookieSettings};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Where the gate's cookies live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CookieStorageMode {
    /// Private store, discarded with the gate.
    Ephemeral,
    /// Process-wide store shared by every non-private context.
    Shared,
}

/// A cookie waiting for the user to decide whether to keep it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCookie {
    pub cookie: Cookie,
    pub url: Url,
}

#[derive(Debug, Default)]
struct GateState {
    settings: CookieSettings,
    context_url: Option<Url>,
    pending: Vec<PendingCookie>,
}

/// Applies the effective cookie policy to every read and write the
/// transport makes.
pub struct CookiePolicyGate {
    store: Arc<dyn CookieStore>,
    mode: CookieStorageMode,
    state: RwLock<GateState>,
    /// Serializes check-then-write sequences across gates sharing a store.
    write_lock: Arc<Mutex<()>>,
}

impl CookiePolicyGate {
    /// Gate over a fresh private store.
    pub fn ephemeral() -> Self {
        Self::with_store(Arc::new(CookieJar::new()), CookieStorageMode::Ephemeral, Arc::default())
    }

    /// Gate over a shared persistent store. Every gate over the same store
    /// must be given the same `write_lock`.
    pub fn shared(store: Arc<dyn CookieStore>, write_lock: Arc<Mutex<()>>) -> Self {
        Self::with_store(store, CookieStorageMode::Shared, write_lock)
    }

    fn with_store(store: Arc<dyn CookieStore>, mode: CookieStorageMode, write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            store,
            mode,
            state: RwLock::new(GateState::default()),
            write_lock,
        }
    }

    /// Gate for a spawned context: same store, same policy, new context URL.
    pub fn clone_for_context(&self, context_url: Option<Url>) -> Self {
        let gate = Self::with_store(self.store.clone(), self.mode, self.write_lock.clone());
        {
            let mut state = gate.state.write();
            state.settings = self.settings();
            state.context_url = context_url;
        }
        gate
    }

    /// Apply a newly resolved cookie policy.
    pub fn setup(&self, settings: CookieSettings) {
        debug!(?settings, "Cookie policy updated");
        self.state.write().settings = settings;
    }

    pub fn settings(&self) -> CookieSettings {
        self.state.read().settings
    }

    /// Change the context the gate judges third-party requests against.
    /// Policy and pending cookies are kept.
    pub fn set_context(&self, context_url: Option<Url>) {
        self.state.write().context_url = context_url;
    }

    pub fn context_url(&self) -> Option<Url> {
        self.state.read().context_url.clone()
    }

    pub fn mode(&self) -> CookieStorageMode {
        self.mode
    }

    pub fn store(&self) -> Arc<dyn CookieStore> {
        self.store.clone()
    }

    /// Whether both gates serialize their writes on the same lock.
    pub fn shares_write_lock(&self, other: &CookiePolicyGate) -> bool {
        Arc::ptr_eq(&self.write_lock, &other.write_lock)
    }

    /// Whether `url` belongs to a different site than the context.
    pub fn is_third_party(&self, url: &Url) -> bool {
        let state = self.state.read();
        match (&state.context_url, url.host_str()) {
            (Some(context), Some(host)) => match context.host_str() {
                Some(context_host) => site(context_host) != site(host),
                None => false,
            },
            _ => false,
        }
    }

    fn policy_for(&self, url: &Url) -> CookiePolicy {
        let settings = self.settings();
        if self.is_third_party(url) {
            settings.third_party
        } else {
            settings.first_party
        }
    }

    /// Cookies to send to `url`, subject to policy.
    pub fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
        if !self.policy_for(url).allows_read() {
            trace!("Cookie read denied for {}", url);
            return Vec::new();
        }
        self.store.cookies_for_url(url)
    }

    /// Store cookies set by `url`, subject to policy and keep mode.
    pub fn set_cookies_from_url(&self, cookies: Vec<Cookie>, url: &Url) -> bool {
        let policy = self.policy_for(url);
        let _guard = self.write_lock.lock();

        let cookies: Vec<Cookie> = match policy {
            CookiePolicy::Ignore | CookiePolicy::ReadOnly => {
                debug!("Cookie write denied for {} ({:?})", url, policy);
                return false;
            }
            CookiePolicy::AcceptExisting => cookies
                .into_iter()
                .filter_map(|mut cookie| {
                    (cookie.normalize_for(url) && self.store.contains(&cookie)).then_some(cookie)
                })
                .collect(),
            CookiePolicy::AcceptAll => cookies,
        };

        if cookies.is_empty() {
            return false;
        }

        match self.settings().keep_mode {
            CookieKeepMode::UntilExpires => self.store.set_cookies_from_url(cookies, url),
            CookieKeepMode::UntilExit => {
                let cookies = cookies
                    .into_iter()
                    .map(|mut cookie| {
                        cookie.make_session();
                        cookie
                    })
                    .collect();
                self.store.set_cookies_from_url(cookies, url)
            }
            CookieKeepMode::AskToKeep => {
                let mut state = self.state.write();
                for cookie in cookies {
                    state.pending.push(PendingCookie {
                        cookie,
                        url: url.clone(),
                    });
                }
                false
            }
        }
    }

    /// Cookies waiting for a keep decision.
    pub fn pending_cookies(&self) -> Vec<PendingCookie> {
        self.state.read().pending.clone()
    }

    /// Remove and return the cookies waiting for a keep decision.
    pub fn take_pending(&self) -> Vec<PendingCookie> {
        std::mem::take(&mut self.state.write().pending)
    }

    /// Store cookies the user chose to keep.
    pub fn keep_pending(&self, accepted: Vec<PendingCookie>) -> bool {
        let _guard = self.write_lock.lock();
        let mut changed = false;
        for pending in accepted {
            changed |= self.store.set_cookies_from_url(vec![pending.cookie], &pending.url);
        }
        changed
    }
}

impl CookieStore for CookiePolicyGate {
    fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
        CookiePolicyGate::cookies_for_url(self, url)
    }

    fn set_cookies_from_url(&self, cookies: Vec<Cookie>, url: &Url) -> bool {
        CookiePolicyGate::set_cookies_from_url(self, cookies, url)
    }

    fn contains(&self, cookie: &Cookie) -> bool {
        self.store.contains(cookie)
    }

    fn delete(&self, cookie: &Cookie) -> bool {
        let _guard = self.write_lock.lock();
        self.store.delete(cookie)
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.store.all_cookies()
    }
}

/// Registrable domain (eTLD+1) of a host. IP addresses and hosts without
/// a registrable part are their own site.
fn site(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    if host.starts_with('[') || host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }
    match psl::domain_str(&host) {
        Some(domain) => domain.to_string(),
        None => host,
    }
}
