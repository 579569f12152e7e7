//! Cookie storage.
//!
//! [`CookieStore`] is the storage seam the cookie policy gate sits in front
//! of; [`CookieJar`] is the in-memory store used for private contexts and as
//! the default shared store.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

/// A cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Domain, without a leading dot. Empty until stored.
    pub domain: String,
    /// Path. Empty until stored.
    pub path: String,
    /// Expiration time (Unix timestamp); `None` for session cookies.
    pub expires: Option<u64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

/// SameSite attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    None,
    Lax,
    Strict,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Cookie {
    /// Create a session cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: String::new(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: SameSite::Lax,
        }
    }

    /// Parse a Set-Cookie header value.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';').map(|s| s.trim());

        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim());

        for attr in parts {
            let (attr_name, attr_value) = attr
                .split_once('=')
                .map(|(n, v)| (n.trim().to_lowercase(), Some(v.trim())))
                .unwrap_or_else(|| (attr.trim().to_lowercase(), None));

            match attr_name.as_str() {
                "domain" => {
                    if let Some(domain) = attr_value {
                        cookie.domain = domain.trim_start_matches('.').to_lowercase();
                    }
                }
                "path" => cookie.path = attr_value.unwrap_or_default().to_string(),
                "max-age" => {
                    if let Some(seconds) = attr_value.and_then(|s| s.parse::<i64>().ok()) {
                        cookie.expires = Some(if seconds <= 0 {
                            0
                        } else {
                            now().saturating_add(seconds as u64)
                        });
                    }
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "samesite" => {
                    cookie.same_site = match attr_value.map(|s| s.to_lowercase()).as_deref() {
                        Some("strict") => SameSite::Strict,
                        Some("none") => SameSite::None,
                        _ => SameSite::Lax,
                    };
                }
                _ => {}
            }
        }

        Some(cookie)
    }

    /// Session cookies are dropped when the browser exits.
    pub fn is_session(&self) -> bool {
        self.expires.is_none()
    }

    /// Strip the expiration so the cookie only lives for this session.
    pub fn make_session(&mut self) {
        self.expires = None;
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.expires, Some(expires) if expires <= now())
    }

    /// Same name, domain and path.
    pub fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Check if the cookie should be sent to `url`.
    pub fn matches_url(&self, url: &Url) -> bool {
        if self.secure && url.scheme() != "https" {
            return false;
        }

        let host = url.host_str().unwrap_or("").to_lowercase();
        if !domain_matches(&host, &self.domain) {
            return false;
        }

        path_matches(url.path(), &self.path)
    }

    /// Fill in domain and path defaults from the URL that set the cookie.
    pub(crate) fn normalize_for(&mut self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or("").to_lowercase();

        if self.domain.is_empty() {
            self.domain = host;
        } else if !domain_matches(&host, &self.domain) {
            return false;
        }

        if !self.path.starts_with('/') {
            self.path = default_path(url);
        }

        true
    }

    fn key(&self) -> String {
        format!("{};{}", self.path, self.name)
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

/// Cookie storage backing a cookie policy gate.
pub trait CookieStore: Send + Sync {
    /// Cookies to send with a request to `url`.
    fn cookies_for_url(&self, url: &Url) -> Vec<Cookie>;

    /// Store cookies received from `url`. Returns whether anything changed.
    fn set_cookies_from_url(&self, cookies: Vec<Cookie>, url: &Url) -> bool;

    /// Whether a cookie with the same identity is stored.
    fn contains(&self, cookie: &Cookie) -> bool;

    /// Delete a stored cookie.
    fn delete(&self, cookie: &Cookie) -> bool;

    fn all_cookies(&self) -> Vec<Cookie>;
}

/// In-memory cookie jar.
#[derive(Debug, Default)]
pub struct CookieJar {
    /// Cookies indexed by domain, then by path and name.
    cookies: RwLock<HashMap<String, IndexMap<String, Cookie>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cookie from a Set-Cookie response header.
    pub fn add_from_response(&self, url: &Url, header: &str) -> bool {
        match Cookie::parse(header) {
            Some(cookie) => self.set_cookies_from_url(vec![cookie], url),
            None => false,
        }
    }

    /// Get the Cookie header value for a URL.
    pub fn cookie_header(&self, url: &Url) -> String {
        self.cookies_for_url(url)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Drop session cookies (browser exit).
    pub fn clear_session_cookies(&self) {
        for cookies in self.cookies.write().values_mut() {
            cookies.retain(|_, cookie| !cookie.is_session());
        }
    }

    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.read().values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop expired cookies and the domains left empty.
fn purge_expired(jar: &mut HashMap<String, IndexMap<String, Cookie>>) {
    jar.retain(|_, cookies| {
        cookies.retain(|_, cookie| !cookie.is_expired());
        !cookies.is_empty()
    });
}

impl CookieStore for CookieJar {
    fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
        let cookies = self.cookies.read();
        let mut result: Vec<Cookie> = cookies
            .values()
            .flat_map(|c| c.values())
            .filter(|cookie| !cookie.is_expired() && cookie.matches_url(url))
            .cloned()
            .collect();

        // Longer paths first.
        result.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        result
    }

    fn set_cookies_from_url(&self, cookies: Vec<Cookie>, url: &Url) -> bool {
        let mut changed = false;
        let mut jar = self.cookies.write();
        purge_expired(&mut jar);

        for mut cookie in cookies {
            if !cookie.normalize_for(url) {
                tracing::debug!("Rejecting cookie {} for foreign domain {}", cookie.name, cookie.domain);
                continue;
            }

            let domain_cookies = jar.entry(cookie.domain.clone()).or_default();
            if cookie.is_expired() {
                changed |= domain_cookies.shift_remove(&cookie.key()).is_some();
            } else {
                domain_cookies.insert(cookie.key(), cookie);
                changed = true;
            }
        }

        changed
    }

    fn contains(&self, cookie: &Cookie) -> bool {
        self.cookies
            .read()
            .get(&cookie.domain)
            .and_then(|c| c.get(&cookie.key()))
            .is_some_and(|stored| !stored.is_expired())
    }

    fn delete(&self, cookie: &Cookie) -> bool {
        self.cookies
            .write()
            .get_mut(&cookie.domain)
            .map(|c| c.shift_remove(&cookie.key()).is_some())
            .unwrap_or(false)
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.cookies
            .read()
            .values()
            .flat_map(|c| c.values().cloned())
            .collect()
    }
}
