//! Outgoing request description.

use crate::headers::HeaderMap;
use http::Method;
use std::fmt;
use url::Url;

/// Kind of operation the page asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Head,
    Get,
    Put,
    Post,
    Delete,
    Custom(Method),
}

impl Operation {
    /// HTTP method for this operation.
    pub fn method(&self) -> Method {
        match self {
            Operation::Head => Method::HEAD,
            Operation::Get => Method::GET,
            Operation::Put => Method::PUT,
            Operation::Post => Method::POST,
            Operation::Delete => Method::DELETE,
            Operation::Custom(method) => method.clone(),
        }
    }
}

impl From<Method> for Operation {
    fn from(method: Method) -> Self {
        match method {
            Method::HEAD => Operation::Head,
            Method::GET => Operation::Get,
            Method::PUT => Operation::Put,
            Method::POST => Operation::Post,
            Method::DELETE => Operation::Delete,
            other => Operation::Custom(other),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method().as_str())
    }
}

/// How the transport may use its cache for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheLoadControl {
    AlwaysNetwork,
    #[default]
    PreferNetwork,
    PreferCache,
    /// Only serve from cache; used while working offline.
    AlwaysCache,
}

/// An outgoing request as seen by the interceptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub headers: HeaderMap,
    pub cache_load: CacheLoadControl,
}

impl Request {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            cache_load: CacheLoadControl::default(),
        }
    }

    /// Set a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Host shown in status messages; local files have none.
    pub fn display_host(&self) -> &str {
        display_host(&self.url)
    }
}

/// Host of `url`, or `localhost` when it has none.
pub fn display_host(url: &Url) -> &str {
    match url.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => "localhost",
    }
}
