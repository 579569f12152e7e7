//! The transport seam: the HTTP stack that actually performs requests.
//!
//! The manager never talks to sockets. It hands intercepted requests to a
//! [`Transport`] and is fed back [`TransportEvent`]s by the embedder's event
//! loop.

use crate::cookie_gate::CookiePolicyGate;
use crate::headers::HeaderMap;
use crate::request::{Operation, Request};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Identifies one operation submitted to a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationHandle(pub u64);

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transport failures reported on completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Host not found: {0}")]
    HostNotFound(String),
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Timeout")]
    Timeout,
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("{0}")]
    Other(String),
}

/// Kind of certificate validation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateErrorKind {
    /// Sentinel the transport may report; never blocks a request.
    NoError,
    Expired,
    NotYetValid,
    SelfSigned,
    HostnameMismatch,
    UntrustedRoot,
    Revoked,
    Other,
}

/// A certificate validation failure for one certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateError {
    pub kind: CertificateErrorKind,
    pub message: String,
    /// Base64 SHA-256 digest of the certificate.
    pub fingerprint: String,
}

impl CertificateError {
    /// Build an error for the DER-encoded certificate `der`.
    pub fn new(kind: CertificateErrorKind, message: impl Into<String>, der: &[u8]) -> Self {
        Self {
            kind,
            message: message.into(),
            fingerprint: fingerprint(der),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind != CertificateErrorKind::NoError
    }
}

/// Base64 SHA-256 digest of DER certificate bytes.
pub fn fingerprint(der: &[u8]) -> String {
    BASE64.encode(Sha256::digest(der))
}

/// Username and password for a challenge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Credential slot the transport passes with an authentication challenge.
/// Left empty, the challenge fails.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Authenticator {
    pub realm: String,
    credentials: Option<Credentials>,
}

impl Authenticator {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            credentials: None,
        }
    }

    pub fn fill(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_none()
    }
}

/// Notifications a transport delivers for its operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    DownloadProgress {
        handle: OperationHandle,
        received: u64,
        /// `None` while the size is unknown.
        total: Option<u64>,
    },
    Finished {
        handle: OperationHandle,
        outcome: Result<(), TransportError>,
    },
    CertificateErrors {
        handle: OperationHandle,
        errors: Vec<CertificateError>,
    },
    /// The server at `url` wants credentials. The answer goes back through
    /// [`Transport::authenticate`].
    AuthenticationRequired {
        handle: OperationHandle,
        url: Url,
        authenticator: Authenticator,
    },
    ProxyAuthenticationRequired {
        handle: OperationHandle,
        proxy_host: String,
        authenticator: Authenticator,
    },
}

/// An HTTP stack that performs submitted requests asynchronously.
pub trait Transport: Send {
    /// Start an operation. Progress and completion arrive as events.
    fn submit(&mut self, request: Request, operation: &Operation, body: Option<Bytes>) -> OperationHandle;

    /// Response headers received so far for `handle`.
    fn response_headers(&self, handle: OperationHandle) -> Option<HeaderMap>;

    /// Let `handle` proceed despite the given certificate errors.
    fn ignore_certificate_errors(&mut self, handle: OperationHandle, errors: &[CertificateError]);

    /// Answer an authentication challenge raised for `handle`. An empty
    /// authenticator fails the challenge.
    fn authenticate(&mut self, handle: OperationHandle, authenticator: Authenticator);
}

/// Creates the transport for a manager.
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        cache: Option<Arc<dyn CacheProvider>>,
        cookies: Arc<CookiePolicyGate>,
    ) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(Option<Arc<dyn CacheProvider>>, Arc<CookiePolicyGate>) -> Box<dyn Transport> + Send + Sync,
{
    fn create(
        &self,
        cache: Option<Arc<dyn CacheProvider>>,
        cookies: Arc<CookiePolicyGate>,
    ) -> Box<dyn Transport> {
        self(cache, cookies)
    }
}

/// Response cache shared by non-private managers.
pub trait CacheProvider: Send + Sync {
    fn get(&self, url: &Url) -> Option<Bytes>;
    fn put(&self, url: &Url, data: Bytes);
    fn remove(&self, url: &Url) -> bool;
    fn clear(&self);
}

/// Content-blocking verdict.
pub trait ContentBlocker: Send + Sync {
    fn is_blocked(&self, profiles: &[String], request: &Request, context_url: Option<&Url>) -> bool;
}

impl<F> ContentBlocker for F
where
    F: Fn(&[String], &Request, Option<&Url>) -> bool + Send + Sync,
{
    fn is_blocked(&self, profiles: &[String], request: &Request, context_url: Option<&Url>) -> bool {
        self(profiles, request, context_url)
    }
}

/// Blocker that lets everything through.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl ContentBlocker for AllowAll {
    fn is_blocked(&self, _profiles: &[String], _request: &Request, _context_url: Option<&Url>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_base64_sha256() {
        let fp = fingerprint(b"certificate");
        assert_eq!(fp.len(), 44);
        assert!(fp.ends_with('='));
        assert_eq!(fp, fingerprint(b"certificate"));
        assert_ne!(fp, fingerprint(b"other certificate"));
    }

    #[test]
    fn test_certificate_error() {
        let error = CertificateError::new(CertificateErrorKind::SelfSigned, "Self-signed", b"der");
        assert!(error.is_error());
        assert_eq!(error.fingerprint, fingerprint(b"der"));

        let none = CertificateError::new(CertificateErrorKind::NoError, "", b"der");
        assert!(!none.is_error());
    }

    #[test]
    fn test_authenticator() {
        let mut auth = Authenticator::new("Admin area");
        assert!(auth.is_empty());

        auth.fill(Credentials::new("alice", "secret"));
        assert_eq!(auth.credentials().map(|c| c.user.as_str()), Some("alice"));
    }

    #[test]
    fn test_closure_blocker() {
        let blocker = |_: &[String], request: &Request, _: Option<&Url>| {
            request.url.host_str() == Some("ads.example.com")
        };
        let ad = Request::new(Url::parse("https://ads.example.com/banner").unwrap());
        let page = Request::new(Url::parse("https://example.com/").unwrap());

        assert!(blocker.is_blocked(&[], &ad, None));
        assert!(!blocker.is_blocked(&[], &page, None));
        assert!(!AllowAll.is_blocked(&[], &ad, None));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "Timeout");
        assert_eq!(
            TransportError::HostNotFound("example.invalid".into()).to_string(),
            "Host not found: example.invalid"
        );
        assert_eq!(OperationHandle(7).to_string(), "#7");
    }
}
