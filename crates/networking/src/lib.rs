//! Per-tab network request mediation for the browser.
//!
//! This crate handles:
//! - Per-navigation network policy (languages, user agent, tracking, referrer)
//! - Cookie policy enforcement in front of a cookie store
//! - Request interception (content blocking, offline mode, local listings)
//! - Transfer statistics and document load progress
//! - Authentication and certificate challenges

pub mod challenge;
pub mod config;
pub mod context;
pub mod cookie_gate;
pub mod cookies;
pub mod factory;
pub mod headers;
pub mod interceptor;
pub mod listing;
pub mod manager;
pub mod observer;
pub mod policy;
pub mod request;
pub mod response;
pub mod timer;
pub mod tracker;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use challenge::{
    CertificateDecision, CertificateOutcome, CertificatePrompt, ChallengeRouter, ChallengeTarget, CredentialPrompt,
    DismissSignal, PromptDismisser, UiDelegate,
};
pub use config::NetworkConfig;
pub use context::{BrowsingContext, PageContext};
pub use cookie_gate::{CookiePolicyGate, CookieStorageMode, PendingCookie};
pub use cookies::{Cookie, CookieJar, CookieStore};
pub use factory::{NetworkFactory, NetworkFactoryBuilder};
pub use headers::HeaderMap;
pub use interceptor::{InterceptDecision, RequestInterceptor};
pub use listing::DirectoryListing;
pub use manager::{NetworkManager, RequestOutcome};
pub use observer::{LoadProgress, NetworkObserver, Observers, SubscriptionId};
pub use policy::{CookieKeepMode, CookiePolicy, CookieSettings, DoNotTrackPolicy, EffectivePolicy};
pub use request::{CacheLoadControl, Operation, Request};
pub use response::{Rejection, SyntheticResponse};
pub use timer::{ManualTicker, TickScheduler, TimerId, TokioTicker};
pub use tracker::{InFlightRequest, TransferStatistics, TransferTracker};
pub use transport::{
    Authenticator, CacheProvider, CertificateError, CertificateErrorKind, ContentBlocker, Credentials, OperationHandle,
    Transport, TransportError, TransportEvent, TransportFactory,
};
