//! Per-tab network manager.
//!
//! A [`NetworkManager`] mediates all traffic of one browsing context. The
//! embedder's event loop calls [`NetworkManager::create_request`] for every
//! request the page makes, and forwards transport notifications and status
//! ticks back to the manager that owns the operation.

use crate::challenge::{CertificateOutcome, ChallengeRouter, PromptDismisser, UiDelegate};
use crate::context::BrowsingContext;
use crate::cookie_gate::CookiePolicyGate;
use crate::factory::NetworkFactory;
use crate::headers::HeaderMap;
use crate::interceptor::{InterceptDecision, RequestInterceptor};
use crate::observer::{NetworkObserver, Observers, SubscriptionId};
use crate::policy::EffectivePolicy;
use crate::request::{Operation, Request};
use crate::response::{Rejection, SyntheticResponse};
use crate::timer::TimerId;
use crate::tracker::{TransferStatistics, TransferTracker};
use crate::transport::{
    Authenticator, CacheProvider, CertificateError, OperationHandle, Transport, TransportError, TransportEvent,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// What became of a request handed to [`NetworkManager::create_request`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Submitted to the transport.
    Submitted(OperationHandle),
    /// Answered locally.
    Synthesized(SyntheticResponse),
    /// Refused before reaching the transport.
    Blocked(Rejection),
}

/// Network manager for one browsing context.
pub struct NetworkManager {
    factory: Arc<NetworkFactory>,
    context: Arc<dyn BrowsingContext>,
    cookies: Arc<CookiePolicyGate>,
    cache: Option<Arc<dyn CacheProvider>>,
    transport: Box<dyn Transport>,
    interceptor: RequestInterceptor,
    tracker: TransferTracker,
    challenges: ChallengeRouter,
    observers: Arc<Observers>,
    private: bool,
}

impl NetworkManager {
    /// Build a manager. Private managers keep cookies in their own store and
    /// use no cache.
    pub fn new(
        factory: Arc<NetworkFactory>,
        context: Arc<dyn BrowsingContext>,
        ui: Arc<dyn UiDelegate>,
        private: bool,
    ) -> Self {
        let cookies = Arc::new(factory.cookie_gate(private));
        Self::with_cookies(factory, context, ui, private, cookies)
    }

    fn with_cookies(
        factory: Arc<NetworkFactory>,
        context: Arc<dyn BrowsingContext>,
        ui: Arc<dyn UiDelegate>,
        private: bool,
        cookies: Arc<CookiePolicyGate>,
    ) -> Self {
        let cache = if private { None } else { factory.cache().cloned() };
        let transport = factory.create_transport(cache.clone(), cookies.clone());
        let observers = Arc::new(Observers::new());
        let config = factory.config().clone();

        cookies.set_context(context.url());

        let interceptor = RequestInterceptor::new(
            context.clone(),
            config.clone(),
            factory.content_blocker().clone(),
            factory.console().clone(),
            ui.clone(),
            observers.clone(),
        );
        let tracker = TransferTracker::new(factory.ticker().clone(), config.status_interval(), observers.clone());
        let challenges = ChallengeRouter::new(ui, PromptDismisser::new(), observers.clone());

        debug!("Created {} network manager", if private { "private" } else { "shared" });

        Self {
            factory,
            context,
            cookies,
            cache,
            transport,
            interceptor,
            tracker,
            challenges,
            observers,
            private,
        }
    }

    /// Manager for a context spawned from this one (e.g. a popup). It shares
    /// the cookie store and privacy mode.
    pub fn clone_for_context(&self, context: Arc<dyn BrowsingContext>, ui: Arc<dyn UiDelegate>) -> Self {
        let cookies = Arc::new(self.cookies.clone_for_context(context.url()));
        Self::with_cookies(self.factory.clone(), context, ui, self.private, cookies)
    }

    /// The context is about to load `url`: dismiss pending prompts, forget the
    /// previous load and recompute the policy.
    pub fn begin_navigation(&mut self, url: &Url) {
        self.challenges.dismisser().dismiss_all();
        self.tracker.reset();
        self.update_options(Some(url));
        self.cookies.set_context(Some(url.clone()));
    }

    /// Recompute the effective policy for `url`.
    pub fn update_options(&mut self, url: Option<&Url>) {
        let policy = EffectivePolicy::resolve(self.context.as_ref(), url, self.factory.config());
        debug!(?policy, "Network options updated");
        self.cookies.setup(policy.cookie_settings());
        self.interceptor.set_policy(policy);
    }

    pub fn policy(&self) -> &EffectivePolicy {
        self.interceptor.policy()
    }

    /// Hand the next request to `url` to the UI instead of the transport.
    pub fn set_form_request(&mut self, url: Url) {
        self.interceptor.set_form_request(url);
    }

    /// Attach the manager to another browsing context.
    pub fn set_context(&mut self, context: Arc<dyn BrowsingContext>) {
        self.cookies.set_context(context.url());
        self.interceptor.set_context(context.clone());
        self.context = context;
    }

    pub fn context(&self) -> &Arc<dyn BrowsingContext> {
        &self.context
    }

    pub fn create_request(&mut self, operation: Operation, request: Request, body: Option<Bytes>) -> RequestOutcome {
        let offline = self.factory.is_working_offline();
        match self
            .interceptor
            .intercept(&operation, request, body.clone(), &mut self.tracker, offline)
        {
            InterceptDecision::Proceed(request) => {
                let url = request.url.clone();
                let handle = self.transport.submit(request, &operation, body);
                self.tracker.track(handle, url);
                RequestOutcome::Submitted(handle)
            }
            InterceptDecision::Synthesize(response) => RequestOutcome::Synthesized(response),
            InterceptDecision::Block(rejection) => RequestOutcome::Blocked(rejection),
        }
    }

    pub fn on_download_progress(&mut self, handle: OperationHandle, received: u64, total: Option<u64>) {
        let redirected = self.tracker.is_primary(handle)
            && self
                .transport
                .response_headers(handle)
                .map_or(false, |headers| headers.location().is_some());
        self.tracker.on_progress(handle, received, total, redirected);
    }

    pub fn on_finished(&mut self, handle: OperationHandle, outcome: Result<(), TransportError>) {
        if let Err(e) = &outcome {
            warn!("Request {} failed: {}", handle, e);
        }
        self.tracker.on_finished(handle);
    }

    pub fn on_authentication_required(&mut self, url: &Url, authenticator: &mut Authenticator) {
        self.challenges.on_authentication_required(url, authenticator);
    }

    pub fn on_proxy_authentication_required(&mut self, proxy_host: &str, authenticator: &mut Authenticator) {
        let use_system = self.factory.is_using_system_proxy_authentication();
        self.challenges
            .on_proxy_authentication_required(proxy_host, authenticator, use_system);
    }

    pub fn on_certificate_errors(&mut self, handle: OperationHandle, errors: &[CertificateError]) -> CertificateOutcome {
        self.challenges.on_certificate_errors(
            handle,
            errors,
            self.context.as_ref(),
            self.factory.settings().as_ref(),
            self.transport.as_mut(),
        )
    }

    /// Route a transport notification. Authentication challenges are
    /// answered through [`Transport::authenticate`].
    pub fn dispatch(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::DownloadProgress { handle, received, total } => {
                self.on_download_progress(handle, received, total)
            }
            TransportEvent::Finished { handle, outcome } => self.on_finished(handle, outcome),
            TransportEvent::CertificateErrors { handle, errors } => {
                self.on_certificate_errors(handle, &errors);
            }
            TransportEvent::AuthenticationRequired {
                handle,
                url,
                mut authenticator,
            } => {
                self.on_authentication_required(&url, &mut authenticator);
                self.transport.authenticate(handle, authenticator);
            }
            TransportEvent::ProxyAuthenticationRequired {
                handle,
                proxy_host,
                mut authenticator,
            } => {
                self.on_proxy_authentication_required(&proxy_host, &mut authenticator);
                self.transport.authenticate(handle, authenticator);
            }
        }
    }

    /// Status tick from the ticker. Returns whether it belonged to this manager.
    pub fn on_status_tick(&mut self, id: TimerId) -> bool {
        self.tracker.on_tick(id)
    }

    pub fn statistics(&self) -> TransferStatistics {
        self.tracker.statistics()
    }

    /// Response headers of the primary request.
    pub fn headers(&self) -> HeaderMap {
        self.tracker
            .primary()
            .and_then(|handle| self.transport.response_headers(handle))
            .unwrap_or_default()
    }

    pub fn cookie_store(&self) -> &Arc<CookiePolicyGate> {
        &self.cookies
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheProvider>> {
        self.cache.as_ref()
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn subscribe(&self, observer: Arc<dyn NetworkObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Handle for dismissing prompts while the manager is busy with one.
    pub fn prompt_dismisser(&self) -> PromptDismisser {
        self.challenges.dismisser().clone()
    }
}
