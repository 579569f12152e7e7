//! Entry point for every outgoing request.

use crate::challenge::UiDelegate;
use crate::config::NetworkConfig;
use crate::context::BrowsingContext;
use crate::headers::{content_type, names};
use crate::listing::DirectoryListing;
use crate::observer::Observers;
use crate::policy::EffectivePolicy;
use crate::request::{CacheLoadControl, Operation, Request};
use crate::response::{Rejection, SyntheticResponse};
use crate::tracker::TransferTracker;
use crate::transport::ContentBlocker;
use bytes::Bytes;
use common::{Console, MessageCategory, MessageLevel};
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// What to do with an intercepted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Submit the rewritten request to the transport.
    Proceed(Request),
    /// Answer locally.
    Synthesize(SyntheticResponse),
    /// Refuse the request.
    Block(Rejection),
}

/// Applies policy to outgoing requests.
pub struct RequestInterceptor {
    context: Arc<dyn BrowsingContext>,
    config: Arc<NetworkConfig>,
    blocker: Arc<dyn ContentBlocker>,
    console: Arc<dyn Console>,
    ui: Arc<dyn UiDelegate>,
    observers: Arc<Observers>,
    policy: EffectivePolicy,
    form_request: Option<Url>,
}

impl RequestInterceptor {
    pub fn new(
        context: Arc<dyn BrowsingContext>,
        config: Arc<NetworkConfig>,
        blocker: Arc<dyn ContentBlocker>,
        console: Arc<dyn Console>,
        ui: Arc<dyn UiDelegate>,
        observers: Arc<Observers>,
    ) -> Self {
        let policy = EffectivePolicy::initial(&config);
        Self {
            context,
            config,
            blocker,
            console,
            ui,
            observers,
            policy,
            form_request: None,
        }
    }

    pub fn policy(&self) -> &EffectivePolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: EffectivePolicy) {
        self.policy = policy;
    }

    pub fn context(&self) -> &Arc<dyn BrowsingContext> {
        &self.context
    }

    pub fn set_context(&mut self, context: Arc<dyn BrowsingContext>) {
        self.context = context;
    }

    /// Arm form resubmission: the next request to `url` is handed to the UI.
    pub fn set_form_request(&mut self, url: Url) {
        self.form_request = Some(url);
    }

    pub fn form_request(&self) -> Option<&Url> {
        self.form_request.as_ref()
    }

    pub fn intercept(
        &mut self,
        operation: &Operation,
        mut request: Request,
        body: Option<Bytes>,
        tracker: &mut TransferTracker,
        working_offline: bool,
    ) -> InterceptDecision {
        if self.form_request.as_ref() == Some(&request.url) {
            self.form_request = None;
            debug!("Handing form request to {} to the UI", request.url);
            self.ui.open_form_request(&request.url, operation, body);
            return InterceptDecision::Synthesize(SyntheticResponse::Empty);
        }

        tracker.request_started();

        let context_url = self.context.url();
        let profiles = self.context.content_blocking_profiles();
        if self.blocker.is_blocked(&profiles, &request, context_url.as_ref()) {
            self.console.add_message(
                &format!("Blocked content: {}", request.url),
                MessageCategory::Network,
                MessageLevel::Log,
            );
            return InterceptDecision::Block(Rejection::blocked(request.url));
        }

        if *operation == Operation::Get {
            if let Some(listing) = local_directory_listing(&request.url) {
                debug!("Listing local directory {}", request.url);
                return InterceptDecision::Synthesize(SyntheticResponse::DirectoryListing(listing));
            }
        }

        self.rewrite(operation, &mut request, working_offline);

        self.observers
            .message_changed(&format!("Sending request to {}…", request.display_host()));

        InterceptDecision::Proceed(request)
    }

    fn rewrite(&self, operation: &Operation, request: &mut Request, working_offline: bool) {
        let policy = &self.policy;

        if !policy.can_send_referrer {
            request.headers.remove(names::REFERER);
        }

        if *operation == Operation::Post && request.headers.content_type().is_none() {
            request.headers.insert(names::CONTENT_TYPE, content_type::FORM);
        }

        if working_offline {
            request.cache_load = CacheLoadControl::AlwaysCache;
        } else if let Some(value) = policy.do_not_track.header_value() {
            request.headers.insert(names::DNT, value);
        }

        let accept_language = if policy.accept_language.is_empty() {
            self.config.default_accept_language()
        } else {
            policy.accept_language.clone()
        };
        request.headers.insert(names::ACCEPT_LANGUAGE, accept_language);
        request.headers.insert(names::USER_AGENT, policy.user_agent.as_str());

        trace!("Rewrote request to {}: {}", request.url, request.headers);
    }
}

/// Listing for a `file:` URL naming a directory.
fn local_directory_listing(url: &Url) -> Option<DirectoryListing> {
    if url.scheme() != "file" {
        return None;
    }
    let path = url.to_file_path().ok()?;
    path.is_dir().then(|| DirectoryListing::read(url, &path))
}
