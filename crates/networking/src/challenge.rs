//! Authentication and certificate challenges.
//!
//! Challenges are answered by a modal prompt from the [`UiDelegate`]. A
//! pending prompt can be dismissed from outside through a
//! [`PromptDismisser`], e.g. when the page starts a new navigation; a
//! dismissed prompt always fails closed.

use crate::context::BrowsingContext;
use crate::observer::Observers;
use crate::request::Operation;
use crate::transport::{Authenticator, CertificateError, Credentials, OperationHandle, Transport};
use bytes::Bytes;
use common::{SettingKey, SettingValue, Settings};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Dismisses every prompt shown before the call.
#[derive(Clone, Debug, Default)]
pub struct PromptDismisser {
    generation: Arc<AtomicU64>,
}

impl PromptDismisser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dismiss_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Signal for a prompt about to be shown.
    pub fn signal(&self) -> DismissSignal {
        DismissSignal {
            generation: self.generation.clone(),
            issued: self.generation.load(Ordering::SeqCst),
        }
    }
}

/// Tells a prompt whether it has been dismissed. UI implementations poll it
/// while waiting for the user.
#[derive(Clone, Debug)]
pub struct DismissSignal {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl DismissSignal {
    pub fn is_dismissed(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.issued
    }
}

/// Who is asking for credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChallengeTarget {
    Server(Url),
    Proxy(String),
}

impl fmt::Display for ChallengeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeTarget::Server(url) => write!(f, "{}", url),
            ChallengeTarget::Proxy(host) => write!(f, "proxy {}", host),
        }
    }
}

/// Credential prompt contents. Credentials start out empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialPrompt {
    pub target: ChallengeTarget,
    pub realm: String,
    pub credentials: Credentials,
}

/// Certificate warning contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificatePrompt {
    pub title: String,
    pub question: String,
    /// One line per blocking error.
    pub messages: Vec<String>,
    /// Whether to offer "Do not show this message again".
    pub offer_remember: bool,
}

impl CertificatePrompt {
    pub fn details(&self) -> String {
        self.messages.join("\n")
    }
}

/// User answer to a certificate warning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CertificateDecision {
    pub accepted: bool,
    pub remember: bool,
}

/// Interactive decisions made by the user.
pub trait UiDelegate: Send + Sync {
    /// Ask for credentials. `None` declines.
    fn request_credentials(&self, prompt: &CredentialPrompt, dismissed: &DismissSignal) -> Option<Credentials>;

    fn confirm_certificate_errors(&self, prompt: &CertificatePrompt, dismissed: &DismissSignal)
        -> CertificateDecision;

    /// Resubmit a form request through the UI (e.g. after a confirmation).
    fn open_form_request(&self, url: &Url, operation: &Operation, body: Option<Bytes>);
}

/// Result of a certificate challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateOutcome {
    /// Nothing to decide.
    NoErrors,
    /// Every error was already accepted for this site.
    AlreadyIgnored,
    Accepted { remembered: bool },
    Rejected,
}

/// Routes challenges to the UI.
pub struct ChallengeRouter {
    ui: Arc<dyn UiDelegate>,
    dismisser: PromptDismisser,
    observers: Arc<Observers>,
}

impl ChallengeRouter {
    pub fn new(ui: Arc<dyn UiDelegate>, dismisser: PromptDismisser, observers: Arc<Observers>) -> Self {
        Self { ui, dismisser, observers }
    }

    pub fn ui(&self) -> &Arc<dyn UiDelegate> {
        &self.ui
    }

    pub fn dismisser(&self) -> &PromptDismisser {
        &self.dismisser
    }

    pub fn on_authentication_required(&self, url: &Url, authenticator: &mut Authenticator) {
        self.prompt_credentials(ChallengeTarget::Server(url.clone()), authenticator);
    }

    pub fn on_proxy_authentication_required(
        &self,
        proxy_host: &str,
        authenticator: &mut Authenticator,
        use_system_authentication: bool,
    ) {
        if use_system_authentication {
            debug!("Answering proxy challenge from {} with system credentials", proxy_host);
            authenticator.fill(Credentials::default());
            return;
        }

        self.prompt_credentials(ChallengeTarget::Proxy(proxy_host.to_string()), authenticator);
    }

    fn prompt_credentials(&self, target: ChallengeTarget, authenticator: &mut Authenticator) {
        self.observers.message_changed("Waiting for authentication…");

        let prompt = CredentialPrompt {
            target,
            realm: authenticator.realm.clone(),
            credentials: Credentials::default(),
        };
        let signal = self.dismisser.signal();
        let answer = self.ui.request_credentials(&prompt, &signal);

        match answer {
            Some(credentials) if !signal.is_dismissed() => {
                debug!("Credentials provided for {}", prompt.target);
                authenticator.fill(credentials);
            }
            Some(_) => debug!("Credential prompt for {} was dismissed", prompt.target),
            None => debug!("Credential prompt for {} declined", prompt.target),
        }
    }

    /// Decide whether `handle` may proceed despite certificate errors.
    pub fn on_certificate_errors(
        &self,
        handle: OperationHandle,
        errors: &[CertificateError],
        context: &dyn BrowsingContext,
        settings: &dyn Settings,
        transport: &mut dyn Transport,
    ) -> CertificateOutcome {
        if errors.is_empty() {
            transport.ignore_certificate_errors(handle, errors);
            return CertificateOutcome::NoErrors;
        }

        let context_url = context.url();
        let mut ignored: Vec<String> = context
            .option(SettingKey::IgnoreSslErrors, context_url.as_ref())
            .as_list()
            .to_vec();

        let (known, blocking): (Vec<&CertificateError>, Vec<&CertificateError>) = errors
            .iter()
            .filter(|error| error.is_error())
            .partition(|error| ignored.contains(&error.fingerprint));

        if !known.is_empty() {
            let known: Vec<CertificateError> = known.into_iter().cloned().collect();
            debug!("Ignoring {} known certificate error(s) for {}", known.len(), handle);
            transport.ignore_certificate_errors(handle, &known);
        }

        if blocking.is_empty() {
            return CertificateOutcome::AlreadyIgnored;
        }

        let prompt = CertificatePrompt {
            title: "Warning".to_string(),
            question: "SSL errors occurred, do you want to continue?".to_string(),
            messages: blocking.iter().map(|error| error.message.clone()).collect(),
            offer_remember: context_url.is_some(),
        };
        let signal = self.dismisser.signal();
        let decision = self.ui.confirm_certificate_errors(&prompt, &signal);

        if !decision.accepted || signal.is_dismissed() {
            warn!("Certificate errors for {} not accepted: {}", handle, prompt.details());
            return CertificateOutcome::Rejected;
        }

        transport.ignore_certificate_errors(handle, errors);

        let remembered = match context_url {
            Some(url) if decision.remember && prompt.offer_remember => {
                for error in errors.iter().filter(|error| error.is_error()) {
                    if !ignored.contains(&error.fingerprint) {
                        ignored.push(error.fingerprint.clone());
                    }
                }
                match settings.set(SettingKey::IgnoreSslErrors, SettingValue::List(ignored), Some(&url)) {
                    Ok(()) => {
                        info!("Remembered certificate exception for {}", url);
                        true
                    }
                    Err(e) => {
                        warn!("Failed to remember certificate exception for {}: {}", url, e);
                        false
                    }
                }
            }
            _ => false,
        };

        CertificateOutcome::Accepted { remembered }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PageContext;
    use crate::test_support::{RecordingObserver, RecordingTransport, ScriptedUi};
    use crate::transport::{fingerprint, CertificateErrorKind};
    use common::MemorySettings;

    struct Fixture {
        router: ChallengeRouter,
        ui: Arc<ScriptedUi>,
        observer: Arc<RecordingObserver>,
        settings: Arc<MemorySettings>,
        context: PageContext,
        transport: RecordingTransport,
    }

    fn fixture() -> Fixture {
        let ui = Arc::new(ScriptedUi::default());
        let observers = Arc::new(Observers::new());
        let observer = Arc::new(RecordingObserver::default());
        observers.subscribe(observer.clone());
        let settings = Arc::new(MemorySettings::new());
        let context = PageContext::new(settings.clone());
        context.set_url(Some(Url::parse("https://bank.example/").unwrap()));

        Fixture {
            router: ChallengeRouter::new(ui.clone(), PromptDismisser::new(), observers),
            ui,
            observer,
            settings,
            context,
            transport: RecordingTransport::default(),
        }
    }

    fn error(kind: CertificateErrorKind, der: &[u8]) -> CertificateError {
        CertificateError::new(kind, format!("{:?}", kind), der)
    }

    impl Fixture {
        fn certificate_errors(&mut self, errors: &[CertificateError]) -> CertificateOutcome {
            self.router.on_certificate_errors(
                OperationHandle(1),
                errors,
                &self.context,
                self.settings.as_ref(),
                &mut self.transport,
            )
        }
    }

    #[test]
    fn test_dismisser_signal() {
        let dismisser = PromptDismisser::new();
        let signal = dismisser.signal();
        assert!(!signal.is_dismissed());

        dismisser.clone().dismiss_all();
        assert!(signal.is_dismissed());
        assert!(!dismisser.signal().is_dismissed());
    }

    #[test]
    fn test_authentication_accepted() {
        let f = fixture();
        f.ui.answer_credentials(Some(Credentials::new("alice", "secret")));
        let url = Url::parse("https://intranet.example/").unwrap();
        let mut auth = Authenticator::new("Staff");

        f.router.on_authentication_required(&url, &mut auth);

        assert_eq!(auth.credentials(), Some(&Credentials::new("alice", "secret")));
        assert_eq!(f.observer.messages(), vec!["Waiting for authentication…"]);
        let prompts = f.ui.credential_prompts();
        let prompt = &prompts[0];
        assert_eq!(prompt.target, ChallengeTarget::Server(url));
        assert_eq!(prompt.realm, "Staff");
        assert_eq!(prompt.credentials, Credentials::default());
    }

    #[test]
    fn test_authentication_declined() {
        let f = fixture();
        let mut auth = Authenticator::new("Staff");
        f.router
            .on_authentication_required(&Url::parse("https://intranet.example/").unwrap(), &mut auth);
        assert!(auth.is_empty());
    }

    #[test]
    fn test_dismissed_prompt_fails_closed() {
        let f = fixture();
        f.ui.answer_credentials(Some(Credentials::new("alice", "secret")));
        f.ui.dismiss_with(f.router.dismisser().clone());
        let mut auth = Authenticator::new("Staff");

        f.router
            .on_authentication_required(&Url::parse("https://intranet.example/").unwrap(), &mut auth);

        assert!(auth.is_empty());
    }

    #[test]
    fn test_proxy_with_system_authentication() {
        let f = fixture();
        let mut auth = Authenticator::new("proxy");
        f.router.on_proxy_authentication_required("proxy.local", &mut auth, true);

        assert_eq!(auth.credentials().map(|c| c.user.as_str()), Some(""));
        assert!(f.ui.credential_prompts().is_empty());
        assert!(f.observer.messages().is_empty());
    }

    #[test]
    fn test_proxy_prompt() {
        let f = fixture();
        f.ui.answer_credentials(Some(Credentials::new("bob", "pw")));
        let mut auth = Authenticator::new("proxy");
        f.router.on_proxy_authentication_required("proxy.local", &mut auth, false);

        assert_eq!(
            f.ui.credential_prompts()[0].target,
            ChallengeTarget::Proxy("proxy.local".to_string())
        );
        assert!(!auth.is_empty());
    }

    #[test]
    fn test_empty_certificate_errors_proceed() {
        let mut f = fixture();
        assert_eq!(f.certificate_errors(&[]), CertificateOutcome::NoErrors);
        assert_eq!(f.transport.ignored_errors().len(), 1);
        assert!(f.ui.certificate_prompts().is_empty());
    }

    #[test]
    fn test_known_errors_never_prompt() {
        let mut f = fixture();
        let expired = error(CertificateErrorKind::Expired, b"cert-a");
        let sentinel = error(CertificateErrorKind::NoError, b"cert-b");
        f.settings
            .set_override(
                "bank.example",
                SettingKey::IgnoreSslErrors,
                SettingValue::List(vec![fingerprint(b"cert-a")]),
            )
            .unwrap();

        let outcome = f.certificate_errors(&[expired.clone(), sentinel]);

        assert_eq!(outcome, CertificateOutcome::AlreadyIgnored);
        assert!(f.ui.certificate_prompts().is_empty());
        assert_eq!(f.transport.ignored_errors(), vec![(OperationHandle(1), vec![expired])]);
    }

    #[test]
    fn test_accept_and_remember() {
        let mut f = fixture();
        f.ui.answer_certificates(CertificateDecision {
            accepted: true,
            remember: true,
        });
        let errors = [
            error(CertificateErrorKind::SelfSigned, b"cert-a"),
            error(CertificateErrorKind::HostnameMismatch, b"cert-b"),
        ];

        let outcome = f.certificate_errors(&errors);

        assert_eq!(outcome, CertificateOutcome::Accepted { remembered: true });
        let prompts = f.ui.certificate_prompts();
        let prompt = &prompts[0];
        assert!(prompt.offer_remember);
        assert_eq!(prompt.details(), "SelfSigned\nHostnameMismatch");
        assert_eq!(f.transport.ignored_errors(), vec![(OperationHandle(1), errors.to_vec())]);

        let scope = Url::parse("https://bank.example/login").unwrap();
        let stored = f.settings.get(SettingKey::IgnoreSslErrors, Some(&scope));
        assert_eq!(stored.as_list(), &[fingerprint(b"cert-a"), fingerprint(b"cert-b")]);

        // The next visit does not ask again.
        let mut f2 = Fixture {
            transport: RecordingTransport::default(),
            ..f
        };
        assert_eq!(f2.certificate_errors(&errors), CertificateOutcome::AlreadyIgnored);
        assert_eq!(f2.ui.certificate_prompts().len(), 1);
    }

    #[test]
    fn test_no_remember_without_context_url() {
        let mut f = fixture();
        f.context.set_url(None);
        f.ui.answer_certificates(CertificateDecision {
            accepted: true,
            remember: true,
        });

        let outcome = f.certificate_errors(&[error(CertificateErrorKind::Expired, b"cert")]);

        assert_eq!(outcome, CertificateOutcome::Accepted { remembered: false });
        assert!(!f.ui.certificate_prompts()[0].offer_remember);
        assert!(f.settings.get(SettingKey::IgnoreSslErrors, None).as_list().is_empty());
    }

    #[test]
    fn test_rejected_certificate() {
        let mut f = fixture();
        let outcome = f.certificate_errors(&[error(CertificateErrorKind::UntrustedRoot, b"cert")]);

        assert_eq!(outcome, CertificateOutcome::Rejected);
        assert!(f.transport.ignored_errors().is_empty());
    }
}
