//! Test doubles for the manager's collaborators.

use crate::challenge::{
    CertificateDecision, CertificatePrompt, CredentialPrompt, DismissSignal, PromptDismisser, UiDelegate,
};
use crate::headers::HeaderMap;
use crate::observer::{LoadProgress, NetworkObserver};
use crate::request::{Operation, Request};
use crate::tracker::TransferStatistics;
use crate::transport::{Authenticator, CacheProvider, CertificateError, Credentials, OperationHandle, Transport};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

/// Records every notification.
#[derive(Default)]
pub struct RecordingObserver {
    statuses: Mutex<Vec<TransferStatistics>>,
    progress: Mutex<Vec<LoadProgress>>,
    messages: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn statuses(&self) -> Vec<TransferStatistics> {
        self.statuses.lock().clone()
    }

    pub fn progress(&self) -> Vec<LoadProgress> {
        self.progress.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl NetworkObserver for RecordingObserver {
    fn status_changed(&self, statistics: &TransferStatistics) {
        self.statuses.lock().push(*statistics);
    }

    fn document_progress_changed(&self, progress: LoadProgress) {
        self.progress.lock().push(progress);
    }

    fn message_changed(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[derive(Default)]
struct TransportState {
    next_handle: u64,
    submitted: Vec<(OperationHandle, Operation, Request, Option<Bytes>)>,
    headers: IndexMap<OperationHandle, HeaderMap>,
    ignored: Vec<(OperationHandle, Vec<CertificateError>)>,
    authenticated: Vec<(OperationHandle, Authenticator)>,
}

/// Transport that records submissions. Clones share state, so a test can
/// keep one while the manager owns another.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn submitted(&self) -> Vec<(OperationHandle, Operation, Request, Option<Bytes>)> {
        self.state.lock().submitted.clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().submitted.iter().map(|(_, _, r, _)| r.clone()).collect()
    }

    pub fn set_response_headers(&self, handle: OperationHandle, headers: HeaderMap) {
        self.state.lock().headers.insert(handle, headers);
    }

    pub fn ignored_errors(&self) -> Vec<(OperationHandle, Vec<CertificateError>)> {
        self.state.lock().ignored.clone()
    }

    pub fn authenticated(&self) -> Vec<(OperationHandle, Authenticator)> {
        self.state.lock().authenticated.clone()
    }
}

impl Transport for RecordingTransport {
    fn submit(&mut self, request: Request, operation: &Operation, body: Option<Bytes>) -> OperationHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = OperationHandle(state.next_handle);
        state.submitted.push((handle, operation.clone(), request, body));
        handle
    }

    fn response_headers(&self, handle: OperationHandle) -> Option<HeaderMap> {
        self.state.lock().headers.get(&handle).cloned()
    }

    fn ignore_certificate_errors(&mut self, handle: OperationHandle, errors: &[CertificateError]) {
        self.state.lock().ignored.push((handle, errors.to_vec()));
    }

    fn authenticate(&mut self, handle: OperationHandle, authenticator: Authenticator) {
        self.state.lock().authenticated.push((handle, authenticator));
    }
}

/// UI that answers prompts from a script and records what it was shown.
#[derive(Default)]
pub struct ScriptedUi {
    credentials: Mutex<Option<Credentials>>,
    certificates: Mutex<CertificateDecision>,
    dismiss: Mutex<Option<PromptDismisser>>,
    credential_prompts: Mutex<Vec<CredentialPrompt>>,
    certificate_prompts: Mutex<Vec<CertificatePrompt>>,
    form_requests: Mutex<Vec<(Url, Operation, Option<Bytes>)>>,
}

impl ScriptedUi {
    pub fn answer_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.lock() = credentials;
    }

    pub fn answer_certificates(&self, decision: CertificateDecision) {
        *self.certificates.lock() = decision;
    }

    /// Simulate a navigation dismissing the prompt while it is shown.
    pub fn dismiss_with(&self, dismisser: PromptDismisser) {
        *self.dismiss.lock() = Some(dismisser);
    }

    pub fn credential_prompts(&self) -> Vec<CredentialPrompt> {
        self.credential_prompts.lock().clone()
    }

    pub fn certificate_prompts(&self) -> Vec<CertificatePrompt> {
        self.certificate_prompts.lock().clone()
    }

    pub fn form_requests(&self) -> Vec<(Url, Operation, Option<Bytes>)> {
        self.form_requests.lock().clone()
    }

    fn maybe_dismiss(&self) {
        if let Some(dismisser) = self.dismiss.lock().as_ref() {
            dismisser.dismiss_all();
        }
    }
}

impl UiDelegate for ScriptedUi {
    fn request_credentials(&self, prompt: &CredentialPrompt, _dismissed: &DismissSignal) -> Option<Credentials> {
        self.credential_prompts.lock().push(prompt.clone());
        self.maybe_dismiss();
        self.credentials.lock().clone()
    }

    fn confirm_certificate_errors(&self, prompt: &CertificatePrompt, _dismissed: &DismissSignal) -> CertificateDecision {
        self.certificate_prompts.lock().push(prompt.clone());
        self.maybe_dismiss();
        *self.certificates.lock()
    }

    fn open_form_request(&self, url: &Url, operation: &Operation, body: Option<Bytes>) {
        self.form_requests.lock().push((url.clone(), operation.clone(), body));
    }
}

/// In-memory response cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<IndexMap<String, Bytes>>,
}

impl CacheProvider for MemoryCache {
    fn get(&self, url: &Url) -> Option<Bytes> {
        self.entries.lock().get(url.as_str()).cloned()
    }

    fn put(&self, url: &Url, data: Bytes) {
        self.entries.lock().insert(url.to_string(), data);
    }

    fn remove(&self, url: &Url) -> bool {
        self.entries.lock().shift_remove(url.as_str()).is_some()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}
