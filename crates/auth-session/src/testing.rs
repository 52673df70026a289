//! In-memory identity provider for tests and local development.
//!
//! [`MemoryIdentityProvider`] answers every call from a per-method script,
//! counts calls, and can hold a call open on a [`Gate`] so tests can observe
//! the orchestrator while an operation is in flight.

use crate::operation::AuthMethod;
use crate::provider::{
    ChallengeAnchor, ChallengeHandle, Identity, IdentityProvider, ProviderError, ProviderResult,
    SessionListener, Unsubscribe,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Scripted answer for one method.
#[derive(Debug, Clone)]
pub enum Response {
    Identity(Identity),
    Challenge(ChallengeHandle),
    Error(ProviderError),
}

/// Holds one provider call open until released.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    released: Notify,
}

impl Gate {
    /// Resolves once the held call has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the held call continue.
    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.released.notified().await;
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<AuthMethod, Response>,
    gates: HashMap<AuthMethod, Arc<Gate>>,
    calls: HashMap<AuthMethod, usize>,
    issued: Vec<ChallengeHandle>,
    anchors: Vec<ChallengeAnchor>,
    display_names: Vec<String>,
    display_name_error: Option<ProviderError>,
    current: Option<Identity>,
    notify_on_success: bool,
}

type Listeners = Arc<Mutex<BTreeMap<u64, SessionListener>>>;

/// Scripted [`IdentityProvider`] that keeps its session in memory.
pub struct MemoryIdentityProvider {
    script: Mutex<Script>,
    listeners: Listeners,
    next_listener: AtomicU64,
    subscribes: AtomicUsize,
    unsubscribes: Arc<AtomicUsize>,
    emit_on_subscribe: bool,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    /// Provider that reports the current session to every new subscriber and
    /// notifies after each successful sign-in or sign-out.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Provider that stays quiet until [`emit`](Self::emit) is called, so
    /// sessions remain resolving.
    pub fn silent() -> Self {
        let provider = Self::build(false);
        provider.set_notify_on_success(false);
        provider
    }

    fn build(emit_on_subscribe: bool) -> Self {
        Self {
            script: Mutex::new(Script {
                notify_on_success: true,
                ..Script::default()
            }),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_listener: AtomicU64::new(0),
            subscribes: AtomicUsize::new(0),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
            emit_on_subscribe,
        }
    }

    pub fn set_notify_on_success(&self, notify: bool) {
        self.script.lock().notify_on_success = notify;
    }

    pub fn script(&self, method: AuthMethod, response: Response) {
        self.script.lock().responses.insert(method, response);
    }

    pub fn script_identity(&self, method: AuthMethod, identity: Identity) {
        self.script(method, Response::Identity(identity));
    }

    pub fn script_challenge(&self, method: AuthMethod, handle: ChallengeHandle) {
        self.script(method, Response::Challenge(handle));
    }

    pub fn script_error(&self, method: AuthMethod, code: &str) {
        self.script(method, Response::Error(ProviderError::new(code, code)));
    }

    pub fn clear_script(&self, method: AuthMethod) {
        self.script.lock().responses.remove(&method);
    }

    pub fn fail_display_name_update(&self, code: &str) {
        self.script.lock().display_name_error = Some(ProviderError::new(code, code));
    }

    /// Hold the next call of `method` until the returned gate is released.
    pub fn hold(&self, method: AuthMethod) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.script.lock().gates.insert(method, gate.clone());
        gate
    }

    pub fn call_count(&self, method: AuthMethod) -> usize {
        self.script.lock().calls.get(&method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().calls.values().sum()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.script.lock().display_names.clone()
    }

    pub fn anchors(&self) -> Vec<ChallengeAnchor> {
        self.script.lock().anchors.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// Replace the provider session and notify every listener in
    /// registration order.
    pub fn emit(&self, identity: Option<Identity>) {
        self.script.lock().current = identity.clone();
        let listeners: Vec<SessionListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(identity.clone());
        }
    }

    async fn enter(&self, method: AuthMethod) -> Option<Response> {
        let gate = {
            let mut script = self.script.lock();
            *script.calls.entry(method).or_default() += 1;
            script.gates.remove(&method)
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.script.lock().responses.get(&method).cloned()
    }

    async fn resolve_identity(
        &self,
        method: AuthMethod,
        fallback: impl FnOnce() -> Identity,
    ) -> ProviderResult<Identity> {
        let identity = match self.enter(method).await {
            Some(Response::Error(e)) => return Err(e),
            Some(Response::Identity(identity)) => identity,
            _ => fallback(),
        };
        let notify = self.script.lock().notify_on_success;
        if notify {
            self.emit(Some(identity.clone()));
        }
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn authenticate_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> ProviderResult<Identity> {
        self.resolve_identity(AuthMethod::PasswordSignIn, || {
            Identity::new("memory-user", "password").with_email(email)
        })
        .await
    }

    async fn create_account_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> ProviderResult<Identity> {
        self.resolve_identity(AuthMethod::PasswordSignUp, || {
            Identity::new("memory-new-user", "password").with_email(email)
        })
        .await
    }

    async fn update_display_name(&self, display_name: &str) -> ProviderResult<()> {
        let mut script = self.script.lock();
        if let Some(e) = script.display_name_error.clone() {
            return Err(e);
        }
        script.display_names.push(display_name.to_string());
        Ok(())
    }

    async fn authenticate_with_federated_popup(&self) -> ProviderResult<Identity> {
        self.resolve_identity(AuthMethod::Federated, || {
            Identity::new("memory-federated-user", "google")
        })
        .await
    }

    async fn issue_phone_challenge(
        &self,
        _phone_number: &str,
        anchor: &ChallengeAnchor,
    ) -> ProviderResult<ChallengeHandle> {
        let handle = match self.enter(AuthMethod::PhoneChallenge).await {
            Some(Response::Error(e)) => return Err(e),
            Some(Response::Challenge(handle)) => handle,
            _ => {
                let issued = self.script.lock().issued.len();
                ChallengeHandle::new(format!("verification-{}", issued + 1))
            }
        };

        let mut script = self.script.lock();
        script.anchors.push(anchor.clone());
        script.issued.push(handle.clone());
        Ok(handle)
    }

    async fn confirm_phone_challenge(
        &self,
        handle: &ChallengeHandle,
        _code: &str,
    ) -> ProviderResult<Identity> {
        let issued = self.script.lock().issued.contains(handle);
        if !issued {
            self.enter(AuthMethod::PhoneConfirm).await;
            return Err(ProviderError::new(
                "auth/invalid-verification-id",
                "No challenge was issued for this handle",
            ));
        }
        self.resolve_identity(AuthMethod::PhoneConfirm, || {
            Identity::new(format!("phone-{}", handle.as_str()), "phone")
        })
        .await
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        if let Some(Response::Error(e)) = self.enter(AuthMethod::SignOut).await {
            return Err(e);
        }
        let notify = self.script.lock().notify_on_success;
        if notify {
            self.emit(None);
        }
        Ok(())
    }

    fn observe_session_changes(&self, listener: SessionListener) -> Unsubscribe {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, listener.clone());
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        if self.emit_on_subscribe {
            let current = self.script.lock().current.clone();
            listener(current);
        }

        let listeners = Arc::clone(&self.listeners);
        let unsubscribes = Arc::clone(&self.unsubscribes);
        Unsubscribe::new(move || {
            if listeners.lock().remove(&id).is_some() {
                unsubscribes.fetch_add(1, Ordering::SeqCst);
            }
        })
    }
}
