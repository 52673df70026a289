//! Session store: the single source of truth for "who is signed in".
//!
//! The store subscribes to the provider's session notifications once, at
//! construction, and replaces its [`Session`] wholesale on every
//! notification. Sign-in operations never write the session themselves; a
//! successful sign-in becomes visible only when the provider reports it.

use crate::listener::ListenerLifecycle;
use crate::operation::{AuthMethod, AuthOperation, OperationOutcome};
use crate::provider::{
    ChallengeAnchor, ChallengeHandle, Identity, IdentityProvider, ProviderResult,
};
use crate::AuthResult;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The application's current view of who, if anyone, is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Option<Identity>,
    /// True until the provider's first notification arrives.
    pub is_resolving: bool,
}

/// Coarse authorization state derived from a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Not yet resolved: do not redirect either way.
    Unknown,
    SignedOut,
    SignedIn,
}

impl Session {
    fn resolving() -> Self {
        Self {
            identity: None,
            is_resolving: true,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        match (self.is_resolving, &self.identity) {
            (true, _) => AuthState::Unknown,
            (false, Some(_)) => AuthState::SignedIn,
            (false, None) => AuthState::SignedOut,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_state() == AuthState::SignedIn
    }
}

/// Owns the session and the one provider subscription that feeds it.
pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    session: Arc<watch::Sender<Session>>,
    listener: Mutex<ListenerLifecycle<()>>,
}

impl SessionStore {
    /// Create the store and subscribe to provider notifications.
    ///
    /// The subscription is torn down when the store is dropped.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (sender, _) = watch::channel(Session::resolving());
        let session = Arc::new(sender);

        let mut listener = ListenerLifecycle::new();
        let source = Arc::clone(&provider);
        let sink = Arc::downgrade(&session);
        listener.mount((), move || {
            debug!("subscribing to provider session changes");
            Some(source.observe_session_changes(Arc::new(move |identity| {
                apply_notification(&sink, identity);
            })))
        });

        Self {
            provider,
            session,
            listener: Mutex::new(listener),
        }
    }

    /// Synchronous snapshot of the current session.
    pub fn current_identity(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Receiver that observes every session replacement.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Wait for the provider's first notification and return the session.
    pub async fn resolved(&self) -> Session {
        let mut receiver = self.subscribe();
        let session = match receiver.wait_for(|session| !session.is_resolving).await {
            Ok(session) => session.clone(),
            Err(_) => self.current_identity(),
        };
        session
    }

    /// True while the provider subscription is live.
    pub fn is_listening(&self) -> bool {
        self.listener.lock().is_mounted()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let result = self.provider.authenticate_with_password(email, password).await;
        Ok(log_resolution(AuthMethod::PasswordSignIn, result)?)
    }

    /// Create the account, then set its display name.
    ///
    /// A failed display-name update is logged and does not fail the
    /// sign-up; the account exists and is signed in at that point.
    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<Identity> {
        let result = self.provider.create_account_with_password(email, password).await;
        let identity = log_resolution(AuthMethod::PasswordSignUp, result)?;

        match self.provider.update_display_name(display_name).await {
            Ok(()) => Ok(identity.with_display_name(display_name)),
            Err(e) => {
                warn!(
                    uid = %identity.uid,
                    code = %e.code,
                    "Display name update failed after sign-up"
                );
                Ok(identity)
            }
        }
    }

    pub async fn sign_in_with_federated_provider(&self) -> AuthResult<Identity> {
        let result = self.provider.authenticate_with_federated_popup().await;
        Ok(log_resolution(AuthMethod::Federated, result)?)
    }

    pub async fn begin_phone_challenge(
        &self,
        phone_number: &str,
        anchor: &ChallengeAnchor,
    ) -> AuthResult<ChallengeHandle> {
        let result = self.provider.issue_phone_challenge(phone_number, anchor).await;
        Ok(log_resolution(AuthMethod::PhoneChallenge, result)?)
    }

    pub async fn confirm_phone_challenge(
        &self,
        handle: &ChallengeHandle,
        code: &str,
    ) -> AuthResult<Identity> {
        let result = self.provider.confirm_phone_challenge(handle, code).await;
        Ok(log_resolution(AuthMethod::PhoneConfirm, result)?)
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        let result = self.provider.sign_out().await;
        Ok(log_resolution(AuthMethod::SignOut, result)?)
    }

    /// Run one operation.
    pub async fn execute(&self, operation: AuthOperation) -> AuthResult<OperationOutcome> {
        debug!(method = %operation.method(), operation = ?operation, "Executing auth operation");

        match operation {
            AuthOperation::PasswordSignIn { email, password } => self
                .sign_in_with_password(&email, &password)
                .await
                .map(OperationOutcome::Authenticated),
            AuthOperation::PasswordSignUp {
                email,
                password,
                display_name,
            } => self
                .sign_up_with_password(&email, &password, &display_name)
                .await
                .map(OperationOutcome::Authenticated),
            AuthOperation::FederatedSignIn => self
                .sign_in_with_federated_provider()
                .await
                .map(OperationOutcome::Authenticated),
            AuthOperation::PhoneChallenge {
                phone_number,
                anchor,
            } => self
                .begin_phone_challenge(&phone_number, &anchor)
                .await
                .map(OperationOutcome::ChallengeIssued),
            AuthOperation::PhoneConfirm { handle, code } => self
                .confirm_phone_challenge(&handle, &code)
                .await
                .map(OperationOutcome::Authenticated),
            AuthOperation::SignOut => self.sign_out().await.map(|()| OperationOutcome::SignedOut),
        }
    }
}

fn apply_notification(session: &Weak<watch::Sender<Session>>, identity: Option<Identity>) {
    let Some(session) = session.upgrade() else {
        return;
    };

    let uid = identity.as_ref().map(|i| i.uid.clone());
    let previous = session.send_replace(Session {
        identity,
        is_resolving: false,
    });

    if previous.is_resolving {
        info!(uid = ?uid, "Initial session resolved");
    } else {
        debug!(uid = ?uid, "Session replaced");
    }
}

fn log_resolution<T>(method: AuthMethod, result: ProviderResult<T>) -> ProviderResult<T> {
    match &result {
        Ok(_) => info!(method = %method, "Auth operation succeeded"),
        Err(e) => warn!(method = %method, code = %e.code, "Auth operation failed"),
    }
    result
}
