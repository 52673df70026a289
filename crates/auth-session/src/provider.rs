//! Identity provider capability interface.
//!
//! The dashboard never talks to an identity backend directly. Everything it
//! needs is expressed by [`IdentityProvider`]; concrete backends (Supabase,
//! the in-memory test provider) implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Authenticated user record issued by the identity provider.
///
/// Opaque to the session core: only `uid` is relied upon, the remaining
/// fields are carried through for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Sign-in method that produced this identity ("password", "phone", "google", ...).
    pub provider_id: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            phone_number: None,
            provider_id: provider_id.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }
}

/// Error returned by every provider call: a vocabulary code plus a
/// human-readable message. Nothing else about the provider's error shape is
/// visible to the session core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Opaque token correlating a phone challenge with its confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeHandle(String);

impl ChallengeHandle {
    pub fn new(verification_id: impl Into<String>) -> Self {
        Self(verification_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a phone challenge attaches its human-verification step
/// (a widget container id in a browser, a captcha token elsewhere).
///
/// Anchors are single-use per issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChallengeAnchor(String);

impl ChallengeAnchor {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self(anchor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Callback receiving every session change from the provider.
pub type SessionListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Cancels a subscription. Consumed on use, so it can run at most once.
pub struct Unsubscribe(Box<dyn FnOnce() + Send>);

impl Unsubscribe {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(cancel))
    }

    /// An unsubscribe callback with nothing to cancel.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn call(self) {
        (self.0)()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe(..)")
    }
}

/// Capabilities the session core consumes from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<Identity>;

    /// Create an account with email and password and sign it in.
    async fn create_account_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<Identity>;

    /// Set the display name of the currently signed-in account.
    ///
    /// Providers without profile support keep the default no-op.
    async fn update_display_name(&self, display_name: &str) -> ProviderResult<()> {
        let _ = display_name;
        Ok(())
    }

    /// Run the federated (social) sign-in flow to completion.
    async fn authenticate_with_federated_popup(&self) -> ProviderResult<Identity>;

    /// Send a verification code to `phone_number`.
    async fn issue_phone_challenge(
        &self,
        phone_number: &str,
        anchor: &ChallengeAnchor,
    ) -> ProviderResult<ChallengeHandle>;

    /// Confirm a previously issued phone challenge with the received code.
    async fn confirm_phone_challenge(
        &self,
        handle: &ChallengeHandle,
        code: &str,
    ) -> ProviderResult<Identity>;

    /// Sign the current account out.
    async fn sign_out(&self) -> ProviderResult<()>;

    /// Register `listener` for session changes, in emission order.
    ///
    /// The returned [`Unsubscribe`] removes the listener.
    fn observe_session_changes(&self, listener: SessionListener) -> Unsubscribe;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unsubscribe_runs_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let unsubscribe = Unsubscribe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        unsubscribe.call();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new("auth/popup-blocked", "Popup was blocked");
        assert_eq!(err.to_string(), "auth/popup-blocked: Popup was blocked");
    }

    #[test]
    fn test_identity_builder() {
        let identity = Identity::new("u1", "password")
            .with_email("dev@foo.com")
            .with_display_name("Dev");
        assert_eq!(identity.uid, "u1");
        assert_eq!(identity.email.as_deref(), Some("dev@foo.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Dev"));
        assert!(identity.phone_number.is_none());
    }

    #[test]
    fn test_identity_serialization_skips_missing_fields() {
        let json = serde_json::to_string(&Identity::new("u1", "phone")).unwrap();
        assert_eq!(json, r#"{"uid":"u1","provider_id":"phone"}"#);
    }
}
