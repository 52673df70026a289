//! [`IdentityProvider`] backed by Supabase Auth.
//!
//! The provider keeps the current session in memory and notifies every
//! observer on each change, in registration order. New observers receive the
//! current session immediately.
//!
//! Every session write and the notification it triggers happen under one
//! ordering lock, so observers see changes in the order they were stored.

use crate::client::{GoTrueClient, SignUpResponse, TokenResponse};
use crate::error::{SupabaseError, SupabaseResult};
use crate::social::{SocialLoginClient, SocialLoginStart};
use async_trait::async_trait;
use auth_session::{
    ChallengeAnchor, ChallengeHandle, Identity, IdentityProvider, ProviderResult, SessionListener,
    Unsubscribe,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashboard_config_and_utils::{Config, DEFAULT_FEDERATED_TIMEOUT_SECS};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Refresh this long before the access token expires.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Social provider used for the federated sign-in unless configured.
pub const DEFAULT_SOCIAL_PROVIDER: &str = "google";

/// Called with the login URL when a federated sign-in starts, so the host
/// can open a browser or print it.
pub type LoginUrlHandler = Arc<dyn Fn(&SocialLoginStart) + Send + Sync>;

#[derive(Clone)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    identity: Identity,
}

fn is_same_session(current: Option<&StoredSession>, expected: &StoredSession) -> bool {
    current.is_some_and(|s| s.refresh_token == expected.refresh_token)
}

impl StoredSession {
    fn from_token(token: TokenResponse) -> Self {
        Self {
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            identity: token.user.into_identity(),
        }
    }

    fn needs_refresh(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

type Listeners = Arc<Mutex<BTreeMap<u64, SessionListener>>>;

/// Supabase-backed identity provider.
pub struct SupabaseIdentityProvider {
    client: GoTrueClient,
    social: SocialLoginClient,
    social_provider: String,
    federated_timeout: Duration,
    on_login_url: Option<LoginUrlHandler>,
    session: Mutex<Option<StoredSession>>,
    /// Held across a session write and its notification.
    notify_lock: Mutex<()>,
    listeners: Listeners,
    next_listener: AtomicU64,
}

impl SupabaseIdentityProvider {
    pub fn new(client: GoTrueClient, social: SocialLoginClient) -> Self {
        Self {
            client,
            social,
            social_provider: DEFAULT_SOCIAL_PROVIDER.to_string(),
            federated_timeout: Duration::from_secs(DEFAULT_FEDERATED_TIMEOUT_SECS),
            on_login_url: None,
            session: Mutex::new(None),
            notify_lock: Mutex::new(()),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Build the provider from dashboard configuration.
    pub fn from_config(config: &Config) -> SupabaseResult<Self> {
        let supabase_url = config
            .supabase_url()
            .map_err(|e| SupabaseError::Config(e.to_string()))?;
        let web_app = config
            .web_app_base()
            .map_err(|e| SupabaseError::Config(e.to_string()))?;
        if config.supabase_publishable_key.trim().is_empty() {
            return Err(SupabaseError::Config(
                "supabase_publishable_key is empty".to_string(),
            ));
        }

        let client = GoTrueClient::new(supabase_url.as_str(), &config.supabase_publishable_key);
        let social = SocialLoginClient::new(web_app);
        Ok(Self::new(client, social).with_federated_timeout(config.federated_timeout()))
    }

    pub fn with_social_provider(mut self, provider: impl Into<String>) -> Self {
        self.social_provider = provider.into();
        self
    }

    pub fn with_federated_timeout(mut self, timeout: Duration) -> Self {
        self.federated_timeout = timeout;
        self
    }

    pub fn with_login_url_handler(mut self, handler: LoginUrlHandler) -> Self {
        self.on_login_url = Some(handler);
        self
    }

    /// Identity of the current session, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.session.lock().as_ref().map(|s| s.identity.clone())
    }

    /// A valid access token, refreshing the session when it is about to
    /// expire.
    pub async fn access_token(&self) -> SupabaseResult<String> {
        let stored = self.session.lock().clone().ok_or(SupabaseError::NotSignedIn)?;
        if !stored.needs_refresh() {
            return Ok(stored.access_token);
        }

        debug!(uid = %stored.identity.uid, "Refreshing access token");
        match self.client.refresh_grant(&stored.refresh_token).await {
            Ok(token) => {
                let refreshed = StoredSession::from_token(token);
                let access_token = refreshed.access_token.clone();
                let _ordering = self.notify_lock.lock();
                let mut session = self.session.lock();
                if !is_same_session(session.as_ref(), &stored) {
                    debug!(uid = %stored.identity.uid, "Session changed during refresh");
                    return Err(SupabaseError::NotSignedIn);
                }
                *session = Some(refreshed);
                Ok(access_token)
            }
            Err(e @ SupabaseError::Api { .. }) => {
                warn!(
                    uid = %stored.identity.uid,
                    code = e.vocabulary_code(),
                    "Refresh rejected, signing out locally"
                );
                let _ordering = self.notify_lock.lock();
                if is_same_session(self.session.lock().as_ref(), &stored) {
                    self.store_and_notify(None);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn establish(&self, session: StoredSession) -> Identity {
        let identity = session.identity.clone();
        info!(
            uid = %identity.uid,
            provider = %identity.provider_id,
            "Supabase session established"
        );
        self.replace_session(Some(session));
        identity
    }

    fn replace_session(&self, session: Option<StoredSession>) {
        let _ordering = self.notify_lock.lock();
        self.store_and_notify(session);
    }

    /// Caller holds `notify_lock`.
    fn store_and_notify(&self, session: Option<StoredSession>) {
        let identity = session.as_ref().map(|s| s.identity.clone());
        *self.session.lock() = session;
        self.notify(identity);
    }

    /// Caller holds `notify_lock`.
    fn notify(&self, identity: Option<Identity>) {
        let listeners: Vec<SessionListener> = self.listeners.lock().values().cloned().collect();
        debug!(
            listeners = listeners.len(),
            signed_in = identity.is_some(),
            "Notifying session observers"
        );
        for listener in listeners {
            listener(identity.clone());
        }
    }

    async fn federated(&self) -> SupabaseResult<Identity> {
        let start = self.social.start(&self.social_provider)?;
        info!(
            login_id = %start.login_id,
            provider = %self.social_provider,
            "Federated sign-in started"
        );
        match &self.on_login_url {
            Some(handler) => handler(&start),
            None => info!(url = %start.login_url, "Open this URL to finish signing in"),
        }

        let social = self
            .social
            .wait_for_completion(&start.login_id, self.federated_timeout)
            .await?;
        let expires_at = social.expires_at()?;
        let user = self.client.get_user(&social.access_token).await?;
        if user.id != social.user_id {
            return Err(SupabaseError::InvalidResponse(
                "social session user does not match token".to_string(),
            ));
        }

        Ok(self.establish(StoredSession {
            access_token: social.access_token,
            refresh_token: social.refresh_token,
            expires_at,
            identity: user.into_identity(),
        }))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<Identity> {
        let token = self.client.password_grant(email, password).await?;
        Ok(self.establish(StoredSession::from_token(token)))
    }

    async fn create_account_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<Identity> {
        match self.client.sign_up(email, password).await? {
            SignUpResponse::Session(token) => Ok(self.establish(StoredSession::from_token(token))),
            SignUpResponse::PendingConfirmation(user) => {
                info!(uid = %user.id, "Account created, awaiting email confirmation");
                Err(SupabaseError::ConfirmationRequired.into())
            }
        }
    }

    async fn update_display_name(&self, display_name: &str) -> ProviderResult<()> {
        let access_token = self.access_token().await?;
        let user = self
            .client
            .update_display_name(&access_token, display_name)
            .await?;

        {
            let _ordering = self.notify_lock.lock();
            let identity = match self.session.lock().as_mut() {
                Some(stored) if stored.identity.uid == user.id => {
                    stored.identity = user.into_identity();
                    Some(stored.identity.clone())
                }
                _ => None,
            };
            if identity.is_some() {
                self.notify(identity);
            }
        }
        Ok(())
    }

    async fn authenticate_with_federated_popup(&self) -> ProviderResult<Identity> {
        Ok(self.federated().await?)
    }

    async fn issue_phone_challenge(
        &self,
        phone_number: &str,
        anchor: &ChallengeAnchor,
    ) -> ProviderResult<ChallengeHandle> {
        let captcha = (!anchor.is_empty()).then_some(anchor.as_str());
        self.client.send_sms_otp(phone_number, captcha).await?;
        // GoTrue correlates SMS verification by phone number.
        Ok(ChallengeHandle::new(phone_number))
    }

    async fn confirm_phone_challenge(
        &self,
        handle: &ChallengeHandle,
        code: &str,
    ) -> ProviderResult<Identity> {
        let token = self.client.verify_sms_otp(handle.as_str(), code).await?;
        Ok(self.establish(StoredSession::from_token(token)))
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        let access_token = self.session.lock().as_ref().map(|s| s.access_token.clone());
        if let Some(access_token) = access_token {
            match self.client.logout(&access_token).await {
                Ok(()) => {}
                // The token is already unusable server-side.
                Err(SupabaseError::Api { status: 401 | 403 | 404, .. }) => {
                    debug!("Session already revoked");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Signed out");
        self.replace_session(None);
        Ok(())
    }

    fn observe_session_changes(&self, listener: SessionListener) -> Unsubscribe {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        {
            let _ordering = self.notify_lock.lock();
            self.listeners.lock().insert(id, listener.clone());
            listener(self.current_identity());
        }

        let listeners = Arc::clone(&self.listeners);
        Unsubscribe::new(move || {
            listeners.lock().remove(&id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GoTrueUser;

    fn provider() -> SupabaseIdentityProvider {
        SupabaseIdentityProvider::new(
            GoTrueClient::new("http://127.0.0.1:9", "test-key"),
            SocialLoginClient::new("http://127.0.0.1:9"),
        )
    }

    fn token(uid: &str, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: format!("access-{uid}"),
            refresh_token: format!("refresh-{uid}"),
            expires_in,
            user: GoTrueUser {
                id: uid.to_string(),
                ..GoTrueUser::default()
            },
        }
    }

    #[test]
    fn test_observer_receives_current_session_then_changes() {
        let provider = provider();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let unsubscribe = provider.observe_session_changes(Arc::new(move |identity| {
            sink.lock().push(identity.map(|i| i.uid));
        }));

        provider.establish(StoredSession::from_token(token("u1", 3600)));
        provider.replace_session(None);
        unsubscribe.call();
        provider.establish(StoredSession::from_token(token("u2", 3600)));

        assert_eq!(*seen.lock(), vec![None, Some("u1".to_string()), None]);
    }

    #[tokio::test]
    async fn test_sign_out_without_session_skips_network() {
        let provider = provider();
        let notified = Arc::new(Mutex::new(0));
        let counter = notified.clone();
        let _unsubscribe = provider.observe_session_changes(Arc::new(move |_| {
            *counter.lock() += 1;
        }));

        provider.sign_out().await.unwrap();
        // Once on subscribe, once on sign-out.
        assert_eq!(*notified.lock(), 2);
        assert!(provider.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_access_token_without_session() {
        let provider = provider();
        assert!(matches!(
            provider.access_token().await,
            Err(SupabaseError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_access_token_fresh_session_skips_refresh() {
        let provider = provider();
        provider.establish(StoredSession::from_token(token("u1", 3600)));
        assert_eq!(provider.access_token().await.unwrap(), "access-u1");
    }

    #[test]
    fn test_concurrent_replacements_notify_in_stored_order() {
        let provider = Arc::new(provider());
        let last_seen = Arc::new(Mutex::new(None));
        let sink = last_seen.clone();
        let _unsubscribe = provider.observe_session_changes(Arc::new(move |identity| {
            *sink.lock() = Some(identity.map(|i| i.uid));
        }));

        let writers: Vec<_> = (0..8)
            .map(|worker| {
                let provider = provider.clone();
                std::thread::spawn(move || {
                    for round in 0..200 {
                        if (worker + round) % 2 == 0 {
                            provider.establish(StoredSession::from_token(token(
                                &format!("u{worker}"),
                                3600,
                            )));
                        } else {
                            provider.replace_session(None);
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stored = provider.current_identity().map(|i| i.uid);
        assert_eq!(*last_seen.lock(), Some(stored));
    }

    #[test]
    fn test_needs_refresh_near_expiry() {
        assert!(StoredSession::from_token(token("u1", 30)).needs_refresh());
        assert!(!StoredSession::from_token(token("u1", 3600)).needs_refresh());
    }
}
