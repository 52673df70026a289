//! Federated (social) sign-in through the web app.
//!
//! The user finishes the provider's consent screen in a browser opened at
//! the login URL; this side polls the web app's status endpoint until the
//! login succeeds, fails, or expires.

use crate::error::{SupabaseError, SupabaseResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Interval between status polls.
pub const SOCIAL_LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Social providers the web app can broker.
pub const SUPPORTED_SOCIAL_PROVIDERS: &[&str] = &["google", "github", "gitlab"];

/// Social login bootstrap information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialLoginStart {
    pub login_id: String,
    pub login_url: String,
}

/// Session handed back by the web app once the user finished signing in.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialLoginSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
    pub user_id: String,
}

impl SocialLoginSession {
    /// Expiry as a timestamp. Accepts RFC 3339 or unix seconds.
    pub fn expires_at(&self) -> SupabaseResult<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&self.expires_at) {
            return Ok(parsed.with_timezone(&Utc));
        }
        self.expires_at
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                SupabaseError::InvalidResponse(format!(
                    "unparseable social session expiry: {}",
                    self.expires_at
                ))
            })
    }
}

#[derive(Debug, Deserialize)]
struct SocialLoginStatusResponse {
    status: String,
    #[serde(default)]
    session: Option<SocialLoginSession>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the web app's social login bootstrap and status endpoints.
#[derive(Clone)]
pub struct SocialLoginClient {
    http_client: reqwest::Client,
    web_app_url: String,
    poll_interval: Duration,
}

impl SocialLoginClient {
    pub fn new(web_app_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            web_app_url: web_app_url.into().trim_end_matches('/').to_string(),
            poll_interval: SOCIAL_LOGIN_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Begin a social login for `provider`.
    pub fn start(&self, provider: &str) -> SupabaseResult<SocialLoginStart> {
        if !SUPPORTED_SOCIAL_PROVIDERS.contains(&provider) {
            return Err(SupabaseError::Config(format!(
                "Unsupported social provider: {}",
                provider
            )));
        }

        let login_id = Uuid::new_v4().to_string();
        let login_url = format!(
            "{}/cli-auth?login_id={}&provider={}",
            self.web_app_url, login_id, provider
        );

        Ok(SocialLoginStart {
            login_id,
            login_url,
        })
    }

    /// Poll until the login started under `login_id` completes.
    ///
    /// Expiry, an explicit cancellation, and running past `timeout` are all
    /// reported as [`SupabaseError::FederatedAbandoned`].
    pub async fn wait_for_completion(
        &self,
        login_id: &str,
        timeout: Duration,
    ) -> SupabaseResult<SocialLoginSession> {
        let status_url = format!(
            "{}/api/cli-login-status?login_id={}",
            self.web_app_url, login_id
        );
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                info!(login_id = %login_id, "Social login timed out");
                return Err(SupabaseError::FederatedAbandoned);
            }

            let response = self.http_client.get(&status_url).send().await?;
            let status_code = response.status();
            let payload: SocialLoginStatusResponse = response.json().await?;

            match payload.status.as_str() {
                "pending" => {
                    debug!(login_id = %login_id, "Social login pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                "success" => {
                    return payload.session.ok_or_else(|| {
                        SupabaseError::InvalidResponse("Missing social session payload".to_string())
                    });
                }
                "expired" | "cancelled" => return Err(SupabaseError::FederatedAbandoned),
                other => {
                    let error = payload.error.unwrap_or_else(|| "unknown error".to_string());
                    if error == "access_denied" {
                        return Err(SupabaseError::FederatedAbandoned);
                    }
                    return Err(SupabaseError::FederatedFailed(format!(
                        "{} {}: {}",
                        status_code.as_u16(),
                        other,
                        error
                    )));
                }
            }
        }
    }
}
