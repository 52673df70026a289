//! Supabase Auth (GoTrue) REST client.
//!
//! Thin typed wrapper over the `/auth/v1` endpoints the identity provider
//! needs. Non-success responses are turned into [`SupabaseError::Api`] with
//! the GoTrue error code preserved.

use crate::error::{SupabaseError, SupabaseResult};
use auth_session::Identity;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Token grant response (password, refresh, verify, auto-confirmed sign-up).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: GoTrueUser,
}

/// User object as returned by GoTrue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoTrueUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
}

impl GoTrueUser {
    /// Convert into the provider-neutral identity record.
    pub fn into_identity(self) -> Identity {
        let provider_id = match self.app_metadata.provider.as_deref() {
            None | Some("email") => "password".to_string(),
            Some(other) => other.to_string(),
        };
        let display_name = self
            .user_metadata
            .display_name
            .or(self.user_metadata.full_name);

        Identity {
            uid: self.id,
            email: self.email.filter(|e| !e.is_empty()),
            display_name: display_name.filter(|n| !n.is_empty()),
            phone_number: self.phone.filter(|p| !p.is_empty()),
            provider_id,
        }
    }
}

/// `/signup` answers with a session when the project auto-confirms, and with
/// the bare user when email confirmation is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(GoTrueUser),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Build an [`SupabaseError::Api`] from a GoTrue error response body.
///
/// Understands both the current `{error_code, msg}` shape and the older
/// OAuth-style `{error, error_description}` shape.
pub fn parse_error(status: u16, body: &str) -> SupabaseError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .unwrap_or_else(|| format!("HTTP {status}"));

    SupabaseError::Api {
        status,
        error_code: parsed.error_code.or(parsed.error),
        message,
    }
}

#[derive(Debug, Serialize)]
struct CaptchaMeta<'a> {
    captcha_token: &'a str,
}

#[derive(Debug, Serialize)]
struct OtpRequest<'a> {
    phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gotrue_meta_security: Option<CaptchaMeta<'a>>,
}

/// Supabase Auth REST client.
#[derive(Clone)]
pub struct GoTrueClient {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl GoTrueClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `publishable_key` - The project's publishable (anon) key
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), api_url, publishable_key)
    }

    pub fn with_http_client(
        http_client: reqwest::Client,
        api_url: impl Into<String>,
        publishable_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
        }
    }

    /// Build the Auth API URL for an endpoint.
    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, endpoint)
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.auth_url(endpoint))
            .header("apikey", &self.publishable_key)
            .header("Accept", "application/json")
    }

    /// Email/password grant.
    pub async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> SupabaseResult<TokenResponse> {
        debug!(email = %email, "Requesting password grant");
        let response = self
            .post("token?grant_type=password")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = check(response, "password grant").await?;
        Ok(response.json().await?)
    }

    /// Exchange a refresh token for a new session.
    pub async fn refresh_grant(&self, refresh_token: &str) -> SupabaseResult<TokenResponse> {
        debug!("Requesting refresh grant");
        let response = self
            .post("token?grant_type=refresh_token")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let response = check(response, "refresh grant").await?;
        Ok(response.json().await?)
    }

    /// Create an email/password account.
    pub async fn sign_up(&self, email: &str, password: &str) -> SupabaseResult<SignUpResponse> {
        debug!(email = %email, "Creating account");
        let response = self
            .post("signup")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = check(response, "sign-up").await?;
        Ok(response.json().await?)
    }

    /// Set display name metadata on the signed-in user.
    pub async fn update_display_name(
        &self,
        access_token: &str,
        display_name: &str,
    ) -> SupabaseResult<GoTrueUser> {
        let metadata = UserMetadata {
            display_name: Some(display_name.to_string()),
            full_name: Some(display_name.to_string()),
        };
        let response = self
            .http_client
            .put(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "data": metadata }))
            .send()
            .await?;
        let response = check(response, "user update").await?;
        Ok(response.json().await?)
    }

    /// Fetch the user behind an access token.
    pub async fn get_user(&self, access_token: &str) -> SupabaseResult<GoTrueUser> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check(response, "user lookup").await?;
        Ok(response.json().await?)
    }

    /// Send an SMS one-time code. `captcha_token` is forwarded when present.
    pub async fn send_sms_otp(
        &self,
        phone: &str,
        captcha_token: Option<&str>,
    ) -> SupabaseResult<()> {
        debug!(phone = %phone, captcha = captcha_token.is_some(), "Sending SMS code");
        let response = self
            .post("otp")
            .json(&OtpRequest {
                phone,
                gotrue_meta_security: captcha_token
                    .map(|captcha_token| CaptchaMeta { captcha_token }),
            })
            .send()
            .await?;
        check(response, "otp").await?;
        Ok(())
    }

    /// Verify an SMS one-time code.
    pub async fn verify_sms_otp(&self, phone: &str, token: &str) -> SupabaseResult<TokenResponse> {
        let response = self
            .post("verify")
            .json(&serde_json::json!({ "type": "sms", "phone": phone, "token": token }))
            .send()
            .await?;
        let response = check(response, "verify").await?;
        Ok(response.json().await?)
    }

    /// Revoke the session behind `access_token`.
    pub async fn logout(&self, access_token: &str) -> SupabaseResult<()> {
        let response = self
            .post("logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        check(response, "logout").await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response, what: &str) -> SupabaseResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = parse_error(status.as_u16(), &body);
    warn!(
        status = %status,
        body_summary = %summarize_response_body(&body),
        code = error.vocabulary_code(),
        "Supabase Auth {} failed",
        what
    );
    Err(error)
}
