//! Supabase provider error types and their mapping into the `auth/...`
//! provider vocabulary.

use auth_session::ProviderError;
use thiserror::Error;

/// Supabase provider error type.
#[derive(Error, Debug)]
pub enum SupabaseError {
    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GoTrue answered with a non-success status.
    #[error("Supabase Auth returned {status}: {message}")]
    Api {
        status: u16,
        error_code: Option<String>,
        message: String,
    },

    /// Unexpected response body.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The call needs a signed-in session and there is none.
    #[error("Not signed in")]
    NotSignedIn,

    /// Sign-up succeeded but the account must confirm its email first.
    #[error("Account created; email confirmation required")]
    ConfirmationRequired,

    /// Federated sign-in was not completed in time or was abandoned.
    #[error("Federated sign-in was not completed")]
    FederatedAbandoned,

    /// Federated sign-in failed on the web app side.
    #[error("Federated sign-in failed: {0}")]
    FederatedFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using SupabaseError.
pub type SupabaseResult<T> = Result<T, SupabaseError>;

impl SupabaseError {
    /// The `auth/...` code this error is reported under.
    pub fn vocabulary_code(&self) -> &'static str {
        match self {
            SupabaseError::Http(e) if e.is_timeout() => "auth/timeout",
            SupabaseError::Http(e) if e.is_decode() => "auth/internal-error",
            SupabaseError::Http(_) => "auth/network-request-failed",
            SupabaseError::Api {
                status, error_code, ..
            } => gotrue_code(*status, error_code.as_deref()),
            SupabaseError::InvalidResponse(_) => "auth/internal-error",
            SupabaseError::NotSignedIn => "auth/no-current-user",
            SupabaseError::ConfirmationRequired => "auth/email-not-confirmed",
            SupabaseError::FederatedAbandoned => "auth/popup-closed-by-user",
            SupabaseError::FederatedFailed(_) => "auth/internal-error",
            SupabaseError::Config(_) => "auth/invalid-api-key",
        }
    }
}

impl From<SupabaseError> for ProviderError {
    fn from(error: SupabaseError) -> Self {
        ProviderError::new(error.vocabulary_code(), error.to_string())
    }
}

/// Translate a GoTrue error code (or bare HTTP status) into the vocabulary.
pub fn gotrue_code(status: u16, error_code: Option<&str>) -> &'static str {
    match error_code.unwrap_or_default() {
        "invalid_credentials" | "invalid_grant" => "auth/invalid-credential",
        "user_not_found" => "auth/user-not-found",
        "user_banned" => "auth/user-disabled",
        "user_already_exists" | "email_exists" | "phone_exists" | "identity_already_exists" => {
            "auth/email-already-in-use"
        }
        "weak_password" => "auth/weak-password",
        "email_address_invalid" => "auth/invalid-email",
        "sms_send_failed" | "phone_not_confirmed" => "auth/invalid-phone-number",
        "over_request_rate_limit" | "over_email_send_rate_limit" | "over_sms_send_rate_limit" => {
            "auth/too-many-requests"
        }
        "otp_expired" => "auth/code-expired",
        "captcha_failed" => "auth/captcha-check-failed",
        "email_provider_disabled"
        | "phone_provider_disabled"
        | "provider_disabled"
        | "signup_disabled"
        | "anonymous_provider_disabled" => "auth/operation-not-allowed",
        "email_not_confirmed" => "auth/email-not-confirmed",
        "session_not_found" | "bad_jwt" | "no_authorization" => "auth/user-token-expired",
        _ => match status {
            429 => "auth/too-many-requests",
            400 | 401 => "auth/invalid-credential",
            500..=599 => "auth/internal-error",
            _ => "auth/unknown",
        },
    }
}
