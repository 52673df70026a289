//! Authentication error types.

use crate::provider::ProviderError;
use thiserror::Error;

/// Code reported for failures that did not come from the identity provider.
pub const NON_PROVIDER_CODE: &str = "unknown";

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider rejected the call.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Invalid state transition in the modal flow FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// The provider error code carried by this error, if any.
    ///
    /// Non-provider failures report [`NON_PROVIDER_CODE`], which the
    /// classifier maps to the generic `Unknown` category.
    pub fn code(&self) -> &str {
        match self {
            AuthError::Provider(e) => &e.code,
            _ => NON_PROVIDER_CODE,
        }
    }

    /// Returns true if retrying the same call later may succeed.
    ///
    /// Transient errors are transport failures and rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Provider(e) => matches!(
                e.code.strip_prefix("auth/").unwrap_or(&e.code),
                "network-request-failed" | "timeout" | "too-many-requests"
            ),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
