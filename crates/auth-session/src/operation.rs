//! Authentication operations and their outcomes.

use crate::provider::{ChallengeAnchor, ChallengeHandle, Identity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload-free tag of an [`AuthOperation`].
///
/// The sign-in modal records the tag of the operation in flight to drive
/// per-button progress indicators and mutual exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    PasswordSignIn,
    PasswordSignUp,
    Federated,
    PhoneChallenge,
    PhoneConfirm,
    SignOut,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::PasswordSignIn => "password_sign_in",
            AuthMethod::PasswordSignUp => "password_sign_up",
            AuthMethod::Federated => "federated",
            AuthMethod::PhoneChallenge => "phone_challenge",
            AuthMethod::PhoneConfirm => "phone_confirm",
            AuthMethod::SignOut => "sign_out",
        }
    }

    /// True if a successful run of this method yields a signed-in identity.
    pub fn produces_identity(&self) -> bool {
        matches!(
            self,
            AuthMethod::PasswordSignIn
                | AuthMethod::PasswordSignUp
                | AuthMethod::Federated
                | AuthMethod::PhoneConfirm
        )
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authentication request against the session store.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthOperation {
    PasswordSignIn {
        email: String,
        password: String,
    },
    PasswordSignUp {
        email: String,
        password: String,
        display_name: String,
    },
    FederatedSignIn,
    PhoneChallenge {
        phone_number: String,
        anchor: ChallengeAnchor,
    },
    PhoneConfirm {
        handle: ChallengeHandle,
        code: String,
    },
    SignOut,
}

impl AuthOperation {
    pub fn method(&self) -> AuthMethod {
        match self {
            AuthOperation::PasswordSignIn { .. } => AuthMethod::PasswordSignIn,
            AuthOperation::PasswordSignUp { .. } => AuthMethod::PasswordSignUp,
            AuthOperation::FederatedSignIn => AuthMethod::Federated,
            AuthOperation::PhoneChallenge { .. } => AuthMethod::PhoneChallenge,
            AuthOperation::PhoneConfirm { .. } => AuthMethod::PhoneConfirm,
            AuthOperation::SignOut => AuthMethod::SignOut,
        }
    }
}

// Credentials and codes never reach logs.
impl fmt::Debug for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOperation::PasswordSignIn { email, .. } => f
                .debug_struct("PasswordSignIn")
                .field("email", email)
                .finish_non_exhaustive(),
            AuthOperation::PasswordSignUp {
                email,
                display_name,
                ..
            } => f
                .debug_struct("PasswordSignUp")
                .field("email", email)
                .field("display_name", display_name)
                .finish_non_exhaustive(),
            AuthOperation::FederatedSignIn => f.write_str("FederatedSignIn"),
            AuthOperation::PhoneChallenge {
                phone_number,
                anchor,
            } => f
                .debug_struct("PhoneChallenge")
                .field("phone_number", phone_number)
                .field("anchor", anchor)
                .finish(),
            AuthOperation::PhoneConfirm { handle, .. } => f
                .debug_struct("PhoneConfirm")
                .field("handle", handle)
                .finish_non_exhaustive(),
            AuthOperation::SignOut => f.write_str("SignOut"),
        }
    }
}

/// Successful result of executing an [`AuthOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Authenticated(Identity),
    ChallengeIssued(ChallengeHandle),
    SignedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tags() {
        let op = AuthOperation::PasswordSignUp {
            email: "a@b.co".to_string(),
            password: "abc123".to_string(),
            display_name: "A".to_string(),
        };
        assert_eq!(op.method(), AuthMethod::PasswordSignUp);
        assert_eq!(AuthOperation::FederatedSignIn.method(), AuthMethod::Federated);
        assert_eq!(AuthOperation::SignOut.method(), AuthMethod::SignOut);
    }

    #[test]
    fn test_produces_identity() {
        assert!(AuthMethod::PasswordSignIn.produces_identity());
        assert!(AuthMethod::Federated.produces_identity());
        assert!(AuthMethod::PhoneConfirm.produces_identity());
        assert!(!AuthMethod::PhoneChallenge.produces_identity());
        assert!(!AuthMethod::SignOut.produces_identity());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let sign_in = AuthOperation::PasswordSignIn {
            email: "dev@foo.com".to_string(),
            password: "hunter2".to_string(),
        };
        let confirm = AuthOperation::PhoneConfirm {
            handle: ChallengeHandle::new("verification-1"),
            code: "123456".to_string(),
        };

        let rendered = format!("{sign_in:?} {confirm:?}");
        assert!(rendered.contains("dev@foo.com"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("123456"));
    }
}
