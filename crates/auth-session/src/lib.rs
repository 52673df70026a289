//! Authentication session core for the dashboard.
//!
//! This crate provides:
//! - The identity provider capability interface
//! - A session store fed only by provider notifications
//! - Subscription lifecycle management with exactly-once cleanup
//! - The sign-in modal orchestrator (FSM-based view state, mutual exclusion)
//! - Error classification into a closed, localized taxonomy

mod classifier;
mod error;
mod host;
mod listener;
mod modal_fsm;
mod operation;
mod orchestrator;
mod provider;
mod store;
pub mod testing;
mod validation;

pub use classifier::{
    classify, classify_error, classify_localized, local, ClassifiedError, ErrorCategory, Locale,
};
pub use error::{AuthError, AuthResult, NON_PROVIDER_CODE};
pub use host::{HostSignal, HostSignals, NullHost, RecordingHost};
pub use listener::ListenerLifecycle;
pub use modal_fsm::{modal_view, next_view, AuthMode, ModalView, ModalViewInput};
pub use operation::{AuthMethod, AuthOperation, OperationOutcome};
pub use orchestrator::{IgnoreReason, ModalFlowState, SignInOrchestrator, SubmitOutcome};
pub use provider::{
    ChallengeAnchor, ChallengeHandle, Identity, IdentityProvider, ProviderError, ProviderResult,
    SessionListener, Unsubscribe,
};
pub use store::{AuthState, Session, SessionStore};
pub use validation::{
    is_well_formed_email, validate_phone_number, validate_sign_in, validate_sign_up,
    validate_verification_code, ValidationResult, MIN_PASSWORD_LENGTH,
};
