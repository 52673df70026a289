//! Sign-in modal orchestrator.
//!
//! Owns the modal's [`ModalFlowState`], validates input locally, starts at
//! most one operation at a time against the [`SessionStore`], and applies the
//! result when it resolves. The state lock is never held across an `.await`.
//!
//! Each started operation captures the current epoch. Opening, closing and
//! resetting the modal bump the epoch, so a resolution that arrives after the
//! modal was closed (or reopened) is dropped instead of resurrecting old
//! state.

use crate::classifier::{classify_error, classify_localized, ClassifiedError, Locale};
use crate::host::HostSignals;
use crate::modal_fsm::{next_view, AuthMode, ModalView, ModalViewInput};
use crate::operation::{AuthMethod, AuthOperation, OperationOutcome};
use crate::provider::{ChallengeAnchor, ChallengeHandle, Identity};
use crate::store::SessionStore;
use crate::validation::{
    validate_phone_number, validate_sign_in, validate_sign_up, validate_verification_code,
};
use crate::{AuthError, AuthResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ephemeral state of the sign-in modal.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ModalFlowState {
    pub mode: AuthMode,
    pub view: ModalView,
    pub phone_challenge_issued: bool,
    pub active_method: Option<AuthMethod>,
    pub last_error: Option<ClassifiedError>,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub phone_number: String,
    pub verification_code: String,
    pub challenge: Option<ChallengeHandle>,
}

impl fmt::Debug for ModalFlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalFlowState")
            .field("mode", &self.mode)
            .field("view", &self.view)
            .field("phone_challenge_issued", &self.phone_challenge_issued)
            .field("active_method", &self.active_method)
            .field("last_error", &self.last_error)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("phone_number", &self.phone_number)
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

/// Why a submit did not start an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    ModalClosed,
    /// Another operation (or the same one) is already in flight.
    Busy(AuthMethod),
    /// The submit does not belong to the current view.
    WrongView,
    ChallengeAlreadyIssued,
    NoChallengeIssued,
}

/// Result of a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened; the store was not called.
    Ignored(IgnoreReason),
    /// Local validation failed; the store was not called.
    Rejected(ClassifiedError),
    /// The provider rejected the operation.
    Failed(ClassifiedError),
    /// A phone challenge was issued; the modal now expects a code.
    ChallengeIssued,
    /// Signed in; the modal was reset and closed and the host navigated.
    Authenticated(Identity),
    /// The operation resolved after the modal was closed or reopened.
    Stale,
}

enum Refusal {
    Ignore(IgnoreReason),
    Invalid(&'static str),
}

impl From<IgnoreReason> for Refusal {
    fn from(reason: IgnoreReason) -> Self {
        Refusal::Ignore(reason)
    }
}

#[derive(Debug, Default)]
struct Inner {
    flow: ModalFlowState,
    open: bool,
    epoch: u64,
}

impl Inner {
    fn reset(&mut self) {
        self.flow = ModalFlowState::default();
        self.epoch += 1;
    }
}

/// Drives the sign-in modal. The modal starts closed.
pub struct SignInOrchestrator {
    store: Arc<SessionStore>,
    host: Arc<dyn HostSignals>,
    locale: Locale,
    anchor: ChallengeAnchor,
    inner: Mutex<Inner>,
}

impl SignInOrchestrator {
    pub fn new(store: Arc<SessionStore>, host: Arc<dyn HostSignals>) -> Self {
        Self {
            store,
            host,
            locale: Locale::default(),
            anchor: ChallengeAnchor::default(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Language of classified error messages.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Anchor passed to every phone challenge.
    pub fn with_challenge_anchor(mut self, anchor: ChallengeAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    // ========================================================================
    // Open / close
    // ========================================================================

    pub fn open(&self) {
        self.set_open(true);
    }

    /// Follow the host's open flag. Closing resets the flow unconditionally.
    pub fn set_open(&self, open: bool) {
        let mut inner = self.inner.lock();
        if open {
            if !inner.open {
                inner.open = true;
                inner.epoch += 1;
                debug!(epoch = inner.epoch, "Sign-in modal opened");
            }
        } else {
            inner.open = false;
            inner.reset();
            debug!(epoch = inner.epoch, "Sign-in modal closed by host");
        }
    }

    /// User dismissed the modal.
    ///
    /// Resets the flow, even with an operation in flight, and tells the host
    /// to close. Closing an already closed modal only resets.
    pub fn close(&self) {
        let was_open = {
            let mut inner = self.inner.lock();
            let was_open = inner.open;
            inner.open = false;
            inner.reset();
            was_open
        };
        if was_open {
            debug!("Sign-in modal dismissed");
            self.host.close_auth_modal();
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Snapshot of the flow state.
    pub fn state(&self) -> ModalFlowState {
        self.inner.lock().flow.clone()
    }

    pub fn last_error(&self) -> Option<ClassifiedError> {
        self.inner.lock().flow.last_error.clone()
    }

    /// True when a submit of `method` would start: the modal is open, nothing
    /// is in flight, and the current view offers `method`.
    pub fn is_method_enabled(&self, method: AuthMethod) -> bool {
        let inner = self.inner.lock();
        if !inner.open || inner.flow.active_method.is_some() {
            return false;
        }
        let flow = &inner.flow;
        match method {
            AuthMethod::Federated => flow.view == ModalView::MethodChoice,
            AuthMethod::PasswordSignIn => {
                flow.view == ModalView::EmailForm && flow.mode == AuthMode::SignIn
            }
            AuthMethod::PasswordSignUp => {
                flow.view == ModalView::EmailForm && flow.mode == AuthMode::SignUp
            }
            AuthMethod::PhoneChallenge => {
                flow.view == ModalView::MethodChoice && !flow.phone_challenge_issued
            }
            AuthMethod::PhoneConfirm => {
                flow.view == ModalView::MethodChoice && flow.phone_challenge_issued
            }
            AuthMethod::SignOut => false,
        }
    }

    /// True while `method` is the operation in flight.
    pub fn is_in_progress(&self, method: AuthMethod) -> bool {
        self.inner.lock().flow.active_method == Some(method)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    pub fn set_email(&self, email: impl Into<String>) {
        self.inner.lock().flow.email = email.into();
    }

    pub fn set_password(&self, password: impl Into<String>) {
        self.inner.lock().flow.password = password.into();
    }

    pub fn set_display_name(&self, display_name: impl Into<String>) {
        self.inner.lock().flow.display_name = display_name.into();
    }

    pub fn set_phone_number(&self, phone_number: impl Into<String>) {
        self.inner.lock().flow.phone_number = phone_number.into();
    }

    pub fn set_verification_code(&self, code: impl Into<String>) {
        self.inner.lock().flow.verification_code = code.into();
    }

    // ========================================================================
    // View transitions
    // ========================================================================

    pub fn choose_email(&self) -> AuthResult<ModalView> {
        self.transition(ModalViewInput::ChooseEmail)
    }

    pub fn back(&self) -> AuthResult<ModalView> {
        self.transition(ModalViewInput::Back)
    }

    /// Flip between sign-in and sign-up. Always lands on the method choice.
    pub fn toggle_mode(&self) -> AuthResult<AuthMode> {
        let mut inner = self.inner.lock();
        let view = apply(inner.flow.view, ModalViewInput::ToggleMode)?;
        inner.flow.view = view;
        inner.flow.mode = inner.flow.mode.toggled();
        inner.flow.last_error = None;
        debug!(mode = ?inner.flow.mode, "Auth mode toggled");
        Ok(inner.flow.mode)
    }

    /// Forget an issued phone challenge so a new one can be requested.
    ///
    /// Refused while an operation is in flight.
    pub fn restart_phone_challenge(&self) -> AuthResult<()> {
        let mut inner = self.inner.lock();
        if let Some(active) = inner.flow.active_method {
            return Err(AuthError::InvalidStateTransition(format!(
                "cannot restart phone challenge while {active} is in flight"
            )));
        }
        inner.flow.phone_challenge_issued = false;
        inner.flow.challenge = None;
        inner.flow.verification_code.clear();
        inner.flow.last_error = None;
        Ok(())
    }

    fn transition(&self, input: ModalViewInput) -> AuthResult<ModalView> {
        let mut inner = self.inner.lock();
        let view = apply(inner.flow.view, input)?;
        inner.flow.view = view;
        inner.flow.last_error = None;
        Ok(view)
    }

    // ========================================================================
    // Submits
    // ========================================================================

    /// Start the federated sign-in from the method choice.
    pub async fn submit_federated(&self) -> SubmitOutcome {
        self.submit(|flow| {
            require_view(flow, ModalView::MethodChoice)?;
            Ok(AuthOperation::FederatedSignIn)
        })
        .await
    }

    /// Submit the email form: sign in or sign up depending on the mode.
    pub async fn submit_password(&self) -> SubmitOutcome {
        self.submit(|flow| {
            require_view(flow, ModalView::EmailForm)?;
            match flow.mode {
                AuthMode::SignIn => {
                    validate_sign_in(&flow.email, &flow.password).map_err(Refusal::Invalid)?;
                    Ok(AuthOperation::PasswordSignIn {
                        email: flow.email.trim().to_string(),
                        password: flow.password.clone(),
                    })
                }
                AuthMode::SignUp => {
                    validate_sign_up(&flow.email, &flow.password, &flow.display_name)
                        .map_err(Refusal::Invalid)?;
                    Ok(AuthOperation::PasswordSignUp {
                        email: flow.email.trim().to_string(),
                        password: flow.password.clone(),
                        display_name: flow.display_name.trim().to_string(),
                    })
                }
            }
        })
        .await
    }

    /// Request a phone verification code.
    pub async fn submit_phone(&self) -> SubmitOutcome {
        let anchor = self.anchor.clone();
        self.submit(move |flow| {
            require_view(flow, ModalView::MethodChoice)?;
            if flow.phone_challenge_issued {
                return Err(IgnoreReason::ChallengeAlreadyIssued.into());
            }
            validate_phone_number(&flow.phone_number).map_err(Refusal::Invalid)?;
            Ok(AuthOperation::PhoneChallenge {
                phone_number: flow.phone_number.trim().to_string(),
                anchor,
            })
        })
        .await
    }

    /// Confirm the issued phone challenge with the entered code.
    pub async fn submit_verification_code(&self) -> SubmitOutcome {
        self.submit(|flow| {
            require_view(flow, ModalView::MethodChoice)?;
            let handle = match (&flow.challenge, flow.phone_challenge_issued) {
                (Some(handle), true) => handle.clone(),
                _ => return Err(IgnoreReason::NoChallengeIssued.into()),
            };
            validate_verification_code(&flow.verification_code).map_err(Refusal::Invalid)?;
            Ok(AuthOperation::PhoneConfirm {
                handle,
                code: flow.verification_code.trim().to_string(),
            })
        })
        .await
    }

    async fn submit<F>(&self, prepare: F) -> SubmitOutcome
    where
        F: FnOnce(&ModalFlowState) -> Result<AuthOperation, Refusal>,
    {
        let (operation, epoch) = match self.begin(prepare) {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let method = operation.method();
        info!(method = %method, epoch, "Starting auth operation");
        let result = self.store.execute(operation).await;
        self.finish(method, epoch, result)
    }

    /// Check guards, validate, and mark the operation active, all under one
    /// lock so two submits can never both start.
    fn begin<F>(&self, prepare: F) -> Result<(AuthOperation, u64), SubmitOutcome>
    where
        F: FnOnce(&ModalFlowState) -> Result<AuthOperation, Refusal>,
    {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(SubmitOutcome::Ignored(IgnoreReason::ModalClosed));
        }
        if let Some(active) = inner.flow.active_method {
            debug!(active = %active, "Submit ignored while an operation is in flight");
            return Err(SubmitOutcome::Ignored(IgnoreReason::Busy(active)));
        }

        match prepare(&inner.flow) {
            Ok(operation) => {
                inner.flow.last_error = None;
                inner.flow.active_method = Some(operation.method());
                Ok((operation, inner.epoch))
            }
            Err(Refusal::Ignore(reason)) => Err(SubmitOutcome::Ignored(reason)),
            Err(Refusal::Invalid(code)) => {
                let error = classify_localized(code, self.locale);
                debug!(code, "Submit rejected by local validation");
                inner.flow.last_error = Some(error.clone());
                Err(SubmitOutcome::Rejected(error))
            }
        }
    }

    fn finish(
        &self,
        method: AuthMethod,
        epoch: u64,
        result: AuthResult<OperationOutcome>,
    ) -> SubmitOutcome {
        let mut inner = self.inner.lock();
        let live = inner.open && inner.epoch == epoch && inner.flow.active_method == Some(method);
        if !live {
            debug!(method = %method, epoch, current = inner.epoch, "Dropping stale resolution");
            return SubmitOutcome::Stale;
        }

        match result {
            Ok(OperationOutcome::Authenticated(identity)) => {
                inner.open = false;
                inner.reset();
                drop(inner);

                info!(method = %method, uid = %identity.uid, "Signed in from modal");
                self.host.navigate_to_authenticated_area();
                self.host.close_auth_modal();
                SubmitOutcome::Authenticated(identity)
            }
            Ok(OperationOutcome::ChallengeIssued(handle)) => {
                inner.flow.active_method = None;
                inner.flow.phone_challenge_issued = true;
                inner.flow.challenge = Some(handle);
                SubmitOutcome::ChallengeIssued
            }
            Ok(OperationOutcome::SignedOut) => {
                let error = AuthError::InvalidStateTransition(format!(
                    "{method} resolved as a sign-out"
                ));
                self.fail(&mut inner, method, &error)
            }
            Err(error) => self.fail(&mut inner, method, &error),
        }
    }

    fn fail(&self, inner: &mut Inner, method: AuthMethod, error: &AuthError) -> SubmitOutcome {
        let classified = classify_error(error, self.locale);
        warn!(
            method = %method,
            code = %error.code(),
            category = ?classified.category(),
            "Auth operation failed in modal"
        );
        inner.flow.active_method = None;
        inner.flow.last_error = Some(classified.clone());
        SubmitOutcome::Failed(classified)
    }
}

fn apply(view: ModalView, input: ModalViewInput) -> AuthResult<ModalView> {
    next_view(&view, &input).ok_or_else(|| {
        AuthError::InvalidStateTransition(format!("{input:?} is not valid in {view:?}"))
    })
}

fn require_view(flow: &ModalFlowState, view: ModalView) -> Result<(), Refusal> {
    if flow.view == view {
        Ok(())
    } else {
        Err(IgnoreReason::WrongView.into())
    }
}
