//! View state machine for the sign-in modal, using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!            ChooseEmail
//! ┌──────────────┐ ───────────► ┌──────────────┐
//! │ MethodChoice │              │  EmailForm   │
//! └──────────────┘ ◄─────────── └──────────────┘
//!    ▲       │      Back / ToggleMode
//!    └───────┘
//!    ToggleMode
//! ```
//!
//! Toggling between sign-in and sign-up always lands on `MethodChoice`.
//! Everything else (which flow is in flight, the phone sub-state) lives in
//! the orchestrator's `ModalFlowState`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates module `modal_view` with:
// - modal_view::State
// - modal_view::Input
// - modal_view::Impl (the transition table)
state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub modal_view(MethodChoice)

    MethodChoice => {
        ChooseEmail => EmailForm,
        ToggleMode => MethodChoice
    },
    EmailForm => {
        Back => MethodChoice,
        ToggleMode => MethodChoice
    }
}

pub use modal_view::Input as ModalViewInput;
pub use modal_view::State as ModalView;

impl Default for ModalView {
    fn default() -> Self {
        ModalView::MethodChoice
    }
}

/// Apply `input` to `view`, or `None` if the table has no such transition.
pub fn next_view(view: &ModalView, input: &ModalViewInput) -> Option<ModalView> {
    <modal_view::Impl as StateMachineImpl>::transition(view, input)
}

/// Whether the modal signs an existing account in or creates a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_view_is_method_choice() {
        assert_eq!(ModalView::default(), ModalView::MethodChoice);
    }

    #[test]
    fn test_choose_email_then_back() {
        let view = next_view(&ModalView::MethodChoice, &ModalViewInput::ChooseEmail).unwrap();
        assert_eq!(view, ModalView::EmailForm);

        let view = next_view(&view, &ModalViewInput::Back).unwrap();
        assert_eq!(view, ModalView::MethodChoice);
    }

    #[test]
    fn test_toggle_mode_always_lands_on_method_choice() {
        assert_eq!(
            next_view(&ModalView::EmailForm, &ModalViewInput::ToggleMode),
            Some(ModalView::MethodChoice)
        );
        assert_eq!(
            next_view(&ModalView::MethodChoice, &ModalViewInput::ToggleMode),
            Some(ModalView::MethodChoice)
        );
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        assert_eq!(next_view(&ModalView::MethodChoice, &ModalViewInput::Back), None);
        assert_eq!(
            next_view(&ModalView::EmailForm, &ModalViewInput::ChooseEmail),
            None
        );
    }

    #[test]
    fn test_mode_toggle() {
        assert_eq!(AuthMode::default(), AuthMode::SignIn);
        assert_eq!(AuthMode::SignIn.toggled(), AuthMode::SignUp);
        assert_eq!(AuthMode::SignUp.toggled(), AuthMode::SignIn);
    }
}
