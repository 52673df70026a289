//! Signals the sign-in modal sends to its host.
//!
//! The orchestrator emits a signal after it has reset its own state. What a
//! signal means (route change, window close, terminal message) is up to the
//! host.

use parking_lot::Mutex;

/// A signal emitted by the sign-in orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// A sign-in completed; show the authenticated area.
    NavigateToAuthenticatedArea,
    /// The modal closed itself.
    CloseAuthModal,
}

/// Receiver of orchestrator signals. Both calls are fire-and-forget.
pub trait HostSignals: Send + Sync {
    fn navigate_to_authenticated_area(&self);

    fn close_auth_modal(&self);
}

/// A host that ignores every signal.
#[derive(Debug, Default)]
pub struct NullHost;

impl HostSignals for NullHost {
    fn navigate_to_authenticated_area(&self) {}

    fn close_auth_modal(&self) {}
}

/// A host that records every signal for testing.
#[derive(Debug, Default)]
pub struct RecordingHost {
    signals: Mutex<Vec<HostSignal>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded signals, oldest first.
    pub fn signals(&self) -> Vec<HostSignal> {
        self.signals.lock().clone()
    }

    /// Number of times `signal` was recorded.
    pub fn count(&self, signal: HostSignal) -> usize {
        self.signals.lock().iter().filter(|s| **s == signal).count()
    }

    pub fn clear(&self) {
        self.signals.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.signals.lock().is_empty()
    }
}

impl HostSignals for RecordingHost {
    fn navigate_to_authenticated_area(&self) {
        self.signals.lock().push(HostSignal::NavigateToAuthenticatedArea);
    }

    fn close_auth_modal(&self) {
        self.signals.lock().push(HostSignal::CloseAuthModal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_host_records_in_order() {
        let host = RecordingHost::new();
        assert!(host.is_empty());

        host.navigate_to_authenticated_area();
        host.close_auth_modal();

        assert_eq!(
            host.signals(),
            vec![
                HostSignal::NavigateToAuthenticatedArea,
                HostSignal::CloseAuthModal
            ]
        );
        assert_eq!(host.count(HostSignal::CloseAuthModal), 1);

        host.clear();
        assert!(host.is_empty());
    }
}
