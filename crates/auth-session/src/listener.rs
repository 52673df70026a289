//! Subscription lifecycle tied to an owner's lifetime.
//!
//! [`ListenerLifecycle`] binds a "subscribe, get back an unsubscribe" setup
//! function to the lifetime of its owner and a dependency value:
//!
//! - the first [`sync`](ListenerLifecycle::sync) runs setup once and retains
//!   the returned [`Unsubscribe`];
//! - a later `sync` with equal dependencies does nothing;
//! - a later `sync` with different dependencies first runs the retained
//!   unsubscribe, then runs setup again;
//! - [`teardown`](ListenerLifecycle::teardown) and `Drop` run the retained
//!   unsubscribe and forget it.
//!
//! Because [`Unsubscribe`] is consumed when called, a retained callback runs
//! exactly once per successful setup.

use crate::provider::Unsubscribe;
use std::convert::Infallible;
use tracing::trace;

/// Owns at most one live subscription and the dependencies it was made for.
#[derive(Debug)]
pub struct ListenerLifecycle<D> {
    deps: Option<D>,
    unsubscribe: Option<Unsubscribe>,
}

impl<D> Default for ListenerLifecycle<D> {
    fn default() -> Self {
        Self {
            deps: None,
            unsubscribe: None,
        }
    }
}

impl<D> ListenerLifecycle<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a setup has run and not yet been torn down.
    pub fn is_mounted(&self) -> bool {
        self.deps.is_some()
    }

    /// Run the retained unsubscribe (if any) and forget the dependencies.
    ///
    /// Calling this again is a no-op.
    pub fn teardown(&mut self) {
        self.deps = None;
        if let Some(unsubscribe) = self.unsubscribe.take() {
            trace!("running retained unsubscribe");
            unsubscribe.call();
        }
    }
}

impl<D: PartialEq> ListenerLifecycle<D> {
    /// Establish the subscription for `deps`.
    ///
    /// Returns `Ok(true)` when setup ran, `Ok(false)` when the dependencies
    /// were unchanged. When setup fails the error is returned, nothing is
    /// retained, and the next `sync` will run setup again.
    pub fn sync<E, F>(&mut self, deps: D, setup: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<Option<Unsubscribe>, E>,
    {
        if self.deps.as_ref() == Some(&deps) {
            return Ok(false);
        }

        self.teardown();

        self.unsubscribe = setup()?;
        self.deps = Some(deps);
        Ok(true)
    }

    /// Infallible variant of [`sync`](Self::sync).
    pub fn mount<F>(&mut self, deps: D, setup: F) -> bool
    where
        F: FnOnce() -> Option<Unsubscribe>,
    {
        match self.sync(deps, || Ok::<_, Infallible>(setup())) {
            Ok(ran) => ran,
            Err(never) => match never {},
        }
    }
}

impl<D> Drop for ListenerLifecycle<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn spy() -> (Arc<AtomicUsize>, impl Fn() -> Option<Unsubscribe>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let setup = move || {
            let counter = counter.clone();
            Some(Unsubscribe::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        };
        (calls, setup)
    }

    #[test]
    fn test_mount_then_drop_unsubscribes_exactly_once() {
        let (unsubscribed, setup) = spy();
        {
            let mut lifecycle = ListenerLifecycle::new();
            assert!(lifecycle.mount((), &setup));
            assert_eq!(unsubscribed.load(Ordering::SeqCst), 0);
        }
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remount_with_same_deps_never_unsubscribes() {
        let (unsubscribed, setup) = spy();
        let setups = AtomicUsize::new(0);
        let mut lifecycle = ListenerLifecycle::new();

        for _ in 0..3 {
            lifecycle.mount((), || {
                setups.fetch_add(1, Ordering::SeqCst);
                setup()
            });
        }

        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (unsubscribed, setup) = spy();
        let mut lifecycle = ListenerLifecycle::new();
        lifecycle.mount("a", &setup);

        lifecycle.teardown();
        lifecycle.teardown();
        drop(lifecycle);

        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dependency_change_unsubscribes_before_next_setup() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = ListenerLifecycle::new();

        for deps in ["first", "second"] {
            let log = events.clone();
            lifecycle.mount(deps, || {
                log.lock().unwrap().push(format!("setup {deps}"));
                let log = log.clone();
                Some(Unsubscribe::new(move || {
                    log.lock().unwrap().push(format!("cleanup {deps}"));
                }))
            });
        }
        drop(lifecycle);

        assert_eq!(
            *events.lock().unwrap(),
            vec!["setup first", "cleanup first", "setup second", "cleanup second"]
        );
    }

    #[test]
    fn test_setup_without_unsubscribe_is_fine() {
        let mut lifecycle = ListenerLifecycle::new();
        assert!(lifecycle.mount(1u32, || None));
        assert!(lifecycle.is_mounted());
        lifecycle.teardown();
        assert!(!lifecycle.is_mounted());
    }

    #[test]
    fn test_failed_setup_retains_nothing() {
        let (unsubscribed, setup) = spy();
        let mut lifecycle = ListenerLifecycle::new();
        lifecycle.mount(1u32, &setup);

        let result: Result<bool, &str> = lifecycle.sync(2u32, || Err("provider unavailable"));
        assert_eq!(result, Err("provider unavailable"));
        // The previous subscription was torn down before the failed setup.
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
        assert!(!lifecycle.is_mounted());

        // Retrying with the same deps runs setup again.
        assert_eq!(lifecycle.sync(2u32, || Ok::<_, &str>(setup())), Ok(true));
        drop(lifecycle);
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 2);
    }
}
