//! Named before-hooks applied to every request right before dispatch.
//!
//! # Design
//! The registry is a shared handle. The suite, every composed topic, and any
//! check that wants to register a hook mid-run all hold clones of the same
//! `Arc`. Hooks are read when a topic runs, not when it is composed, which
//! is what lets a token captured in one batch reach requests of the next.
//!
//! Re-registering an existing name replaces the hook in place: it keeps its
//! original position in the application order.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::http::OutgoingRequest;

/// A synchronous request transform.
pub type BeforeHook = Arc<dyn Fn(OutgoingRequest) -> OutgoingRequest + Send + Sync>;

/// Shared, insertion-ordered set of named before-hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<RwLock<IndexMap<String, BeforeHook>>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry").field("names", &self.names()).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(OutgoingRequest) -> OutgoingRequest + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(hook = %name, "Registering before hook");
        self.hooks.write().insert(name, Arc::new(hook));
    }

    /// Removes `name`. Unknown names are ignored.
    pub fn unregister(&self, name: &str) {
        if self.hooks.write().shift_remove(name).is_some() {
            tracing::debug!(hook = %name, "Removed before hook");
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.hooks.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Threads `request` through every hook in registration order.
    pub fn apply(&self, request: OutgoingRequest) -> OutgoingRequest {
        // Snapshot first so a hook may touch the registry without deadlocking.
        let hooks: Vec<(String, BeforeHook)> = self
            .hooks
            .read()
            .iter()
            .map(|(name, hook)| (name.clone(), Arc::clone(hook)))
            .collect();

        hooks.into_iter().fold(request, |request, (name, hook)| {
            tracing::debug!(hook = %name, uri = %request.uri, "Running before hook");
            hook(request)
        })
    }
}
