//! Observable
//!
//! An [`Observable`] is a registry of zero-argument callbacks. Every node owns
//! one and notifies it after installing a changed value; downstream nodes
//! register a callback on each of their dependencies.
//!
//! # Thread Safety
//!
//! Registrations live in a concurrent map. `notify` first copies the live
//! registrations out of the map and only then invokes them, so no lock is
//! held while user code runs. A callback may therefore register new callbacks
//! or drop its own [`CallbackHandle`] while it is being notified.
//!
//! Dropping a handle clears the registration's active flag, and `notify`
//! checks that flag right before each call. A call whose check already passed
//! on another thread still runs, even if the handle is dropped in between.
//! Graph callbacks only hold weak references to their owner, so such a late
//! call finds the owner gone and does nothing.
//!
//! # Lifetime
//!
//! The handle, not the observable, owns the removal. It keeps a weak
//! back-reference to the registry, so dropping a handle after its observable
//! is gone is a harmless no-op.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use smallvec::SmallVec;

/// Unique identifier for a registered callback.
///
/// Uses an atomic counter to ensure uniqueness across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Registration {
    active: AtomicBool,
    callback: Box<dyn Fn() + Send + Sync>,
}

#[derive(Default)]
struct Registry {
    callbacks: DashMap<CallbackId, Arc<Registration>>,
}

/// Multi-subscriber change notification.
#[derive(Default)]
pub struct Observable {
    registry: Arc<Registry>,
}

impl Observable {
    /// Create an observable with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays registered until the handle is dropped.
    pub fn add_callback<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = CallbackId::next();
        let registration = Arc::new(Registration {
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        self.registry
            .callbacks
            .insert(id, Arc::clone(&registration));

        CallbackHandle {
            id,
            registration,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every registered callback on the calling thread.
    pub fn notify(&self) {
        let live: SmallVec<[Arc<Registration>; 8]> = self
            .registry
            .callbacks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for registration in live {
            if registration.active.load(Ordering::Acquire) {
                (registration.callback)();
            }
        }
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.registry.callbacks.len()
    }
}

impl Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

/// Scoped registration of a callback.
///
/// Dropping the handle removes the callback.
#[must_use = "dropping the handle unregisters the callback"]
pub struct CallbackHandle {
    id: CallbackId,
    registration: Arc<Registration>,
    registry: Weak<Registry>,
}

impl CallbackHandle {
    /// The registration's identifier.
    pub fn id(&self) -> CallbackId {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        self.registration.active.store(false, Ordering::Release);
        if let Some(registry) = self.registry.upgrade() {
            registry.callbacks.remove(&self.id);
        }
    }
}

impl Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.id)
            .field("active", &self.registration.active.load(Ordering::Relaxed))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
