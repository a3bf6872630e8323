//! Notification bus: named listeners, synchronous broadcast

use super::Level;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, error};

/// Handler invoked for every emission: `(level, message, title)`
pub type Handler = Arc<dyn Fn(Level, &str, Option<&str>) + Send + Sync>;

/// Wiring defects surfaced by [`NotificationBus::register_listener`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("listener named {name} has been already registered")]
    DuplicateListener { name: String },
}

struct Listener {
    name: String,
    handler: Handler,
}

/// In-process publish/subscribe registry for user-facing notifications.
///
/// Cloning is cheap and every clone shares the same registry, so bootstrap
/// creates one bus and hands clones to whatever publishes or subscribes.
/// Separate `NotificationBus::new()` instances never see each other's listeners.
///
/// Emission is synchronous: `emit` returns once every listener has been called,
/// in registration order. The registry is snapshotted before dispatch, so
/// listeners may register or unregister (themselves included) from inside a
/// handler without affecting the broadcast in progress.
#[derive(Clone, Default)]
pub struct NotificationBus {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under a unique `name`.
    ///
    /// Fails if the name is taken; the existing listener is left untouched.
    pub fn register_listener<F>(&self, name: impl Into<String>, handler: F) -> Result<(), BusError>
    where
        F: Fn(Level, &str, Option<&str>) + Send + Sync + 'static,
    {
        let name = name.into();
        let mut listeners = self.write();
        if listeners.iter().any(|l| l.name == name) {
            return Err(BusError::DuplicateListener { name });
        }

        debug!(listener = %name, "Notification listener registered");
        listeners.push(Listener {
            name,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Remove the listener registered under `name`.
    ///
    /// Unknown names are ignored. Returns `true` if a listener was removed.
    pub fn unregister_listener(&self, name: &str) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|l| l.name != name);
        let removed = listeners.len() != before;
        if removed {
            debug!(listener = %name, "Notification listener unregistered");
        }
        removed
    }

    /// Deliver a notification to every registered listener.
    ///
    /// A listener that panics is logged and skipped; the remaining listeners
    /// still receive the notification.
    pub fn emit(&self, level: Level, message: &str, title: Option<&str>) {
        let snapshot: Vec<(String, Handler)> = self
            .read()
            .iter()
            .map(|l| (l.name.clone(), Arc::clone(&l.handler)))
            .collect();

        debug!(
            level = %level,
            listeners = snapshot.len(),
            "Notification emitted"
        );

        for (name, handler) in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(level, message, title)));
            if result.is_err() {
                error!(listener = %name, level = %level, "Notification listener panicked");
            }
        }
    }

    pub fn emit_info(&self, message: &str, title: Option<&str>) {
        self.emit(Level::Info, message, title);
    }

    pub fn emit_warn(&self, message: &str, title: Option<&str>) {
        self.emit(Level::Warn, message, title);
    }

    pub fn emit_error(&self, message: &str, title: Option<&str>) {
        self.emit(Level::Error, message, title);
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.read().len()
    }

    /// Listener names in registration order
    pub fn listener_names(&self) -> Vec<String> {
        self.read().iter().map(|l| l.name.clone()).collect()
    }

    // Handlers never run under the lock; a poisoned registry is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Listener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Listener>> {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listeners", &self.listener_names())
            .finish()
    }
}
