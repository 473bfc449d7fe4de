//! Message handler registry.
//!
//! Handlers are routed by the envelope's discriminator. Each registration
//! gets its own [`HandlerId`], so registering the same callback twice yields
//! two independently removable entries.
//!
//! Dispatch snapshots the handler list before invoking anything: handlers
//! may register or unregister (or tear down the whole session) while a
//! dispatch is running. A panicking handler is logged and does not stop
//! the handlers after it.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::identifiers::{HandlerId, IdSequence};
use crate::protocol::Envelope;

// ============================================================================
// Types
// ============================================================================

/// Message handler callback.
///
/// Receives the full decoded payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Entry {
    id: HandlerId,
    handler: Handler,
}

#[derive(Default)]
struct Routes {
    by_kind: FxHashMap<String, Vec<Entry>>,
    fallback: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Kind(String),
    Any,
}

// ============================================================================
// Registration
// ============================================================================

/// Token returned by a registration.
///
/// Dropping the token keeps the handler registered; call
/// [`unregister`](Self::unregister) to remove it.
#[derive(Debug)]
#[must_use = "dropping a Registration keeps the handler; call unregister() to remove it"]
pub struct Registration {
    routes: Weak<Mutex<Routes>>,
    route: Route,
    id: HandlerId,
}

impl Registration {
    /// Returns the registration ID.
    #[inline]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Removes exactly this registration.
    ///
    /// Returns `false` if it was already gone.
    pub fn unregister(self) -> bool {
        let Some(routes) = self.routes.upgrade() else {
            return false;
        };
        let mut routes = routes.lock();

        let removed = match &self.route {
            Route::Kind(kind) => {
                let Some(entries) = routes.by_kind.get_mut(kind) else {
                    return false;
                };
                let removed = remove_entry(entries, self.id);
                if entries.is_empty() {
                    routes.by_kind.remove(kind);
                }
                removed
            }
            Route::Any => remove_entry(&mut routes.fallback, self.id),
        };

        if removed {
            trace!(handler = %self.id, "Handler unregistered");
        }
        removed
    }
}

fn remove_entry(entries: &mut Vec<Entry>, id: HandlerId) -> bool {
    match entries.iter().position(|entry| entry.id == id) {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routes")
            .field("kinds", &self.by_kind.len())
            .field("fallback", &self.fallback.len())
            .finish()
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Discriminator-keyed handler lists.
///
/// Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    routes: Arc<Mutex<Routes>>,
    ids: Arc<IdSequence>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared handler for a message type.
    pub fn register(&self, kind: impl Into<String>, handler: Handler) -> Registration {
        let kind = kind.into();
        let id = HandlerId::new(self.ids.next());

        self.routes
            .lock()
            .by_kind
            .entry(kind.clone())
            .or_default()
            .push(Entry { id, handler });

        debug!(kind = %kind, handler = %id, "Handler registered");
        self.registration(Route::Kind(kind), id)
    }

    /// Registers a handler that receives every decoded envelope.
    pub fn register_fallback(&self, handler: Handler) -> Registration {
        let id = HandlerId::new(self.ids.next());
        self.routes.lock().fallback.push(Entry { id, handler });

        debug!(handler = %id, "Fallback handler registered");
        self.registration(Route::Any, id)
    }

    /// Registers a handler that receives payloads deserialized into `M`.
    ///
    /// Payloads that do not deserialize are logged and skipped.
    pub fn register_typed<M, F>(&self, kind: impl Into<String>, handler: F) -> Registration
    where
        M: DeserializeOwned,
        F: Fn(M) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let label = kind.clone();
        self.register(
            kind,
            Arc::new(move |payload: &Value| match M::deserialize(payload) {
                Ok(message) => handler(message),
                Err(e) => warn!(kind = %label, error = %e, "Payload does not match handler type"),
            }),
        )
    }

    /// Registers a handler for a closed set of message types.
    ///
    /// `M` is typically an enum tagged by the discriminator key. Envelopes
    /// that match none of its variants are logged and ignored.
    pub fn register_any<M, F>(&self, handler: F) -> Registration
    where
        M: DeserializeOwned,
        F: Fn(M) + Send + Sync + 'static,
    {
        self.register_fallback(Arc::new(move |payload: &Value| {
            match M::deserialize(payload) {
                Ok(message) => handler(message),
                Err(e) => debug!(error = %e, "Ignoring message of unknown type"),
            }
        }))
    }

    /// Returns the number of handlers for a message type.
    #[must_use]
    pub fn handler_count(&self, kind: &str) -> usize {
        self.routes.lock().by_kind.get(kind).map_or(0, Vec::len)
    }

    /// Returns the total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        let routes = self.routes.lock();
        routes.by_kind.values().map(Vec::len).sum::<usize>() + routes.fallback.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every registration.
    pub fn clear(&self) {
        let mut routes = self.routes.lock();
        routes.by_kind.clear();
        routes.fallback.clear();
    }

    /// Invokes the handlers for an envelope in registration order.
    ///
    /// Type-specific handlers run before fallback handlers. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, envelope: &Envelope) -> usize {
        let snapshot: Vec<(HandlerId, Handler)> = {
            let routes = self.routes.lock();
            routes
                .by_kind
                .get(&envelope.kind)
                .into_iter()
                .flatten()
                .chain(routes.fallback.iter())
                .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                .collect()
        };

        if snapshot.is_empty() {
            debug!(kind = %envelope.kind, "No handlers for message type");
            return 0;
        }

        for (id, handler) in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&envelope.payload)));
            if outcome.is_err() {
                error!(kind = %envelope.kind, handler = %id, "Message handler panicked");
            }
        }

        trace!(kind = %envelope.kind, count = snapshot.len(), "Message dispatched");
        snapshot.len()
    }

    fn registration(&self, route: Route, id: HandlerId) -> Registration {
        Registration {
            routes: Arc::downgrade(&self.routes),
            route,
            id,
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("routes", &*self.routes.lock())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
