//! Presence-binding state machine.
//!
//! A [`PresenceHandler`] binds one peer to a concrete in-world render entity
//! once the watcher reports an entity whose identity hash matches, and
//! manages a single cosmetic-overlay payload against that entity.
//!
//! # State Machine
//!
//! ```text
//!              entity-created (hash match)
//!   ┌─────────┐ ─────────────────────────▶ ┌────────┐
//!   │ Unbound │                            │ Bound  │
//!   └─────────┘ ◀───────────────────────── └────────┘
//!              entity-destroyed / offline / dispose
//! ```
//!
//! Binding captures the entity handle and display name, notifies observers,
//! then waits (bounded poll) for the entity to finish loading before
//! applying any pending overlay. Unbinding reverts the overlay unless a
//! cooperating third-party system owns the entity.
//!
//! All overlay alterations on one handler serialize on a dedicated lock, so
//! at most one apply/revert is in flight per peer. Every wait in this module
//! is time-bounded; disposal never blocks on a stuck alteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pairsync_core::events::PairEvent;
use pairsync_core::identity::UserId;
use pairsync_core::messages::OverlayPayload;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use crate::collaborators::{ClientDeps, EntityHandle};

/// A live binding to a render entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundEntity {
    /// The bound entity.
    pub handle: EntityHandle,
    /// Display name captured at bind time (nickname when configured).
    pub name: String,
}

/// Binding state: explicitly either unbound or bound, never a dangling
/// handle.
#[derive(Debug, Clone, Default)]
enum Binding {
    #[default]
    Unbound,
    Bound(BoundEntity),
}

/// Binds one peer to a render entity and manages its overlay payload.
pub struct PresenceHandler {
    peer: UserId,
    deps: Arc<ClientDeps>,
    binding: RwLock<Binding>,
    pending: Mutex<Option<OverlayPayload>>,
    /// Serializes overlay apply/revert; independent of the owning
    /// aggregate's binding lock.
    alteration: Mutex<()>,
    disposed: AtomicBool,
}

impl PresenceHandler {
    /// Creates an unbound handler for `peer`.
    #[must_use]
    pub fn new(peer: UserId, deps: Arc<ClientDeps>) -> Self {
        Self {
            peer,
            deps,
            binding: RwLock::new(Binding::Unbound),
            pending: Mutex::new(None),
            alteration: Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    /// The peer this handler belongs to.
    #[must_use]
    pub fn peer(&self) -> &UserId {
        &self.peer
    }

    /// True while bound to a render entity.
    pub async fn is_bound(&self) -> bool {
        matches!(&*self.binding.read().await, Binding::Bound(_))
    }

    /// Returns the bound entity, if any.
    pub async fn bound_entity(&self) -> Option<BoundEntity> {
        match &*self.binding.read().await {
            Binding::Bound(entity) => Some(entity.clone()),
            Binding::Unbound => None,
        }
    }

    /// Binds to `handle` after the watcher matched this peer's identity
    /// hash.
    ///
    /// No-op when already bound or disposed. Captures the handle and display
    /// name (preferring a configured nickname) and notifies observers before
    /// returning; the wait for the entity to finish loading, and the
    /// application of any pending overlay payload after it, run on a
    /// background task so the watcher path never blocks on entity load.
    pub async fn bind(self: &Arc<Self>, handle: EntityHandle, name: impl Into<String>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let display = self
            .deps
            .nicknames
            .nickname(&self.peer)
            .unwrap_or_else(|| name.into());

        {
            let mut binding = self.binding.write().await;
            if matches!(&*binding, Binding::Bound(_)) {
                return;
            }
            *binding = Binding::Bound(BoundEntity {
                handle,
                name: display.clone(),
            });
        }

        debug!(peer = %self.peer, entity = %handle, "Presence bound");
        self.deps.events.emit(PairEvent::PresenceBound {
            peer: self.peer.clone(),
            name: display,
        });

        let handler = Arc::clone(self);
        tokio::spawn(async move {
            if handler.wait_fully_loaded(handle).await {
                handler.apply_pending().await;
            }
        });
    }

    /// Unbinds after the watcher reported the entity destroyed (or the peer
    /// went offline).
    ///
    /// No-op when already unbound. Reverts the overlay unless a cooperating
    /// third-party system owns the entity, clears the cached payload,
    /// notifies observers, and clears the handle.
    pub async fn unbind(&self) {
        let _alteration = self.alteration.lock().await;

        let entity = {
            let binding = self.binding.read().await;
            match &*binding {
                Binding::Unbound => return,
                Binding::Bound(entity) => entity.handle,
            }
        };

        if self.deps.overlay.owns_entity(entity) {
            debug!(peer = %self.peer, %entity, "Revert skipped: entity owned by third party");
        } else if let Err(error) = self.deps.overlay.clear_overlay(entity) {
            warn!(peer = %self.peer, %entity, %error, "Overlay revert failed");
        }

        *self.pending.lock().await = None;
        self.deps.events.emit(PairEvent::PresenceUnbound {
            peer: self.peer.clone(),
        });
        *self.binding.write().await = Binding::Unbound;
        debug!(peer = %self.peer, %entity, "Presence unbound");
    }

    /// Stores `payload` and, when bound, applies it immediately.
    pub async fn set_overlay_payload(&self, payload: OverlayPayload) {
        *self.pending.lock().await = Some(payload);
        if self.is_bound().await {
            self.apply_pending().await;
        }
    }

    /// Cancels in-flight waits and tears the binding down.
    ///
    /// Unless the host process itself is shutting down, a best-effort revert
    /// runs asynchronously, bounded by the configured timeout; local fields
    /// are cleared regardless of its outcome.
    pub async fn dispose(self: Arc<Self>, host_shutdown: bool) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let entity = self.bound_entity().await.map(|e| e.handle);

        // Clear local state first so the handler reads as unbound while the
        // revert task drains.
        *self.binding.write().await = Binding::Unbound;
        *self.pending.lock().await = None;

        let Some(entity) = entity else {
            return;
        };

        if host_shutdown || self.deps.overlay.owns_entity(entity) {
            return;
        }

        let handler = Arc::clone(&self);
        tokio::spawn(async move {
            let bound = handler.deps.config.revert_timeout;
            match timeout(bound, handler.alteration.lock()).await {
                Ok(_guard) => {
                    if let Err(error) = handler.deps.overlay.clear_overlay(entity) {
                        warn!(peer = %handler.peer, %entity, %error, "Dispose revert failed");
                    }
                },
                Err(_elapsed) => {
                    warn!(peer = %handler.peer, %entity, "Dispose revert timed out");
                },
            }
        });
    }

    /// Polls the resolver until the entity reports fully loaded.
    ///
    /// Returns false when the wait was cancelled (dispose/unbind) or timed
    /// out; pending overlays are not applied in either case.
    async fn wait_fully_loaded(&self, entity: EntityHandle) -> bool {
        let deadline = Instant::now() + self.deps.config.entity_load_timeout;
        loop {
            if self.disposed.load(Ordering::SeqCst) || !self.is_bound().await {
                return false;
            }
            if self.deps.resolver.is_fully_loaded(entity) {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(peer = %self.peer, %entity, "Entity load wait timed out");
                return false;
            }
            sleep(self.deps.config.entity_poll_interval).await;
        }
    }

    /// Applies the pending payload to the bound entity, consuming it.
    ///
    /// Consuming keeps delivery at-most-once when the bind path and a
    /// delayed-apply waiter race for the same payload.
    async fn apply_pending(&self) {
        let _alteration = self.alteration.lock().await;

        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Some(entity) = self.bound_entity().await.map(|e| e.handle) else {
            return;
        };
        if !self.deps.resolver.is_fully_loaded(entity) {
            // The entity cannot take overlays yet; the payload stays pending
            // and the bind task applies it once the load wait completes.
            return;
        }
        let Some(payload) = self.pending.lock().await.take() else {
            return;
        };

        if let Err(error) = self.deps.overlay.apply_overlay(entity, &payload) {
            warn!(peer = %self.peer, %entity, %error, "Overlay apply failed");
        } else {
            debug!(peer = %self.peer, %entity, "Overlay applied");
        }
    }
}

impl std::fmt::Debug for PresenceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceHandler")
            .field("peer", &self.peer)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
