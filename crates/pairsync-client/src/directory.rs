//! Concurrent registry of all paired peers.
//!
//! The [`PairingDirectory`] is the single source of truth for which peers
//! exist and whether they are online. Three writer paths touch it
//! concurrently (network updates, UI actions, disposal), so the registry
//! lives behind a read/write lock and every entry is shared as an
//! `Arc<Kinkster>`.
//!
//! # Active-Pairs View
//!
//! The sorted "active pairs" list is not maintained incrementally. Every
//! structural mutation (add, remove, online, offline, permission change)
//! marks the cached view dirty; the next read rebuilds it from the registry
//! in one O(n) pass. Rebuilding is cheap at the expected scale of tens to
//! low hundreds of peers, and invalidate-and-rebuild avoids the consistency
//! hazards of incremental maintenance under concurrent mutation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pairsync_core::events::PairEvent;
use pairsync_core::identity::UserId;
use pairsync_core::messages::{PairDescriptor, PresenceDescriptor};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::collaborators::{ClientDeps, EntityHandle};
use crate::error::PairingError;
use crate::kinkster::Kinkster;

/// Registry of every paired peer, keyed by stable uid.
pub struct PairingDirectory {
    pairs: RwLock<HashMap<UserId, Arc<Kinkster>>>,
    /// Cached active-pairs view; rebuilt lazily when dirty.
    view: Mutex<Vec<Arc<Kinkster>>>,
    view_dirty: AtomicBool,
    deps: Arc<ClientDeps>,
}

impl PairingDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new(deps: Arc<ClientDeps>) -> Self {
        Self {
            pairs: RwLock::new(HashMap::new()),
            view: Mutex::new(Vec::new()),
            view_dirty: AtomicBool::new(true),
            deps,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Adds a pairing, idempotently.
    ///
    /// An unknown uid creates a new [`Kinkster`]; a known uid re-applies the
    /// descriptor's permission snapshot to the existing aggregate. No
    /// duplicate entry is ever created.
    pub async fn add(&self, descriptor: PairDescriptor) -> Arc<Kinkster> {
        let uid = descriptor.identity.uid.clone();
        let kinkster = {
            let mut pairs = self.pairs.write().await;
            if let Some(existing) = pairs.get(&uid) {
                let existing = Arc::clone(existing);
                drop(pairs);
                existing.refresh_descriptor(descriptor).await;
                debug!(peer = %uid, "Pairing refreshed");
                existing
            } else {
                let created = Arc::new(Kinkster::new(descriptor, Arc::clone(&self.deps)));
                pairs.insert(uid.clone(), Arc::clone(&created));
                info!(peer = %uid, "Pairing added");
                created
            }
        };
        self.touch();
        kinkster
    }

    /// Adds many pairings at once (initial connection sync).
    pub async fn add_many(&self, descriptors: Vec<PairDescriptor>) {
        for descriptor in descriptors {
            self.add(descriptor).await;
        }
    }

    /// Removes a pairing: marks it offline, evicts it, and notifies the
    /// pair-removed sink.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnknownPairing`] when the uid was never
    /// added.
    pub async fn remove(&self, uid: &UserId) -> Result<(), PairingError> {
        let kinkster = {
            let mut pairs = self.pairs.write().await;
            pairs
                .remove(uid)
                .ok_or_else(|| PairingError::unknown_pairing(uid.as_str()))?
        };
        kinkster.mark_offline().await;
        info!(peer = %uid, "Pairing removed");
        self.deps
            .events
            .emit(PairEvent::PairRemoved { peer: uid.clone() });
        self.touch();
        Ok(())
    }

    /// Marks a peer online and triggers presence-binding creation.
    ///
    /// A no-op refresh when the peer already has a bound presence.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnknownPairing`] when the uid was never
    /// added; no aggregate is created as a side effect.
    pub async fn mark_online(&self, descriptor: PresenceDescriptor) -> Result<(), PairingError> {
        let uid = descriptor.identity.uid.clone();
        let Some(kinkster) = self.get(&uid).await else {
            warn!(peer = %uid, "Online notification for unknown pairing");
            return Err(PairingError::unknown_pairing(uid.as_str()));
        };
        kinkster.create_presence_binding(Some(descriptor)).await;
        debug!(peer = %uid, "Marked online");
        self.touch();
        Ok(())
    }

    /// Marks a peer offline: clears its descriptor and disposes its
    /// presence. Tolerant of peers that are already offline.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnknownPairing`] when the uid was never
    /// added.
    pub async fn mark_offline(&self, uid: &UserId) -> Result<(), PairingError> {
        let Some(kinkster) = self.get(uid).await else {
            return Err(PairingError::unknown_pairing(uid.as_str()));
        };
        kinkster.mark_offline().await;
        self.touch();
        Ok(())
    }

    /// Tears the whole directory down (client disconnect): disposes every
    /// presence and empties the registry.
    pub async fn clear(&self) {
        let drained: Vec<Arc<Kinkster>> = {
            let mut pairs = self.pairs.write().await;
            pairs.drain().map(|(_, k)| k).collect()
        };
        for kinkster in &drained {
            kinkster.mark_offline().await;
        }
        info!(count = drained.len(), "Directory cleared");
        self.touch();
    }

    // ------------------------------------------------------------------
    // Watcher entry points
    // ------------------------------------------------------------------

    /// Routes an entity-created notification to the matching online peer.
    pub async fn notify_entity_created(
        &self,
        ident_hash: &str,
        handle: EntityHandle,
        name: &str,
    ) {
        for kinkster in self.snapshot().await {
            if kinkster.matches_ident_hash(ident_hash).await {
                if let Some(handler) = kinkster.presence().await {
                    handler.bind(handle, name).await;
                    self.touch();
                }
                return;
            }
        }
    }

    /// Routes an entity-destroyed notification to the peer bound to
    /// `handle`, if any.
    pub async fn notify_entity_destroyed(&self, handle: EntityHandle) {
        for kinkster in self.snapshot().await {
            if let Some(handler) = kinkster.presence().await {
                if handler.bound_entity().await.map(|e| e.handle) == Some(handle) {
                    handler.unbind().await;
                    self.touch();
                    return;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Looks a peer up by uid.
    pub async fn get(&self, uid: &UserId) -> Option<Arc<Kinkster>> {
        self.pairs.read().await.get(uid).cloned()
    }

    /// Looks a peer up by uid string or display alias.
    pub async fn find_by_uid(&self, needle: &str) -> Option<Arc<Kinkster>> {
        self.pairs
            .read()
            .await
            .values()
            .find(|k| k.identity().matches(needle))
            .cloned()
    }

    /// All peers currently online.
    pub async fn online_pairs(&self) -> Vec<Arc<Kinkster>> {
        let mut online = Vec::new();
        for kinkster in self.snapshot().await {
            if kinkster.is_online().await {
                online.push(kinkster);
            }
        }
        online
    }

    /// All peers whose presence is bound to a render entity.
    pub async fn rendered_pairs(&self) -> Vec<Arc<Kinkster>> {
        let mut rendered = Vec::new();
        for kinkster in self.snapshot().await {
            if kinkster.is_rendered().await {
                rendered.push(kinkster);
            }
        }
        rendered
    }

    /// The cached active-pairs view, sorted by display label.
    ///
    /// Rebuilt from the registry when a structural mutation has occurred
    /// since the last read.
    pub async fn active_pairs(&self) -> Vec<Arc<Kinkster>> {
        let mut view = self.view.lock().await;
        if self.view_dirty.swap(false, Ordering::SeqCst) {
            let mut rebuilt = self.snapshot().await;
            rebuilt.sort_by(|a, b| {
                a.identity()
                    .alias_or_uid()
                    .cmp(b.identity().alias_or_uid())
                    .then_with(|| a.uid().cmp(b.uid()))
            });
            *view = rebuilt;
        }
        view.clone()
    }

    /// Number of registered pairings.
    pub async fn len(&self) -> usize {
        self.pairs.read().await.len()
    }

    /// True when no pairing is registered.
    pub async fn is_empty(&self) -> bool {
        self.pairs.read().await.is_empty()
    }

    /// Invalidates the cached view and notifies the refresh sink.
    ///
    /// Called by every structural mutation here and by the reconciler after
    /// every successful permission change.
    pub fn touch(&self) {
        self.view_dirty.store(true, Ordering::SeqCst);
        self.deps.events.emit(PairEvent::DirectoryChanged);
    }

    async fn snapshot(&self) -> Vec<Arc<Kinkster>> {
        self.pairs.read().await.values().cloned().collect()
    }
}

impl std::fmt::Debug for PairingDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingDirectory")
            .field("view_dirty", &self.view_dirty.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
