//! Trait surface for game-side collaborators.
//!
//! The runtime never talks to the game client directly. Entity resolution,
//! overlay IPC, nickname lookup, and profile caching are injected behind
//! these traits, bundled in a [`ClientDeps`] that every component shares.
//! Production wires real adapters; tests wire in-memory mocks.

use std::fmt;
use std::sync::Arc;

use pairsync_core::config::SyncConfig;
use pairsync_core::events::EventSink;
use pairsync_core::identity::UserId;
use pairsync_core::messages::OverlayPayload;
use pairsync_core::permissions::EffectiveMoodlePerms;
use thiserror::Error;

/// Opaque handle to an in-world render entity.
///
/// Valid only between the watcher's entity-created and entity-destroyed
/// notifications for that entity; never dereferenced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(u64);

impl EntityHandle {
    /// Wraps a raw entity address.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw entity address.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Failure reported by the overlay IPC collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("overlay ipc failure: {message}")]
pub struct OverlayError {
    /// Human-readable failure description.
    pub message: String,
}

impl OverlayError {
    /// Creates an error from any printable cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resolves render entities by identity hash.
pub trait EntityResolver: Send + Sync {
    /// Returns the live entity whose identity hash matches, if rendered.
    fn resolve_by_ident_hash(&self, ident_hash: &str) -> Option<EntityHandle>;

    /// True once the entity has finished loading and may receive overlays.
    fn is_fully_loaded(&self, entity: EntityHandle) -> bool;
}

/// Applies and clears cosmetic overlays on render entities.
pub trait OverlayIpc: Send + Sync {
    /// Applies `payload` to `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError`] when the IPC channel rejects the payload.
    fn apply_overlay(&self, entity: EntityHandle, payload: &OverlayPayload)
    -> Result<(), OverlayError>;

    /// Removes any overlay this client applied to `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError`] when the IPC channel rejects the request.
    fn clear_overlay(&self, entity: EntityHandle) -> Result<(), OverlayError>;

    /// True when a cooperating third-party system claims ownership of
    /// `entity`; reverts are skipped for owned entities.
    fn owns_entity(&self, entity: EntityHandle) -> bool;

    /// Rebroadcasts a peer's effective moodle permissions.
    fn push_moodle_perms(&self, peer: &UserId, effective: EffectiveMoodlePerms);
}

/// Looks up locally configured nicknames.
pub trait NicknameProvider: Send + Sync {
    /// Returns the local nickname for `uid`, if one is set.
    fn nickname(&self, uid: &UserId) -> Option<String>;
}

/// Invalidation hook for cached peer profile data.
pub trait ProfileCache: Send + Sync {
    /// Drops any cached profile data for `uid`.
    fn invalidate(&self, uid: &UserId);
}

/// Shared collaborator bundle handed to every runtime component.
#[derive(Clone)]
pub struct ClientDeps {
    /// Entity resolution.
    pub resolver: Arc<dyn EntityResolver>,
    /// Overlay IPC.
    pub overlay: Arc<dyn OverlayIpc>,
    /// Event delivery.
    pub events: Arc<dyn EventSink>,
    /// Nickname lookup.
    pub nicknames: Arc<dyn NicknameProvider>,
    /// Profile cache invalidation.
    pub profiles: Arc<dyn ProfileCache>,
    /// Timing configuration.
    pub config: SyncConfig,
}

impl fmt::Debug for ClientDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDeps")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
