//! Applies inbound permission mutations to the correct bundle view.
//!
//! Every mutation looks its peer up in the directory (fatal unknown-pairing
//! when absent), routes the field through the closed mapping in
//! `pairsync-core`, and writes the coerced value into the addressed view.
//! Field coercion happens inside the bundle's write lock, so a failed
//! mutation leaves the bundle untouched.
//!
//! # Error Policy
//!
//! Unique and global mutations fail fatally on an unknown field or a value
//! that cannot be coerced. Access mutations log and drop the same errors —
//! legacy tolerance kept for wire compatibility, implemented over the one
//! shared field mapping rather than a second lookup path.
//!
//! # Side Effects
//!
//! Keyed by field identity:
//! - pause toggled on → the peer's cached profile data is invalidated;
//! - any moodle-related change → the peer's effective moodle permissions
//!   are rebroadcast to the overlay IPC collaborator;
//! - a unique change that newly grants puppeteer categories → one
//!   puppet-access-granted event carrying exactly the newly-granted bits.
//!
//! Every successful mutation invalidates the directory's active-pairs view.

use std::sync::Arc;

use pairsync_core::events::PairEvent;
use pairsync_core::identity::UserId;
use pairsync_core::messages::{
    AccessPermUpdate, GlobalPermBulk, GlobalPermUpdate, PermDirection, UniquePermUpdate,
};
use pairsync_core::permissions::{
    EffectiveMoodlePerms, GlobalPermField, PairPermField, PermissionError, PuppetPerms,
};
use tracing::{debug, warn};

use crate::collaborators::ClientDeps;
use crate::directory::PairingDirectory;
use crate::error::PairingError;
use crate::kinkster::Kinkster;

/// Outcome of a unique-permission mutation, captured under the bundle lock.
struct UniqueOutcome {
    newly_paused: bool,
    granted: PuppetPerms,
    effective: EffectiveMoodlePerms,
}

/// Applies inbound permission-mutation messages.
pub struct PermissionReconciler {
    directory: Arc<PairingDirectory>,
    deps: Arc<ClientDeps>,
}

impl PermissionReconciler {
    /// Creates a reconciler over `directory`.
    #[must_use]
    pub fn new(directory: Arc<PairingDirectory>, deps: Arc<ClientDeps>) -> Self {
        Self { directory, deps }
    }

    /// Replaces a peer's global permission snapshot wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnknownPairing`] when the peer was never
    /// added.
    pub async fn apply_global_bulk(
        &self,
        peer: &UserId,
        update: GlobalPermBulk,
    ) -> Result<(), PairingError> {
        let kinkster = self.lookup(peer).await?;
        let (before, after) = kinkster
            .with_bundle_mut(|bundle| {
                let before = bundle.effective_moodle_perms();
                bundle.global = update.perms;
                (before, bundle.effective_moodle_perms())
            })
            .await;

        if before != after {
            self.deps.overlay.push_moodle_perms(peer, after);
        }
        debug!(peer = %peer, enactor = %update.enactor, "Global permissions replaced");
        self.directory.touch();
        Ok(())
    }

    /// Applies a single-field mutation to a peer's global snapshot.
    ///
    /// # Errors
    ///
    /// Fatal on unknown pairing, unknown field, or uncoercible value; the
    /// bundle is untouched on error.
    pub async fn apply_global(
        &self,
        peer: &UserId,
        update: GlobalPermUpdate,
    ) -> Result<(), PairingError> {
        let field: GlobalPermField = update.field.parse()?;
        let kinkster = self.lookup(peer).await?;

        let effective = kinkster
            .with_bundle_mut(
                |bundle| -> Result<EffectiveMoodlePerms, PermissionError> {
                    field.apply(&mut bundle.global, &update.value)?;
                    Ok(bundle.effective_moodle_perms())
                },
            )
            .await?;

        if field.is_moodle_related() {
            self.deps.overlay.push_moodle_perms(peer, effective);
        }
        debug!(peer = %peer, field = %field, "Global permission changed");
        self.directory.touch();
        Ok(())
    }

    /// Applies a single-field mutation to one of a peer's unique views.
    ///
    /// # Errors
    ///
    /// Fatal on unknown pairing, unknown field, or uncoercible value; the
    /// bundle is untouched on error.
    pub async fn apply_unique(
        &self,
        peer: &UserId,
        update: UniquePermUpdate,
    ) -> Result<(), PairingError> {
        let field: PairPermField = update.field.parse()?;
        let kinkster = self.lookup(peer).await?;

        let outcome = kinkster
            .with_bundle_mut(|bundle| -> Result<UniqueOutcome, PermissionError> {
                let view = match update.direction {
                    PermDirection::Own => &mut bundle.own,
                    PermDirection::Peer => &mut bundle.peer,
                };
                let was_paused = view.is_paused;
                let old_puppet = view.puppet_perms;
                field.apply(view, &update.value)?;
                Ok(UniqueOutcome {
                    newly_paused: !was_paused && view.is_paused,
                    granted: view.puppet_perms.difference(old_puppet),
                    effective: bundle.effective_moodle_perms(),
                })
            })
            .await?;

        if field == PairPermField::IsPaused && outcome.newly_paused {
            self.deps.profiles.invalidate(peer);
        }
        if field.is_moodle_related() {
            self.deps.overlay.push_moodle_perms(peer, outcome.effective);
        }
        if field == PairPermField::PuppetPerms
            && update.direction == PermDirection::Peer
            && !outcome.granted.is_empty()
        {
            self.deps.events.emit(PairEvent::PuppetAccessGranted {
                peer: peer.clone(),
                granted: outcome.granted,
            });
        }
        debug!(peer = %peer, field = %field, direction = ?update.direction, "Unique permission changed");
        self.directory.touch();
        Ok(())
    }

    /// Applies a single-field mutation to one of a peer's edit-access
    /// views.
    ///
    /// Unknown fields and uncoercible values are logged and dropped; only
    /// an unknown pairing is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnknownPairing`] when the peer was never
    /// added.
    pub async fn apply_access(
        &self,
        peer: &UserId,
        update: AccessPermUpdate,
    ) -> Result<(), PairingError> {
        let kinkster = self.lookup(peer).await?;

        let applied: Result<(), PermissionError> = match update.field.parse::<PairPermField>() {
            Ok(field) => {
                kinkster
                    .with_bundle_mut(|bundle| {
                        let view = match update.direction {
                            PermDirection::Own => &mut bundle.own_access,
                            PermDirection::Peer => &mut bundle.peer_access,
                        };
                        field.apply_access(view, &update.value)
                    })
                    .await
            },
            Err(error) => Err(error),
        };

        if let Err(error) = applied {
            warn!(
                peer = %peer,
                field = %update.field,
                %error,
                "Ignoring malformed access mutation"
            );
            return Ok(());
        }

        debug!(peer = %peer, field = %update.field, direction = ?update.direction, "Access permission changed");
        self.directory.touch();
        Ok(())
    }

    async fn lookup(&self, peer: &UserId) -> Result<Arc<Kinkster>, PairingError> {
        self.directory
            .get(peer)
            .await
            .ok_or_else(|| PairingError::unknown_pairing(peer.as_str()))
    }
}

impl std::fmt::Debug for PermissionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionReconciler").finish_non_exhaustive()
    }
}
