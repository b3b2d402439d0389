//! Client error taxonomy.
//!
//! A fatal error aborts only the inbound message that raised it: every
//! operation validates before touching shared state, so a failed message
//! never leaves a peer half-updated. Transient conditions (presence not yet
//! bound) are handled by bounded waits and never surface here; best-effort
//! cleanup failures are logged and swallowed at the call site.

use pairsync_core::events::ItemCategory;
use pairsync_core::permissions::PermissionError;
use thiserror::Error;

/// Errors surfaced to the inbound message-processing boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    /// A mutation referenced a peer that was never added to the directory.
    #[error("unknown pairing: {uid}")]
    UnknownPairing {
        /// The unrecognized uid.
        uid: String,
    },

    /// A slot update addressed an index outside the category's range.
    #[error("{category} slot index {index} out of range (slot count {count})")]
    SlotOutOfRange {
        /// The category whose slot was addressed.
        category: ItemCategory,
        /// The offending index.
        index: usize,
        /// Number of slots in the category.
        count: usize,
    },

    /// A permission mutation could not be coerced into its target field.
    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl PairingError {
    /// Convenience constructor for [`PairingError::UnknownPairing`].
    #[must_use]
    pub fn unknown_pairing(uid: impl Into<String>) -> Self {
        Self::UnknownPairing { uid: uid.into() }
    }
}
