//! Inbound wire message shapes.
//!
//! One struct per message the network hub delivers to this client. These are
//! pure DTOs: validation beyond shape (slot bounds, field names) happens in
//! the operations that consume them, so a malformed mutation aborts that one
//! message without affecting the rest of the stream.
//!
//! Permission mutations carry their field as a raw string: an unknown field
//! name must survive message decoding so the reconciler can apply the
//! per-path error policy instead of rejecting the whole envelope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheSnapshot;
use crate::composite::{
    ActiveGagSlot, ActiveRestraintState, ActiveRestrictionSlot, AliasRule, CompositeActiveState,
};
use crate::identity::{UserId, UserIdentity};
use crate::permissions::{
    GlobalPermissions, PairPermAccess, PairPermissions, PermValue,
};

/// Transition discriminator carried by every partial slot update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// An item was applied to an empty slot.
    Applied,
    /// An item replaced another in one step.
    Swapped,
    /// A padlock was applied.
    Locked,
    /// A padlock was removed.
    Unlocked,
    /// The item was removed; the slot resets to its empty value.
    Removed,
}

impl UpdateKind {
    /// Returns the wire name of this transition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Swapped => "swapped",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Initial pairing descriptor: identity plus the full permission state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDescriptor {
    /// Who the peer is.
    pub identity: UserIdentity,
    /// The peer's account-wide settings.
    pub global: GlobalPermissions,
    /// What the local user allows the peer to do.
    pub own_perms: PairPermissions,
    /// What the peer allows the local user to do.
    pub peer_perms: PairPermissions,
    /// Which local fields the peer may edit.
    pub own_access: PairPermAccess,
    /// Which peer fields the local user may edit.
    pub peer_access: PairPermAccess,
}

/// Presence descriptor: identity plus the hash used for entity matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceDescriptor {
    /// Who the peer is.
    pub identity: UserIdentity,
    /// Hash of the peer's in-world identity, matched against render
    /// entities reported by the watcher.
    pub ident_hash: String,
}

/// Full-state replacement sent on reconnect or major resync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeSnapshot {
    /// The peer's complete active-item state.
    pub active: CompositeActiveState,
    /// The peer's complete catalog.
    pub catalog: CacheSnapshot,
}

/// Cosmetic overlay payload applied to a bound render entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPayload {
    /// Opaque overlay data, interpreted by the IPC collaborator.
    pub data: String,
}

impl OverlayPayload {
    /// Wraps raw overlay data.
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// True when there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Partial update for one gag slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GagUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// Target slot index.
    pub slot: usize,
    /// Authoritative post-transition slot value.
    pub new_data: ActiveGagSlot,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Partial update for one restriction slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// Target slot index.
    pub slot: usize,
    /// Authoritative post-transition slot value.
    pub new_data: ActiveRestrictionSlot,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Partial update for the active restraint set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestraintUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// Authoritative post-transition restraint state.
    pub new_data: ActiveRestraintState,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Partial update for the active cursed-loot set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursedLootUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// The loot item in question.
    pub loot: Uuid,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Partial update for the running pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// The pattern in question.
    pub pattern: Uuid,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Partial update for the armed alarm set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// The alarm in question.
    pub alarm: Uuid,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Partial update for the armed trigger set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerUpdate {
    /// Transition being applied.
    pub kind: UpdateKind,
    /// The trigger in question.
    pub trigger: Uuid,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Which alias-rule store an alias update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasScope {
    /// The store applying towards everyone.
    Global,
    /// The store scoped to this pairing.
    Pair,
}

/// Partial update for one alias rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasUpdate {
    /// Transition being applied (`Removed` deletes by rule id, anything
    /// else upserts).
    pub kind: UpdateKind,
    /// Which store the rule lives in.
    pub scope: AliasScope,
    /// The rule payload.
    pub rule: AliasRule,
    /// Who performed the transition.
    pub enactor: UserId,
}

/// Direction tag on single-field permission mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermDirection {
    /// Affects the local user's settings for the peer (the `own` views).
    Own,
    /// Affects the peer's settings for the local user (the `peer` views).
    Peer,
}

/// Bulk replacement of a peer's global permission snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalPermBulk {
    /// The full replacement snapshot.
    pub perms: GlobalPermissions,
    /// Who performed the change.
    pub enactor: UserId,
}

/// Single-field mutation of a peer's global permission snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPermUpdate {
    /// Wire name of the field being changed.
    pub field: String,
    /// New value, coerced by the closed field mapping.
    pub value: PermValue,
    /// Who performed the change.
    pub enactor: UserId,
}

/// Single-field mutation of a unique (per-pair) permission view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquePermUpdate {
    /// Which directional view is affected.
    pub direction: PermDirection,
    /// Wire name of the field being changed.
    pub field: String,
    /// New value, coerced by the closed field mapping.
    pub value: PermValue,
    /// Who performed the change.
    pub enactor: UserId,
}

/// Single-field mutation of an edit-access view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPermUpdate {
    /// Which directional view is affected.
    pub direction: PermDirection,
    /// Wire name of the field being changed.
    pub field: String,
    /// New value; access flags are always booleans.
    pub value: PermValue,
    /// Who performed the change.
    pub enactor: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_kind_names() {
        assert_eq!(UpdateKind::Applied.as_str(), "applied");
        assert_eq!(UpdateKind::Removed.to_string(), "removed");
    }

    #[test]
    fn unknown_field_survives_decoding() {
        let raw = r#"{
            "direction": "peer",
            "field": "no_such_field",
            "value": true,
            "enactor": "VAULT-001"
        }"#;
        let update: UniquePermUpdate = serde_json::from_str(raw).unwrap();
        assert_eq!(update.field, "no_such_field");
        assert_eq!(update.value, PermValue::Bool(true));
    }

    #[test]
    fn gag_update_round_trip() {
        let update = GagUpdate {
            kind: UpdateKind::Applied,
            slot: 1,
            new_data: ActiveGagSlot {
                gag: Some(Uuid::new_v4()),
                enabler: Some(UserId::new("VAULT-001")),
                ..ActiveGagSlot::default()
            },
            enactor: UserId::new("VAULT-001"),
        };
        let json = serde_json::to_string(&update).unwrap();
        let back: GagUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }
}
