//! Latest full snapshot of a peer's active items.
//!
//! [`CompositeActiveState`] is the per-peer mirror of everything currently
//! worn, running, or armed: indexed gag and restriction slots, the active
//! restraint set, the cursed-loot id set, the running pattern, armed alarms
//! and triggers, and the two alias-rule stores. It is replaced wholesale by
//! a composite snapshot on reconnect and mutated slot-by-slot by partial
//! updates in between.
//!
//! Slot values are authoritative as received; this module performs no
//! permission checking. A `Removed` transition resets a slot to its
//! [`Default`] value.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::ReplicatedCache;
use crate::identity::UserId;

/// Number of concurrently worn gag layers.
pub const GAG_SLOT_COUNT: usize = 3;

/// Number of concurrently worn restriction slots.
pub const RESTRICTION_SLOT_COUNT: usize = 5;

bitflags::bitflags! {
    /// Which layers of the active restraint set are enabled.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct RestraintLayers: u8 {
        /// First layer.
        const LAYER_1 = 0b0000_0001;
        /// Second layer.
        const LAYER_2 = 0b0000_0010;
        /// Third layer.
        const LAYER_3 = 0b0000_0100;
        /// Fourth layer.
        const LAYER_4 = 0b0000_1000;
        /// Fifth layer.
        const LAYER_5 = 0b0001_0000;
    }
}

impl Serialize for RestraintLayers {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for RestraintLayers {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid layer bits {bits:#x}")))
    }
}

/// A padlock securing a slot, or the absence of one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Padlock {
    /// No padlock.
    #[default]
    None,
    /// Plain lock with no release condition.
    Metal,
    /// Released by a numeric combination.
    Combination {
        /// The combination, as set by the assigner.
        combination: String,
    },
    /// Released by a password.
    Password {
        /// The password, as set by the assigner.
        password: String,
    },
    /// Released automatically at a point in time.
    Timer {
        /// When the lock expires.
        expires_at: DateTime<Utc>,
    },
    /// Released only by the assigner.
    OwnerExclusive {
        /// Optional expiry; `None` is indefinite.
        expires_at: Option<DateTime<Utc>>,
    },
    /// Released only by the assigner while devotion holds.
    Devotional {
        /// Optional expiry; `None` is indefinite.
        expires_at: Option<DateTime<Utc>>,
    },
}

impl Padlock {
    /// True when any padlock is present.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns the expiry timestamp for time-bounded locks.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timer { expires_at } => Some(*expires_at),
            Self::OwnerExclusive { expires_at } | Self::Devotional { expires_at } => *expires_at,
            _ => None,
        }
    }
}

/// One worn gag layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGagSlot {
    /// Catalog id of the worn gag, if any.
    pub gag: Option<Uuid>,
    /// Who applied it.
    pub enabler: Option<UserId>,
    /// Padlock securing the slot.
    pub padlock: Padlock,
    /// Who applied the padlock.
    pub padlock_assigner: Option<UserId>,
}

impl ActiveGagSlot {
    /// True when nothing is worn in this slot.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.gag.is_none()
    }

    /// True when the slot is padlocked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.padlock.is_locked()
    }
}

/// One worn restriction slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRestrictionSlot {
    /// Catalog id of the worn restriction, if any.
    pub restriction: Option<Uuid>,
    /// Who applied it.
    pub enabler: Option<UserId>,
    /// Padlock securing the slot.
    pub padlock: Padlock,
    /// Who applied the padlock.
    pub padlock_assigner: Option<UserId>,
}

impl ActiveRestrictionSlot {
    /// True when nothing is worn in this slot.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.restriction.is_none()
    }

    /// True when the slot is padlocked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.padlock.is_locked()
    }
}

/// The active restraint set, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRestraintState {
    /// Catalog id of the worn set, if any.
    pub set: Option<Uuid>,
    /// Which of the set's layers are enabled.
    pub layers: RestraintLayers,
    /// Who applied the set.
    pub enabler: Option<UserId>,
    /// Padlock securing the set.
    pub padlock: Padlock,
    /// Who applied the padlock.
    pub padlock_assigner: Option<UserId>,
}

impl ActiveRestraintState {
    /// True when no set is worn.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.set.is_none()
    }

    /// True when the set is padlocked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.padlock.is_locked()
    }
}

/// One chat alias rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    /// Stable rule id.
    pub id: Uuid,
    /// Whether the rule currently fires.
    pub enabled: bool,
    /// Operator-facing label.
    pub label: String,
    /// Phrase that activates the rule.
    pub input: String,
    /// Replacement emitted when the rule fires.
    pub output: String,
}

/// Per-peer snapshot of everything active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeActiveState {
    /// Worn gag layers, by slot index.
    pub gag_slots: [ActiveGagSlot; GAG_SLOT_COUNT],
    /// Worn restriction slots, by slot index.
    pub restriction_slots: [ActiveRestrictionSlot; RESTRICTION_SLOT_COUNT],
    /// Active restraint set.
    pub restraint: ActiveRestraintState,
    /// Ids of active cursed loot items.
    pub cursed_items: BTreeSet<Uuid>,
    /// Id of the running pattern, if any.
    pub active_pattern: Option<Uuid>,
    /// Ids of armed alarms.
    pub active_alarms: BTreeSet<Uuid>,
    /// Ids of armed triggers.
    pub active_triggers: BTreeSet<Uuid>,
    /// Alias rules that apply towards everyone.
    pub global_alias_rules: Vec<AliasRule>,
    /// Alias rules scoped to this pairing.
    pub pair_alias_rules: Vec<AliasRule>,
}

impl CompositeActiveState {
    /// Returns the gag slot at `index`, when in range.
    #[must_use]
    pub fn gag_slot(&self, index: usize) -> Option<&ActiveGagSlot> {
        self.gag_slots.get(index)
    }

    /// Returns the restriction slot at `index`, when in range.
    #[must_use]
    pub fn restriction_slot(&self, index: usize) -> Option<&ActiveRestrictionSlot> {
        self.restriction_slots.get(index)
    }

    /// Returns the alias store for `scope`, upserting or removing by rule id
    /// is done by the caller.
    #[must_use]
    pub fn alias_rules(&self, pair_scoped: bool) -> &[AliasRule] {
        if pair_scoped {
            &self.pair_alias_rules
        } else {
            &self.global_alias_rules
        }
    }
}

/// Derived locked-slot summary, rebuilt synchronously whenever a composite
/// snapshot is applied.
///
/// Labels are resolved against the replicated cache at build time; an item
/// missing from the cache keeps its slot in the summary with an empty label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveItemsSummary {
    /// Occupied gag slots.
    pub gags: Vec<SummarySlot>,
    /// Occupied restriction slots.
    pub restrictions: Vec<SummarySlot>,
    /// The worn restraint set, if any.
    pub restraint: Option<SummarySlot>,
}

/// One occupied slot in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySlot {
    /// Slot index within its category (always 0 for the restraint set).
    pub slot: usize,
    /// Item label from the cache, or empty when unresolved.
    pub label: String,
    /// Whether the slot is padlocked.
    pub locked: bool,
}

impl ActiveItemsSummary {
    /// Builds the summary for `state`, resolving labels against `cache`.
    #[must_use]
    pub fn build(state: &CompositeActiveState, cache: &ReplicatedCache) -> Self {
        let gags = state
            .gag_slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| {
                s.gag.map(|id| SummarySlot {
                    slot,
                    label: cache.gag(id).map(|g| g.label.clone()).unwrap_or_default(),
                    locked: s.is_locked(),
                })
            })
            .collect();

        let restrictions = state
            .restriction_slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| {
                s.restriction.map(|id| SummarySlot {
                    slot,
                    label: cache
                        .restriction(id)
                        .map(|r| r.label.clone())
                        .unwrap_or_default(),
                    locked: s.is_locked(),
                })
            })
            .collect();

        let restraint = state.restraint.set.map(|id| SummarySlot {
            slot: 0,
            label: cache
                .restraint(id)
                .map(|r| r.label.clone())
                .unwrap_or_default(),
            locked: state.restraint.is_locked(),
        });

        Self {
            gags,
            restrictions,
            restraint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_empty() {
        let state = CompositeActiveState::default();
        assert!(state.gag_slots.iter().all(ActiveGagSlot::is_empty));
        assert!(state.restraint.is_empty());
        assert!(state.cursed_items.is_empty());
        assert!(state.active_pattern.is_none());
    }

    #[test]
    fn padlock_predicates() {
        assert!(!Padlock::None.is_locked());
        assert!(Padlock::Metal.is_locked());
        let expiry = Utc::now();
        let timer = Padlock::Timer { expires_at: expiry };
        assert!(timer.is_locked());
        assert_eq!(timer.expires_at(), Some(expiry));
        assert_eq!(Padlock::Metal.expires_at(), None);
    }

    #[test]
    fn removed_slot_equals_default() {
        let mut slot = ActiveGagSlot {
            gag: Some(Uuid::new_v4()),
            enabler: Some(UserId::new("VAULT-001")),
            padlock: Padlock::Metal,
            padlock_assigner: Some(UserId::new("VAULT-001")),
        };
        assert!(!slot.is_empty());
        slot = ActiveGagSlot::default();
        assert!(slot.is_empty());
        assert!(!slot.is_locked());
        assert_eq!(slot, ActiveGagSlot::default());
    }

    #[test]
    fn summary_skips_empty_slots() {
        let cache = ReplicatedCache::default();
        let mut state = CompositeActiveState::default();
        state.gag_slots[1].gag = Some(Uuid::new_v4());
        state.gag_slots[1].padlock = Padlock::Metal;

        let summary = ActiveItemsSummary::build(&state, &cache);
        assert_eq!(summary.gags.len(), 1);
        assert_eq!(summary.gags[0].slot, 1);
        assert!(summary.gags[0].locked);
        assert!(summary.gags[0].label.is_empty());
        assert!(summary.restrictions.is_empty());
        assert!(summary.restraint.is_none());
    }
}
