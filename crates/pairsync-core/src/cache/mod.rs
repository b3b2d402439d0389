//! Denormalized replicated catalog cache.
//!
//! [`ReplicatedCache`] is a per-peer mirror of the peer's catalog items,
//! built from lightweight wire snapshots so lookups never need a network
//! round trip. It is rebuilt wholesale on reconnect and patched per item in
//! between.
//!
//! # Construction Order
//!
//! Bulk construction populates categories in dependency order: restrictions
//! before restraints (restraint slots and layers reference restrictions) and
//! before cursed loot (which references restrictions or gags); patterns
//! before alarms (which reference a pattern).
//!
//! # Cross-Reference Resolution
//!
//! References between categories are stored as ids and resolved at read
//! time. A reference whose target is not (yet) present resolves to `None`
//! rather than failing; a later update or full rebuild heals the reference
//! for subsequent reads. Readers that already observed `None` are not
//! retroactively corrected.

pub mod entries;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use entries::{
    AlarmItem, CollarItem, CursedAttachment, CursedItem, GagItem, PatternItem, RestraintItem,
    RestraintLayerDef, RestraintSlotDef, RestrictionItem, TriggerItem,
};

/// Full catalog snapshot, as sent on connect and major resync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// All gags.
    pub gags: Vec<GagItem>,
    /// All restrictions.
    pub restrictions: Vec<RestrictionItem>,
    /// All restraint sets.
    pub restraints: Vec<RestraintItem>,
    /// The collar, if one exists.
    pub collar: Option<CollarItem>,
    /// All cursed loot items.
    pub cursed_loot: Vec<CursedItem>,
    /// All patterns.
    pub patterns: Vec<PatternItem>,
    /// All alarms.
    pub alarms: Vec<AlarmItem>,
    /// All triggers.
    pub triggers: Vec<TriggerItem>,
}

/// Outcome of a single-entry cache update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// The id was unknown; the entry was inserted.
    Inserted,
    /// The id was known; the entry was mutated in place.
    Updated,
    /// The entry was removed.
    Removed,
    /// A removal addressed an id that was not present.
    NoEntry,
}

/// A resolved cursed-loot attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAttachment<'a> {
    /// The attachment is a gag.
    Gag(&'a GagItem),
    /// The attachment is a restriction.
    Restriction(&'a RestrictionItem),
}

/// Per-peer denormalized mirror of catalog items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicatedCache {
    gags: HashMap<Uuid, GagItem>,
    restrictions: HashMap<Uuid, RestrictionItem>,
    restraints: HashMap<Uuid, RestraintItem>,
    collar: Option<CollarItem>,
    cursed_loot: HashMap<Uuid, CursedItem>,
    patterns: HashMap<Uuid, PatternItem>,
    alarms: HashMap<Uuid, AlarmItem>,
    triggers: HashMap<Uuid, TriggerItem>,
}

impl ReplicatedCache {
    /// Builds a cache from a full snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        let mut cache = Self::default();
        cache.rebuild(snapshot);
        cache
    }

    /// Replaces the whole cache from a full snapshot.
    ///
    /// Categories are populated in dependency order so that by the time a
    /// referencing category lands, its targets are already present.
    /// References to ids absent from the snapshot stay soft-dangling.
    pub fn rebuild(&mut self, snapshot: CacheSnapshot) {
        self.gags = snapshot.gags.into_iter().map(|g| (g.id, g)).collect();
        self.restrictions = snapshot
            .restrictions
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        self.patterns = snapshot.patterns.into_iter().map(|p| (p.id, p)).collect();

        self.restraints = snapshot.restraints.into_iter().map(|r| (r.id, r)).collect();
        self.cursed_loot = snapshot
            .cursed_loot
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        self.alarms = snapshot.alarms.into_iter().map(|a| (a.id, a)).collect();
        self.triggers = snapshot.triggers.into_iter().map(|t| (t.id, t)).collect();
        self.collar = snapshot.collar;
    }

    // ------------------------------------------------------------------
    // Per-entry updates
    // ------------------------------------------------------------------

    /// Applies a single gag update: `None` removes, a known id mutates the
    /// existing entry in place, an unknown id inserts.
    pub fn update_gag(&mut self, id: Uuid, item: Option<GagItem>) -> CacheUpdate {
        Self::apply_update(&mut self.gags, id, item, GagItem::update_from)
    }

    /// Applies a single restriction update.
    pub fn update_restriction(&mut self, id: Uuid, item: Option<RestrictionItem>) -> CacheUpdate {
        Self::apply_update(&mut self.restrictions, id, item, RestrictionItem::update_from)
    }

    /// Applies a single restraint-set update.
    pub fn update_restraint(&mut self, id: Uuid, item: Option<RestraintItem>) -> CacheUpdate {
        Self::apply_update(&mut self.restraints, id, item, RestraintItem::update_from)
    }

    /// Replaces the collar entry.
    pub fn set_collar(&mut self, collar: Option<CollarItem>) {
        self.collar = collar;
    }

    /// Applies a single cursed-loot update.
    pub fn update_cursed(&mut self, id: Uuid, item: Option<CursedItem>) -> CacheUpdate {
        Self::apply_update(&mut self.cursed_loot, id, item, CursedItem::update_from)
    }

    /// Applies a single pattern update.
    pub fn update_pattern(&mut self, id: Uuid, item: Option<PatternItem>) -> CacheUpdate {
        Self::apply_update(&mut self.patterns, id, item, PatternItem::update_from)
    }

    /// Applies a single alarm update.
    pub fn update_alarm(&mut self, id: Uuid, item: Option<AlarmItem>) -> CacheUpdate {
        Self::apply_update(&mut self.alarms, id, item, AlarmItem::update_from)
    }

    /// Applies a single trigger update.
    pub fn update_trigger(&mut self, id: Uuid, item: Option<TriggerItem>) -> CacheUpdate {
        Self::apply_update(&mut self.triggers, id, item, TriggerItem::update_from)
    }

    fn apply_update<T>(
        map: &mut HashMap<Uuid, T>,
        id: Uuid,
        item: Option<T>,
        update_in_place: fn(&mut T, T),
    ) -> CacheUpdate {
        match item {
            None => {
                if map.remove(&id).is_some() {
                    CacheUpdate::Removed
                } else {
                    CacheUpdate::NoEntry
                }
            },
            Some(snapshot) => {
                if let Some(existing) = map.get_mut(&id) {
                    update_in_place(existing, snapshot);
                    CacheUpdate::Updated
                } else {
                    map.insert(id, snapshot);
                    CacheUpdate::Inserted
                }
            },
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Looks up a gag by id.
    #[must_use]
    pub fn gag(&self, id: Uuid) -> Option<&GagItem> {
        self.gags.get(&id)
    }

    /// Looks up a restriction by id.
    #[must_use]
    pub fn restriction(&self, id: Uuid) -> Option<&RestrictionItem> {
        self.restrictions.get(&id)
    }

    /// Looks up a restraint set by id.
    #[must_use]
    pub fn restraint(&self, id: Uuid) -> Option<&RestraintItem> {
        self.restraints.get(&id)
    }

    /// Returns the collar, if one exists.
    #[must_use]
    pub fn collar(&self) -> Option<&CollarItem> {
        self.collar.as_ref()
    }

    /// Looks up a cursed loot item by id.
    #[must_use]
    pub fn cursed(&self, id: Uuid) -> Option<&CursedItem> {
        self.cursed_loot.get(&id)
    }

    /// Looks up a pattern by id.
    #[must_use]
    pub fn pattern(&self, id: Uuid) -> Option<&PatternItem> {
        self.patterns.get(&id)
    }

    /// Looks up an alarm by id.
    #[must_use]
    pub fn alarm(&self, id: Uuid) -> Option<&AlarmItem> {
        self.alarms.get(&id)
    }

    /// Looks up a trigger by id.
    #[must_use]
    pub fn trigger(&self, id: Uuid) -> Option<&TriggerItem> {
        self.triggers.get(&id)
    }

    /// Number of entries across all categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gags.len()
            + self.restrictions.len()
            + self.restraints.len()
            + usize::from(self.collar.is_some())
            + self.cursed_loot.len()
            + self.patterns.len()
            + self.alarms.len()
            + self.triggers.len()
    }

    /// True when no category has any entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Cross-reference resolution
    // ------------------------------------------------------------------

    /// Resolves the restriction a restraint slot references, if present.
    #[must_use]
    pub fn resolve_slot_restriction(&self, slot: &RestraintSlotDef) -> Option<&RestrictionItem> {
        match slot {
            RestraintSlotDef::Basic { .. } => None,
            RestraintSlotDef::Restriction { restriction } => self.restriction(*restriction),
        }
    }

    /// Resolves the restriction a restraint layer references, if present.
    #[must_use]
    pub fn resolve_layer_restriction(&self, layer: &RestraintLayerDef) -> Option<&RestrictionItem> {
        layer.restriction.and_then(|id| self.restriction(id))
    }

    /// Resolves a cursed loot item's attachment, if present.
    #[must_use]
    pub fn resolve_attachment(&self, item: &CursedItem) -> Option<ResolvedAttachment<'_>> {
        match item.attachment {
            CursedAttachment::Gag { gag } => self.gag(gag).map(ResolvedAttachment::Gag),
            CursedAttachment::Restriction { restriction } => self
                .restriction(restriction)
                .map(ResolvedAttachment::Restriction),
        }
    }

    /// Resolves the pattern an alarm fires, if present.
    #[must_use]
    pub fn resolve_alarm_pattern(&self, alarm: &AlarmItem) -> Option<&PatternItem> {
        self.pattern(alarm.pattern)
    }
}
