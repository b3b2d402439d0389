//! Catalog entry types mirrored in the replicated cache.
//!
//! Each entry is the lightweight wire form of a catalog item: enough to
//! label and cross-reference it locally, nothing visual. Entries are mutated
//! in place via their `update_from` method so a cache slot keeps its
//! identity across updates; the id never changes once inserted.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A gag in the peer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GagItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
    /// How strongly chat is garbled while worn, 0–10.
    pub garble_strength: u8,
}

impl GagItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
        self.garble_strength = snapshot.garble_strength;
    }
}

/// A restriction in the peer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
}

impl RestrictionItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
    }
}

/// One slot of a restraint set definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RestraintSlotDef {
    /// A self-contained slot.
    Basic {
        /// Operator-facing label.
        label: String,
    },
    /// A slot backed by a restriction from the same catalog.
    Restriction {
        /// Id of the referenced restriction.
        restriction: Uuid,
    },
}

/// One ordered layer of a restraint set definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestraintLayerDef {
    /// Operator-facing label.
    pub label: String,
    /// Optional restriction backing this layer.
    pub restriction: Option<Uuid>,
}

/// A restraint set in the peer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestraintItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
    /// Slot definitions, possibly referencing restrictions.
    pub slots: Vec<RestraintSlotDef>,
    /// Ordered layer definitions.
    pub layers: Vec<RestraintLayerDef>,
}

impl RestraintItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
        self.slots = snapshot.slots;
        self.layers = snapshot.layers;
    }
}

/// The peer's collar, a singular catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollarItem {
    /// Operator-facing label.
    pub label: String,
    /// Engraved writing shown on inspection.
    pub writing: String,
}

/// What a cursed loot item attaches when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursedAttachment {
    /// Applies a gag from the same catalog.
    Gag {
        /// Id of the referenced gag.
        gag: Uuid,
    },
    /// Applies a restriction from the same catalog.
    Restriction {
        /// Id of the referenced restriction.
        restriction: Uuid,
    },
}

/// A cursed loot item in the peer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursedItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
    /// Whether the item is in the active loot pool.
    pub in_pool: bool,
    /// What the item attaches when it fires.
    pub attachment: CursedAttachment,
}

impl CursedItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
        self.in_pool = snapshot.in_pool;
        self.attachment = snapshot.attachment;
    }
}

/// A vibrator pattern in the peer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
    /// Playback length.
    pub duration: Duration,
    /// Whether playback loops.
    pub loops: bool,
}

impl PatternItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
        self.duration = snapshot.duration;
        self.loops = snapshot.loops;
    }
}

/// An alarm in the peer's catalog; fires a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
    /// The pattern this alarm starts.
    pub pattern: Uuid,
}

impl AlarmItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
        self.pattern = snapshot.pattern;
    }
}

/// A trigger in the peer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerItem {
    /// Stable catalog id.
    pub id: Uuid,
    /// Operator-facing label.
    pub label: String,
    /// Evaluation priority; lower fires first.
    pub priority: u8,
}

impl TriggerItem {
    /// Overwrites the wire-derived fields from `snapshot`, keeping the id.
    pub fn update_from(&mut self, snapshot: Self) {
        self.label = snapshot.label;
        self.priority = snapshot.priority;
    }
}
