//! # pairsync-core
//!
//! Deterministic data model for the pairsync client: the types that describe
//! a remotely-paired peer and the operations that keep a local mirror of that
//! peer's state consistent with inbound network messages.
//!
//! This crate is intentionally free of async machinery and locks. Everything
//! here is plain data plus pure mutation operations, so it can be exercised
//! in unit tests without a runtime. The concurrent client runtime (the
//! per-peer aggregate, the pairing registry, presence binding, and the
//! permission reconciler) lives in `pairsync-client` and is built on top of
//! these types.
//!
//! # Modules
//!
//! - [`identity`]: stable user identifiers and display identities
//! - [`permissions`]: the four permission views exchanged between paired
//!   peers, the peer-scoped global snapshot, and the closed field mapping
//!   used to apply single-field mutations
//! - [`composite`]: the latest full snapshot of a peer's active items (gag
//!   and restriction slots, restraint state, cursed loot, patterns, alarms,
//!   triggers, alias rules)
//! - [`cache`]: the denormalized replicated catalog cache built from
//!   lightweight wire snapshots
//! - [`messages`]: inbound wire message shapes (descriptors, snapshots,
//!   per-category partial updates, permission mutations)
//! - [`events`]: the closed event vocabulary emitted towards UI and
//!   achievement collaborators, and the [`events::EventSink`] trait
//! - [`config`]: tunable intervals and timeouts for the client runtime

pub mod cache;
pub mod composite;
pub mod config;
pub mod events;
pub mod identity;
pub mod messages;
pub mod permissions;

pub use cache::{CacheSnapshot, CacheUpdate, ReplicatedCache, ResolvedAttachment};
pub use composite::{
    ActiveGagSlot, ActiveItemsSummary, ActiveRestraintState, ActiveRestrictionSlot, AliasRule,
    CompositeActiveState, GAG_SLOT_COUNT, Padlock, RESTRICTION_SLOT_COUNT, RestraintLayers,
    SummarySlot,
};
pub use config::{ConfigError, SyncConfig};
pub use events::{EventSink, ItemCategory, ItemChange, NullSink, PairEvent, SlotRef, TracingSink};
pub use identity::{UserId, UserIdentity};
pub use messages::{
    AccessPermUpdate, AliasScope, AliasUpdate, AlarmUpdate, CompositeSnapshot, CursedLootUpdate,
    GagUpdate, GlobalPermBulk, GlobalPermUpdate, OverlayPayload, PairDescriptor, PatternUpdate,
    PermDirection, PresenceDescriptor, RestraintUpdate, RestrictionUpdate, TriggerUpdate,
    UniquePermUpdate, UpdateKind,
};
pub use permissions::{
    EffectiveMoodlePerms, GlobalPermField, GlobalPermissions, MoodlePerms, PairPermAccess,
    PairPermField, PairPermissions, PermValue, PermissionBundle, PermissionError, PuppetPerms,
};
