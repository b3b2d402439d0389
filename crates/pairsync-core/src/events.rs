//! Closed event vocabulary emitted towards UI and achievement collaborators.
//!
//! Every notification the core fires is a [`PairEvent`] variant with a fixed
//! payload shape, delivered through a single injected [`EventSink`]. There
//! is no runtime registration or delegate-type checking: consumers match on
//! the enum and ignore kinds they do not care about.
//!
//! Sinks must be non-blocking and must not panic into the caller; state
//! mutation has always completed before the corresponding event is emitted.

use uuid::Uuid;

use crate::identity::UserId;
use crate::messages::UpdateKind;
use crate::permissions::PuppetPerms;

/// Item category named in an [`ItemChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    /// Gag slots.
    Gag,
    /// Restriction slots.
    Restriction,
    /// The restraint set.
    Restraint,
    /// Cursed loot.
    CursedLoot,
    /// Vibrator patterns.
    Pattern,
    /// Alarms.
    Alarm,
    /// Triggers.
    Trigger,
    /// Alias rules.
    Alias,
}

impl ItemCategory {
    /// Returns a stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gag => "gag",
            Self::Restriction => "restriction",
            Self::Restraint => "restraint",
            Self::CursedLoot => "cursed_loot",
            Self::Pattern => "pattern",
            Self::Alarm => "alarm",
            Self::Trigger => "trigger",
            Self::Alias => "alias",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an item change happened: an indexed slot or a keyed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef {
    /// Indexed slot (gags, restrictions; the restraint set is index 0).
    Index(usize),
    /// Keyed item (cursed loot, patterns, alarms, triggers, alias rules).
    Item(Uuid),
}

/// One item transition on one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemChange {
    /// Whose state changed.
    pub peer: UserId,
    /// Which category changed.
    pub category: ItemCategory,
    /// The transition that was applied.
    pub kind: UpdateKind,
    /// Which slot or item changed.
    pub slot: SlotRef,
    /// Item id occupying the slot before the transition.
    pub previous: Option<Uuid>,
    /// Item id occupying the slot after the transition.
    pub next: Option<Uuid>,
    /// Who performed the transition.
    pub enactor: UserId,
    /// Whether the slot/item is active after the transition.
    pub active: bool,
}

/// Everything the core notifies collaborators about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairEvent {
    /// An item slot changed on a peer. `Swapped` transitions emit two of
    /// these: the removal of the old item, then the application of the new.
    ItemChanged(ItemChange),
    /// A peer's presence bound to a render entity.
    PresenceBound {
        /// The peer that became visible.
        peer: UserId,
        /// The entity's display name.
        name: String,
    },
    /// A peer's presence unbound from its render entity.
    PresenceUnbound {
        /// The peer that is no longer visible.
        peer: UserId,
    },
    /// A pairing was removed from the directory.
    PairRemoved {
        /// The removed peer.
        peer: UserId,
    },
    /// The directory's composition or a permission changed; cached views
    /// must be refreshed.
    DirectoryChanged,
    /// A unique-permission change newly granted puppeteer categories.
    PuppetAccessGranted {
        /// The peer whose grant changed.
        peer: UserId,
        /// Exactly the categories granted by this change.
        granted: PuppetPerms,
    },
}

/// Receiver for [`PairEvent`]s.
///
/// Implementations must return promptly and must not panic; they are called
/// from state-mutation paths on arbitrary worker threads.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: PairEvent);
}

/// Sink that drops every event. Useful as a default and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PairEvent) {}
}

/// Sink that logs every event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PairEvent) {
        match &event {
            PairEvent::ItemChanged(change) => tracing::debug!(
                peer = %change.peer,
                category = %change.category,
                kind = %change.kind,
                active = change.active,
                "Item changed"
            ),
            PairEvent::PresenceBound { peer, name } => {
                tracing::debug!(%peer, %name, "Presence bound");
            },
            PairEvent::PresenceUnbound { peer } => {
                tracing::debug!(%peer, "Presence unbound");
            },
            PairEvent::PairRemoved { peer } => {
                tracing::debug!(%peer, "Pair removed");
            },
            PairEvent::DirectoryChanged => {
                tracing::trace!("Directory changed");
            },
            PairEvent::PuppetAccessGranted { peer, granted } => {
                tracing::debug!(%peer, ?granted, "Puppet access granted");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_are_stable() {
        assert_eq!(ItemCategory::CursedLoot.as_str(), "cursed_loot");
        assert_eq!(ItemCategory::Gag.to_string(), "gag");
    }

    #[test]
    fn null_sink_accepts_everything() {
        NullSink.emit(PairEvent::DirectoryChanged);
        NullSink.emit(PairEvent::PairRemoved {
            peer: UserId::new("VAULT-001"),
        });
    }
}
