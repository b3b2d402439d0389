//! Permission views exchanged between paired peers.
//!
//! Every pairing carries four directional permission views plus one
//! peer-scoped global snapshot, collected in a [`PermissionBundle`]:
//!
//! | View         | Meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `own`        | what the local user allows this peer to do           |
//! | `peer`       | what this peer allows the local user to do           |
//! | `own_access` | which of the local user's fields the peer may edit   |
//! | `peer_access`| which of the peer's fields the local user may edit   |
//! | `global`     | the peer's account-wide settings snapshot            |
//!
//! Bundles are mutated only through the permission reconciler, which routes
//! every single-field change through the closed mapping in [`fields`]. Bulk
//! replacement (on reconnect) overwrites a whole view at once.

pub mod fields;

use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use fields::{GlobalPermField, PairPermField, PermValue, PermissionError};

bitflags! {
    /// Puppeteer command categories a peer is permitted to use.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PuppetPerms: u8 {
        /// May order the user to sit.
        const SIT = 0b0000_0001;
        /// May order arbitrary emotes.
        const EMOTES = 0b0000_0010;
        /// May invoke the user's alias rules.
        const ALIAS = 0b0000_0100;
        /// May issue any command.
        const ALL = 0b0000_1000;
    }
}

bitflags! {
    /// Moodle (status overlay) operations a peer is permitted to perform.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MoodlePerms: u8 {
        /// May apply the user's own moodle presets to the user.
        const APPLY_OWN = 0b0000_0001;
        /// May apply the peer's moodle presets to the user.
        const APPLY_THEIRS = 0b0000_0010;
        /// May apply moodles without an expiry.
        const PERMANENT = 0b0000_0100;
        /// May remove moodles from the user.
        const REMOVE = 0b0000_1000;
    }
}

/// A peer's account-wide settings snapshot.
///
/// Received once in the pairing descriptor and replaced wholesale by
/// global-bulk permission messages; individual fields change through
/// [`GlobalPermField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalPermissions {
    /// Chat garbling is currently active for the peer.
    pub chat_garbler_active: bool,
    /// The garbler toggle itself is locked against the peer.
    pub chat_garbler_locked: bool,
    /// Wardrobe (restriction/restraint) features are enabled.
    pub wardrobe_enabled: bool,
    /// Worn gags alter the peer's appearance.
    pub gag_visuals: bool,
    /// Worn restrictions alter the peer's appearance.
    pub restriction_visuals: bool,
    /// Worn restraint sets alter the peer's appearance.
    pub restraint_visuals: bool,
    /// Puppeteer features are enabled.
    pub puppeteer_enabled: bool,
    /// Phrase that triggers puppeteer commands in chat.
    pub trigger_phrase: String,
    /// Opening bracket delimiting a puppeteer command.
    pub puppet_start_char: char,
    /// Closing bracket delimiting a puppeteer command.
    pub puppet_end_char: char,
    /// Puppeteer categories granted to everyone.
    pub puppet_perms: PuppetPerms,
    /// Toybox (pattern/alarm/trigger) features are enabled.
    pub toybox_enabled: bool,
    /// Spatial audio for vibrator playback.
    pub spatial_audio: bool,
    /// Moodle features are enabled.
    pub moodles_enabled: bool,
}

impl Default for GlobalPermissions {
    fn default() -> Self {
        Self {
            chat_garbler_active: false,
            chat_garbler_locked: false,
            wardrobe_enabled: false,
            gag_visuals: false,
            restriction_visuals: false,
            restraint_visuals: false,
            puppeteer_enabled: false,
            trigger_phrase: String::new(),
            puppet_start_char: '(',
            puppet_end_char: ')',
            puppet_perms: PuppetPerms::empty(),
            toybox_enabled: false,
            spatial_audio: false,
            moodles_enabled: false,
        }
    }
}

/// One direction of per-pair permissions: what the grantor allows the
/// grantee to do to them.
///
/// Durations bound how long the grantee's padlocks may run; `Duration::ZERO`
/// means no timed locks are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairPermissions {
    /// The pairing is paused: no interaction in either direction.
    pub is_paused: bool,

    /// May apply gags.
    pub apply_gags: bool,
    /// May padlock applied gags.
    pub lock_gags: bool,
    /// Longest timed gag padlock allowed.
    pub max_gag_time: Duration,
    /// May unlock gag padlocks.
    pub unlock_gags: bool,
    /// May remove applied gags.
    pub remove_gags: bool,

    /// May apply restrictions.
    pub apply_restrictions: bool,
    /// May padlock applied restrictions.
    pub lock_restrictions: bool,
    /// Longest timed restriction padlock allowed.
    pub max_restriction_time: Duration,
    /// May unlock restriction padlocks.
    pub unlock_restrictions: bool,
    /// May remove applied restrictions.
    pub remove_restrictions: bool,

    /// May apply restraint sets.
    pub apply_restraint_sets: bool,
    /// May padlock applied restraint sets.
    pub lock_restraint_sets: bool,
    /// Longest timed restraint padlock allowed.
    pub max_restraint_time: Duration,
    /// May unlock restraint padlocks.
    pub unlock_restraint_sets: bool,
    /// May remove applied restraint sets.
    pub remove_restraint_sets: bool,

    /// May apply padlocks with no expiry.
    pub permanent_locks: bool,
    /// May apply owner-exclusive padlocks.
    pub owner_locks: bool,
    /// May apply devotional padlocks.
    pub devotional_locks: bool,

    /// Puppeteer categories granted to this peer.
    pub puppet_perms: PuppetPerms,

    /// Moodle operations granted to this peer.
    pub moodle_perms: MoodlePerms,
    /// Longest moodle duration this peer may apply.
    pub max_moodle_time: Duration,

    /// May start vibrator patterns.
    pub execute_patterns: bool,
    /// May stop a running pattern.
    pub stop_patterns: bool,
    /// May toggle alarms.
    pub toggle_alarms: bool,
    /// May toggle triggers.
    pub toggle_triggers: bool,

    /// The grantor is in hardcore mode for this peer.
    pub in_hardcore: bool,
}

/// Edit-access view: which fields of the grantor's [`PairPermissions`] the
/// grantee may change remotely.
///
/// Field-for-field mirror of [`PairPermissions`]; `true` grants edit access
/// to the corresponding field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)] // Each flag mirrors the identically-named permission field.
pub struct PairPermAccess {
    pub is_paused: bool,

    pub apply_gags: bool,
    pub lock_gags: bool,
    pub max_gag_time: bool,
    pub unlock_gags: bool,
    pub remove_gags: bool,

    pub apply_restrictions: bool,
    pub lock_restrictions: bool,
    pub max_restriction_time: bool,
    pub unlock_restrictions: bool,
    pub remove_restrictions: bool,

    pub apply_restraint_sets: bool,
    pub lock_restraint_sets: bool,
    pub max_restraint_time: bool,
    pub unlock_restraint_sets: bool,
    pub remove_restraint_sets: bool,

    pub permanent_locks: bool,
    pub owner_locks: bool,
    pub devotional_locks: bool,

    pub puppet_perms: bool,

    pub moodle_perms: bool,
    pub max_moodle_time: bool,

    pub execute_patterns: bool,
    pub stop_patterns: bool,
    pub toggle_alarms: bool,
    pub toggle_triggers: bool,

    pub in_hardcore: bool,
}

/// The complete permission state held for one paired peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionBundle {
    /// The peer's account-wide settings snapshot.
    pub global: GlobalPermissions,
    /// What the local user allows this peer to do.
    pub own: PairPermissions,
    /// What this peer allows the local user to do.
    pub peer: PairPermissions,
    /// Which of the local user's fields the peer may edit.
    pub own_access: PairPermAccess,
    /// Which of the peer's fields the local user may edit.
    pub peer_access: PairPermAccess,
}

impl PermissionBundle {
    /// Computes the moodle permissions currently in effect for this peer,
    /// for rebroadcast to the overlay IPC collaborator.
    #[must_use]
    pub fn effective_moodle_perms(&self) -> EffectiveMoodlePerms {
        EffectiveMoodlePerms {
            enabled: self.global.moodles_enabled,
            perms: self.own.moodle_perms,
            max_duration: self.own.max_moodle_time,
        }
    }
}

/// The moodle permissions currently in effect for one peer.
///
/// Denormalized from the bundle whenever a moodle-related field changes and
/// pushed to the overlay IPC collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveMoodlePerms {
    /// Moodle features are enabled at all for the peer.
    pub enabled: bool,
    /// Operations granted to the peer.
    pub perms: MoodlePerms,
    /// Longest moodle duration the peer may apply.
    pub max_duration: Duration,
}

// serde for the bitflags types: serialized as their raw bit value so wire
// payloads stay compact and order-independent.

impl Serialize for PuppetPerms {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for PuppetPerms {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid puppet perm bits {bits:#x}")))
    }
}

impl Serialize for MoodlePerms {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for MoodlePerms {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid moodle perm bits {bits:#x}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_default_is_fully_denied() {
        let bundle = PermissionBundle::default();
        assert!(!bundle.own.apply_gags);
        assert!(!bundle.peer.apply_gags);
        assert!(bundle.own.puppet_perms.is_empty());
        assert_eq!(bundle.own.max_gag_time, Duration::ZERO);
        assert!(!bundle.own_access.is_paused);
    }

    #[test]
    fn effective_moodle_perms_track_own_view() {
        let mut bundle = PermissionBundle::default();
        bundle.global.moodles_enabled = true;
        bundle.own.moodle_perms = MoodlePerms::APPLY_OWN | MoodlePerms::REMOVE;
        bundle.own.max_moodle_time = Duration::from_secs(3600);

        let effective = bundle.effective_moodle_perms();
        assert!(effective.enabled);
        assert!(effective.perms.contains(MoodlePerms::REMOVE));
        assert_eq!(effective.max_duration, Duration::from_secs(3600));
    }

    #[test]
    fn puppet_perms_round_trip_as_bits() {
        let perms = PuppetPerms::SIT | PuppetPerms::EMOTES;
        let json = serde_json::to_string(&perms).unwrap();
        assert_eq!(json, "3");
        let back: PuppetPerms = serde_json::from_str(&json).unwrap();
        assert_eq!(back, perms);
    }

    #[test]
    fn invalid_flag_bits_are_rejected() {
        let err = serde_json::from_str::<MoodlePerms>("255").unwrap_err();
        assert!(err.to_string().contains("invalid moodle perm bits"));
    }
}
