//! Closed field mapping for single-field permission mutations.
//!
//! Inbound permission mutations address a field by name. Rather than a
//! string-keyed reflection lookup, every mutable field is a variant of
//! [`PairPermField`] or [`GlobalPermField`], and each variant carries one
//! typed setter with an exhaustive match. Adding a field to a permission
//! struct without extending the mapping is a compile error; a wire message
//! naming a field that does not exist fails to parse with
//! [`PermissionError::UnknownField`] on every mutation path alike.
//!
//! # Value Coercion
//!
//! Wire values arrive as a loosely-typed [`PermValue`] and are coerced per
//! field:
//!
//! | Target field type | Accepted wire value                        |
//! |-------------------|--------------------------------------------|
//! | `bool`            | boolean                                    |
//! | `Duration`        | integer, milliseconds                      |
//! | flag set          | integer, raw bits (invalid bits rejected)  |
//! | `char`            | string of exactly one character            |
//! | `String`          | string                                     |
//!
//! Any other combination is a [`PermissionError::TypeMismatch`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GlobalPermissions, MoodlePerms, PairPermAccess, PairPermissions, PuppetPerms};

/// Errors produced while applying a single-field permission mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The named field does not exist in the target view.
    #[error("unknown permission field: {name}")]
    UnknownField {
        /// The field name as received on the wire.
        name: String,
    },

    /// The wire value's shape does not match the field's type.
    #[error("field {field} expects {expected}, got {actual}")]
    TypeMismatch {
        /// The field being mutated.
        field: &'static str,
        /// The value shape the field requires.
        expected: &'static str,
        /// The value shape that was received.
        actual: &'static str,
    },

    /// A character field received a string that is not exactly one char.
    #[error("field {field} expects a single character, got {value:?}")]
    InvalidChar {
        /// The field being mutated.
        field: &'static str,
        /// The offending string.
        value: String,
    },

    /// A flag-set field received bits outside the defined set.
    #[error("field {field} received invalid flag bits {bits:#x}")]
    InvalidBits {
        /// The field being mutated.
        field: &'static str,
        /// The offending raw bits.
        bits: u64,
    },
}

/// A loosely-typed permission value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermValue {
    /// Boolean toggle.
    Bool(bool),
    /// Integer: milliseconds for durations, raw bits for flag sets.
    Int(u64),
    /// Text: single characters and free-form strings.
    Text(String),
}

impl PermValue {
    /// Name of the value's shape, for error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Text(_) => "string",
        }
    }

    fn as_bool(&self, field: &'static str) -> Result<bool, PermissionError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(PermissionError::TypeMismatch {
                field,
                expected: "boolean",
                actual: other.shape(),
            }),
        }
    }

    fn as_duration(&self, field: &'static str) -> Result<Duration, PermissionError> {
        match self {
            Self::Int(ms) => Ok(Duration::from_millis(*ms)),
            other => Err(PermissionError::TypeMismatch {
                field,
                expected: "integer (milliseconds)",
                actual: other.shape(),
            }),
        }
    }

    fn as_char(&self, field: &'static str) -> Result<char, PermissionError> {
        match self {
            Self::Text(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(PermissionError::InvalidChar {
                        field,
                        value: s.clone(),
                    }),
                }
            },
            other => Err(PermissionError::TypeMismatch {
                field,
                expected: "single-character string",
                actual: other.shape(),
            }),
        }
    }

    fn as_text(&self, field: &'static str) -> Result<String, PermissionError> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            other => Err(PermissionError::TypeMismatch {
                field,
                expected: "string",
                actual: other.shape(),
            }),
        }
    }

    fn as_puppet_perms(&self, field: &'static str) -> Result<PuppetPerms, PermissionError> {
        let bits = self.as_bits(field)?;
        u8::try_from(bits)
            .ok()
            .and_then(PuppetPerms::from_bits)
            .ok_or(PermissionError::InvalidBits { field, bits })
    }

    fn as_moodle_perms(&self, field: &'static str) -> Result<MoodlePerms, PermissionError> {
        let bits = self.as_bits(field)?;
        u8::try_from(bits)
            .ok()
            .and_then(MoodlePerms::from_bits)
            .ok_or(PermissionError::InvalidBits { field, bits })
    }

    fn as_bits(&self, field: &'static str) -> Result<u64, PermissionError> {
        match self {
            Self::Int(bits) => Ok(*bits),
            other => Err(PermissionError::TypeMismatch {
                field,
                expected: "integer (flag bits)",
                actual: other.shape(),
            }),
        }
    }
}

// ============================================================================
// Per-pair fields
// ============================================================================

/// Every mutable field of a [`PairPermissions`] view.
///
/// The same mapping serves the unique-permission and edit-access paths: an
/// access mutation addresses the identically-named boolean in
/// [`PairPermAccess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairPermField {
    /// `is_paused`
    IsPaused,
    /// `apply_gags`
    ApplyGags,
    /// `lock_gags`
    LockGags,
    /// `max_gag_time`
    MaxGagTime,
    /// `unlock_gags`
    UnlockGags,
    /// `remove_gags`
    RemoveGags,
    /// `apply_restrictions`
    ApplyRestrictions,
    /// `lock_restrictions`
    LockRestrictions,
    /// `max_restriction_time`
    MaxRestrictionTime,
    /// `unlock_restrictions`
    UnlockRestrictions,
    /// `remove_restrictions`
    RemoveRestrictions,
    /// `apply_restraint_sets`
    ApplyRestraintSets,
    /// `lock_restraint_sets`
    LockRestraintSets,
    /// `max_restraint_time`
    MaxRestraintTime,
    /// `unlock_restraint_sets`
    UnlockRestraintSets,
    /// `remove_restraint_sets`
    RemoveRestraintSets,
    /// `permanent_locks`
    PermanentLocks,
    /// `owner_locks`
    OwnerLocks,
    /// `devotional_locks`
    DevotionalLocks,
    /// `puppet_perms`
    PuppetPerms,
    /// `moodle_perms`
    MoodlePerms,
    /// `max_moodle_time`
    MaxMoodleTime,
    /// `execute_patterns`
    ExecutePatterns,
    /// `stop_patterns`
    StopPatterns,
    /// `toggle_alarms`
    ToggleAlarms,
    /// `toggle_triggers`
    ToggleTriggers,
    /// `in_hardcore`
    InHardcore,
}

impl PairPermField {
    /// Returns the wire name of this field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IsPaused => "is_paused",
            Self::ApplyGags => "apply_gags",
            Self::LockGags => "lock_gags",
            Self::MaxGagTime => "max_gag_time",
            Self::UnlockGags => "unlock_gags",
            Self::RemoveGags => "remove_gags",
            Self::ApplyRestrictions => "apply_restrictions",
            Self::LockRestrictions => "lock_restrictions",
            Self::MaxRestrictionTime => "max_restriction_time",
            Self::UnlockRestrictions => "unlock_restrictions",
            Self::RemoveRestrictions => "remove_restrictions",
            Self::ApplyRestraintSets => "apply_restraint_sets",
            Self::LockRestraintSets => "lock_restraint_sets",
            Self::MaxRestraintTime => "max_restraint_time",
            Self::UnlockRestraintSets => "unlock_restraint_sets",
            Self::RemoveRestraintSets => "remove_restraint_sets",
            Self::PermanentLocks => "permanent_locks",
            Self::OwnerLocks => "owner_locks",
            Self::DevotionalLocks => "devotional_locks",
            Self::PuppetPerms => "puppet_perms",
            Self::MoodlePerms => "moodle_perms",
            Self::MaxMoodleTime => "max_moodle_time",
            Self::ExecutePatterns => "execute_patterns",
            Self::StopPatterns => "stop_patterns",
            Self::ToggleAlarms => "toggle_alarms",
            Self::ToggleTriggers => "toggle_triggers",
            Self::InHardcore => "in_hardcore",
        }
    }

    /// Writes `value` into the corresponding field of `perms`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] when the value cannot be coerced into the
    /// field's type. `perms` is untouched on error.
    pub fn apply(
        self,
        perms: &mut PairPermissions,
        value: &PermValue,
    ) -> Result<(), PermissionError> {
        let name = self.as_str();
        match self {
            Self::IsPaused => perms.is_paused = value.as_bool(name)?,
            Self::ApplyGags => perms.apply_gags = value.as_bool(name)?,
            Self::LockGags => perms.lock_gags = value.as_bool(name)?,
            Self::MaxGagTime => perms.max_gag_time = value.as_duration(name)?,
            Self::UnlockGags => perms.unlock_gags = value.as_bool(name)?,
            Self::RemoveGags => perms.remove_gags = value.as_bool(name)?,
            Self::ApplyRestrictions => perms.apply_restrictions = value.as_bool(name)?,
            Self::LockRestrictions => perms.lock_restrictions = value.as_bool(name)?,
            Self::MaxRestrictionTime => perms.max_restriction_time = value.as_duration(name)?,
            Self::UnlockRestrictions => perms.unlock_restrictions = value.as_bool(name)?,
            Self::RemoveRestrictions => perms.remove_restrictions = value.as_bool(name)?,
            Self::ApplyRestraintSets => perms.apply_restraint_sets = value.as_bool(name)?,
            Self::LockRestraintSets => perms.lock_restraint_sets = value.as_bool(name)?,
            Self::MaxRestraintTime => perms.max_restraint_time = value.as_duration(name)?,
            Self::UnlockRestraintSets => perms.unlock_restraint_sets = value.as_bool(name)?,
            Self::RemoveRestraintSets => perms.remove_restraint_sets = value.as_bool(name)?,
            Self::PermanentLocks => perms.permanent_locks = value.as_bool(name)?,
            Self::OwnerLocks => perms.owner_locks = value.as_bool(name)?,
            Self::DevotionalLocks => perms.devotional_locks = value.as_bool(name)?,
            Self::PuppetPerms => perms.puppet_perms = value.as_puppet_perms(name)?,
            Self::MoodlePerms => perms.moodle_perms = value.as_moodle_perms(name)?,
            Self::MaxMoodleTime => perms.max_moodle_time = value.as_duration(name)?,
            Self::ExecutePatterns => perms.execute_patterns = value.as_bool(name)?,
            Self::StopPatterns => perms.stop_patterns = value.as_bool(name)?,
            Self::ToggleAlarms => perms.toggle_alarms = value.as_bool(name)?,
            Self::ToggleTriggers => perms.toggle_triggers = value.as_bool(name)?,
            Self::InHardcore => perms.in_hardcore = value.as_bool(name)?,
        }
        Ok(())
    }

    /// Writes `value` into the corresponding flag of an edit-access view.
    ///
    /// Every access field is a boolean regardless of the underlying
    /// permission field's type.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::TypeMismatch`] when `value` is not a
    /// boolean. `access` is untouched on error.
    pub fn apply_access(
        self,
        access: &mut PairPermAccess,
        value: &PermValue,
    ) -> Result<(), PermissionError> {
        let allowed = value.as_bool(self.as_str())?;
        match self {
            Self::IsPaused => access.is_paused = allowed,
            Self::ApplyGags => access.apply_gags = allowed,
            Self::LockGags => access.lock_gags = allowed,
            Self::MaxGagTime => access.max_gag_time = allowed,
            Self::UnlockGags => access.unlock_gags = allowed,
            Self::RemoveGags => access.remove_gags = allowed,
            Self::ApplyRestrictions => access.apply_restrictions = allowed,
            Self::LockRestrictions => access.lock_restrictions = allowed,
            Self::MaxRestrictionTime => access.max_restriction_time = allowed,
            Self::UnlockRestrictions => access.unlock_restrictions = allowed,
            Self::RemoveRestrictions => access.remove_restrictions = allowed,
            Self::ApplyRestraintSets => access.apply_restraint_sets = allowed,
            Self::LockRestraintSets => access.lock_restraint_sets = allowed,
            Self::MaxRestraintTime => access.max_restraint_time = allowed,
            Self::UnlockRestraintSets => access.unlock_restraint_sets = allowed,
            Self::RemoveRestraintSets => access.remove_restraint_sets = allowed,
            Self::PermanentLocks => access.permanent_locks = allowed,
            Self::OwnerLocks => access.owner_locks = allowed,
            Self::DevotionalLocks => access.devotional_locks = allowed,
            Self::PuppetPerms => access.puppet_perms = allowed,
            Self::MoodlePerms => access.moodle_perms = allowed,
            Self::MaxMoodleTime => access.max_moodle_time = allowed,
            Self::ExecutePatterns => access.execute_patterns = allowed,
            Self::StopPatterns => access.stop_patterns = allowed,
            Self::ToggleAlarms => access.toggle_alarms = allowed,
            Self::ToggleTriggers => access.toggle_triggers = allowed,
            Self::InHardcore => access.in_hardcore = allowed,
        }
        Ok(())
    }

    /// True for fields whose change must rebroadcast effective moodle
    /// permissions to the overlay IPC collaborator.
    #[must_use]
    pub const fn is_moodle_related(self) -> bool {
        matches!(self, Self::MoodlePerms | Self::MaxMoodleTime)
    }
}

impl FromStr for PairPermField {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "is_paused" => Self::IsPaused,
            "apply_gags" => Self::ApplyGags,
            "lock_gags" => Self::LockGags,
            "max_gag_time" => Self::MaxGagTime,
            "unlock_gags" => Self::UnlockGags,
            "remove_gags" => Self::RemoveGags,
            "apply_restrictions" => Self::ApplyRestrictions,
            "lock_restrictions" => Self::LockRestrictions,
            "max_restriction_time" => Self::MaxRestrictionTime,
            "unlock_restrictions" => Self::UnlockRestrictions,
            "remove_restrictions" => Self::RemoveRestrictions,
            "apply_restraint_sets" => Self::ApplyRestraintSets,
            "lock_restraint_sets" => Self::LockRestraintSets,
            "max_restraint_time" => Self::MaxRestraintTime,
            "unlock_restraint_sets" => Self::UnlockRestraintSets,
            "remove_restraint_sets" => Self::RemoveRestraintSets,
            "permanent_locks" => Self::PermanentLocks,
            "owner_locks" => Self::OwnerLocks,
            "devotional_locks" => Self::DevotionalLocks,
            "puppet_perms" => Self::PuppetPerms,
            "moodle_perms" => Self::MoodlePerms,
            "max_moodle_time" => Self::MaxMoodleTime,
            "execute_patterns" => Self::ExecutePatterns,
            "stop_patterns" => Self::StopPatterns,
            "toggle_alarms" => Self::ToggleAlarms,
            "toggle_triggers" => Self::ToggleTriggers,
            "in_hardcore" => Self::InHardcore,
            other => {
                return Err(PermissionError::UnknownField {
                    name: other.to_string(),
                });
            },
        })
    }
}

impl fmt::Display for PairPermField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Global fields
// ============================================================================

/// Every mutable field of a [`GlobalPermissions`] snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalPermField {
    /// `chat_garbler_active`
    ChatGarblerActive,
    /// `chat_garbler_locked`
    ChatGarblerLocked,
    /// `wardrobe_enabled`
    WardrobeEnabled,
    /// `gag_visuals`
    GagVisuals,
    /// `restriction_visuals`
    RestrictionVisuals,
    /// `restraint_visuals`
    RestraintVisuals,
    /// `puppeteer_enabled`
    PuppeteerEnabled,
    /// `trigger_phrase`
    TriggerPhrase,
    /// `puppet_start_char`
    PuppetStartChar,
    /// `puppet_end_char`
    PuppetEndChar,
    /// `puppet_perms`
    PuppetPerms,
    /// `toybox_enabled`
    ToyboxEnabled,
    /// `spatial_audio`
    SpatialAudio,
    /// `moodles_enabled`
    MoodlesEnabled,
}

impl GlobalPermField {
    /// Returns the wire name of this field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatGarblerActive => "chat_garbler_active",
            Self::ChatGarblerLocked => "chat_garbler_locked",
            Self::WardrobeEnabled => "wardrobe_enabled",
            Self::GagVisuals => "gag_visuals",
            Self::RestrictionVisuals => "restriction_visuals",
            Self::RestraintVisuals => "restraint_visuals",
            Self::PuppeteerEnabled => "puppeteer_enabled",
            Self::TriggerPhrase => "trigger_phrase",
            Self::PuppetStartChar => "puppet_start_char",
            Self::PuppetEndChar => "puppet_end_char",
            Self::PuppetPerms => "puppet_perms",
            Self::ToyboxEnabled => "toybox_enabled",
            Self::SpatialAudio => "spatial_audio",
            Self::MoodlesEnabled => "moodles_enabled",
        }
    }

    /// Writes `value` into the corresponding field of `global`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] when the value cannot be coerced into the
    /// field's type. `global` is untouched on error.
    pub fn apply(
        self,
        global: &mut GlobalPermissions,
        value: &PermValue,
    ) -> Result<(), PermissionError> {
        let name = self.as_str();
        match self {
            Self::ChatGarblerActive => global.chat_garbler_active = value.as_bool(name)?,
            Self::ChatGarblerLocked => global.chat_garbler_locked = value.as_bool(name)?,
            Self::WardrobeEnabled => global.wardrobe_enabled = value.as_bool(name)?,
            Self::GagVisuals => global.gag_visuals = value.as_bool(name)?,
            Self::RestrictionVisuals => global.restriction_visuals = value.as_bool(name)?,
            Self::RestraintVisuals => global.restraint_visuals = value.as_bool(name)?,
            Self::PuppeteerEnabled => global.puppeteer_enabled = value.as_bool(name)?,
            Self::TriggerPhrase => global.trigger_phrase = value.as_text(name)?,
            Self::PuppetStartChar => global.puppet_start_char = value.as_char(name)?,
            Self::PuppetEndChar => global.puppet_end_char = value.as_char(name)?,
            Self::PuppetPerms => global.puppet_perms = value.as_puppet_perms(name)?,
            Self::ToyboxEnabled => global.toybox_enabled = value.as_bool(name)?,
            Self::SpatialAudio => global.spatial_audio = value.as_bool(name)?,
            Self::MoodlesEnabled => global.moodles_enabled = value.as_bool(name)?,
        }
        Ok(())
    }

    /// True for fields whose change must rebroadcast effective moodle
    /// permissions to the overlay IPC collaborator.
    #[must_use]
    pub const fn is_moodle_related(self) -> bool {
        matches!(self, Self::MoodlesEnabled)
    }
}

impl FromStr for GlobalPermField {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "chat_garbler_active" => Self::ChatGarblerActive,
            "chat_garbler_locked" => Self::ChatGarblerLocked,
            "wardrobe_enabled" => Self::WardrobeEnabled,
            "gag_visuals" => Self::GagVisuals,
            "restriction_visuals" => Self::RestrictionVisuals,
            "restraint_visuals" => Self::RestraintVisuals,
            "puppeteer_enabled" => Self::PuppeteerEnabled,
            "trigger_phrase" => Self::TriggerPhrase,
            "puppet_start_char" => Self::PuppetStartChar,
            "puppet_end_char" => Self::PuppetEndChar,
            "puppet_perms" => Self::PuppetPerms,
            "toybox_enabled" => Self::ToyboxEnabled,
            "spatial_audio" => Self::SpatialAudio,
            "moodles_enabled" => Self::MoodlesEnabled,
            other => {
                return Err(PermissionError::UnknownField {
                    name: other.to_string(),
                });
            },
        })
    }
}

impl fmt::Display for GlobalPermField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
