//! Stable user identifiers and display identities.
//!
//! Every paired peer is addressed by a [`UserId`], a stable opaque string
//! assigned by the server at account creation. A [`UserIdentity`] pairs that
//! id with an optional display alias. Both are immutable once assigned;
//! alias changes arrive as a fresh identity in a new pairing descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable unique identifier for a paired user.
///
/// Opaque to this crate: the only operations are equality, hashing, and
/// display. Never parsed or decomposed locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw uid string.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Returns the uid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(uid: &str) -> Self {
        Self(uid.to_string())
    }
}

/// A peer's identity as shown to the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable unique id.
    pub uid: UserId,

    /// Optional display alias chosen by the peer.
    pub alias: Option<String>,
}

impl UserIdentity {
    /// Creates an identity with no alias.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: UserId::new(uid),
            alias: None,
        }
    }

    /// Creates an identity with a display alias.
    #[must_use]
    pub fn with_alias(uid: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            uid: UserId::new(uid),
            alias: Some(alias.into()),
        }
    }

    /// Returns the alias when set, falling back to the uid string.
    #[must_use]
    pub fn alias_or_uid(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.uid.as_str())
    }

    /// Returns true when `needle` matches either the uid or the alias.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.uid.as_str() == needle || self.alias.as_deref() == Some(needle)
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias_or_uid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_falls_back_to_uid() {
        let bare = UserIdentity::new("VAULT-001");
        assert_eq!(bare.alias_or_uid(), "VAULT-001");

        let named = UserIdentity::with_alias("VAULT-001", "Mistress");
        assert_eq!(named.alias_or_uid(), "Mistress");
    }

    #[test]
    fn matches_uid_and_alias() {
        let ident = UserIdentity::with_alias("VAULT-001", "Mistress");
        assert!(ident.matches("VAULT-001"));
        assert!(ident.matches("Mistress"));
        assert!(!ident.matches("vault-001"));
    }

    #[test]
    fn uid_serde_is_transparent() {
        let uid = UserId::new("VAULT-002");
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"VAULT-002\"");
    }
}
