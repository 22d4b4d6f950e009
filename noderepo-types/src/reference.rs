//! Node references.
//!
//! A reference is the stable, externally visible identity of a node across
//! all of its revisions. Fresh references are UUID v7 so they sort by
//! creation time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

const EMPTY_BYTES: [u8; 16] = [0x11; 16];
const ROOT_BYTES: [u8; 16] = [0, 0, 0, 0, 0, 0, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Identifier shared by every revision of a node.
///
/// [`Reference::empty`] is the "no reference" sentinel. It is never assigned
/// to a persisted node; relation fields (`parent`, `set`, `source`, ...) use
/// it to mean "no relation".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(Uuid);

impl Reference {
    /// Generates a new time-ordered reference.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The reserved "no reference" sentinel (`11111111-1111-1111-1111-111111111111`).
    #[must_use]
    pub const fn empty() -> Self {
        Self(Uuid::from_bytes(EMPTY_BYTES))
    }

    /// The reserved hierarchy root (`00000000-0000-1000-0000-000000000000`).
    #[must_use]
    pub const fn root() -> Self {
        Self(Uuid::from_bytes(ROOT_BYTES))
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.as_bytes() == &EMPTY_BYTES
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.as_bytes() == &ROOT_BYTES
    }

    /// Parses a reference from its textual form.
    ///
    /// The empty string parses to the empty sentinel; anything else must be a
    /// UUID (hyphenated or simple form).
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        if s.len() < 32 {
            return Err(Error::InvalidReference(format!("reference too short: {s:?}")));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidReference(format!("{s:?}: {e}")))
    }
}

impl Default for Reference {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for Reference {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
