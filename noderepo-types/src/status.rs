use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::Error;

/// Editorial status of a node. Stored and serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeStatus {
    #[default]
    Draft,
    Completed,
    Validated,
}

impl NodeStatus {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Draft => 1,
            Self::Completed => 2,
            Self::Validated => 3,
        }
    }

    pub fn from_code(code: i64) -> crate::Result<Self> {
        match code {
            1 => Ok(Self::Draft),
            2 => Ok(Self::Completed),
            3 => Ok(Self::Validated),
            other => Err(Error::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Completed => "completed",
            Self::Validated => "validated",
        };
        f.write_str(s)
    }
}

impl Serialize for NodeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for NodeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code).map_err(serde::de::Error::custom)
    }
}

/// State of a background process attached to a node's metadata, such as a
/// remote file download for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessStatus {
    #[default]
    Init,
    Ready,
    Update,
    Done,
    Error,
}

impl ProcessStatus {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Init => 0,
            Self::Ready => 1,
            Self::Update => 2,
            Self::Done => 3,
            Self::Error => -1,
        }
    }

    pub fn from_code(code: i64) -> crate::Result<Self> {
        match code {
            0 => Ok(Self::Init),
            1 => Ok(Self::Ready),
            2 => Ok(Self::Update),
            3 => Ok(Self::Done),
            -1 => Ok(Self::Error),
            other => Err(Error::InvalidStatus(other)),
        }
    }
}

impl Serialize for ProcessStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ProcessStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code).map_err(serde::de::Error::custom)
    }
}
