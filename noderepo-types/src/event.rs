//! Change events.
//!
//! A [`ModelEvent`] is published once for every committed write. It carries
//! enough to let a subscriber decide whether to reload the node, not the
//! node itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Reference};

/// The kind of write that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelAction {
    Create,
    Update,
    SoftDelete,
}

impl fmt::Display for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::SoftDelete => "SoftDelete",
        };
        f.write_str(s)
    }
}

impl FromStr for ModelAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "SoftDelete" => Ok(Self::SoftDelete),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

/// Notification emitted by the storage engine after a write commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvent {
    /// Reference of the node that changed.
    pub subject: Reference,
    pub action: ModelAction,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Revision of the node after the write.
    pub revision: u32,
    pub name: String,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
}

impl ModelEvent {
    #[must_use]
    pub fn new(
        subject: Reference,
        action: ModelAction,
        node_type: impl Into<String>,
        revision: u32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            action,
            node_type: node_type.into(),
            revision,
            name: name.into(),
            timestamp: Utc::now(),
        }
    }

    /// Stamps the event with the time of the write it describes.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Serializes the event to its wire form.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes an event received from the bus.
    pub fn from_json(payload: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}
