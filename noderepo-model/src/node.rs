use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use noderepo_types::{NodeStatus, Reference};

/// A versioned record in the content repository.
///
/// `data` and `meta` hold the type-specific payload as JSON; their shape is
/// owned by the handler registered for `node_type`. Every other field is
/// common to all types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Storage row id; `None` until the node is first persisted.
    #[serde(skip)]
    id: Option<i64>,
    #[serde(rename = "uuid")]
    pub reference: Reference,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub slug: String,
    pub data: Value,
    pub meta: Value,
    pub status: NodeStatus,
    pub weight: i32,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub enabled: bool,
    pub deleted: bool,
    pub created_by: Reference,
    pub updated_by: Reference,
    #[serde(rename = "parent_uuid")]
    pub parent: Reference,
    /// Ancestors from the top of the tree down to `parent`. Maintained by
    /// the store; changed only through a move.
    pub parents: Vec<Reference>,
    #[serde(rename = "set_uuid")]
    pub set: Reference,
    pub source: Reference,
}

impl Node {
    /// A fresh, never-persisted node with no type.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            reference: Reference::empty(),
            node_type: String::new(),
            name: String::new(),
            slug: String::new(),
            data: Value::Object(Map::new()),
            meta: Value::Object(Map::new()),
            status: NodeStatus::Draft,
            weight: 1,
            revision: 1,
            created_at: now,
            updated_at: now,
            enabled: true,
            deleted: false,
            created_by: Reference::empty(),
            updated_by: Reference::empty(),
            parent: Reference::empty(),
            parents: Vec::new(),
            set: Reference::empty(),
            source: Reference::empty(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Binds the node to a storage row. Only the storage engine calls this.
    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// True until the node has been persisted.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Identifier of this exact revision, e.g. for blob storage keys.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}-v{}", self.reference, self.revision)
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.data.clone())
    }

    pub fn meta_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.meta.clone())
    }

    pub fn set_data<T: Serialize>(&mut self, data: &T) -> serde_json::Result<()> {
        self.data = serde_json::to_value(data)?;
        Ok(())
    }

    pub fn set_meta<T: Serialize>(&mut self, meta: &T) -> serde_json::Result<()> {
        self.meta = serde_json::to_value(meta)?;
        Ok(())
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/title").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.data.pointer(pointer).and_then(|v| v.as_bool())
    }

    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.data.pointer(pointer).and_then(|v| v.as_f64())
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
