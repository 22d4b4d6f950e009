use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ModelError, ModelResult, Node, ValidationErrors};

/// Capabilities the storage engine exposes to lifecycle hooks.
pub trait HookContext {
    /// Publishes `payload` on `channel` through the repository's notification bus.
    fn notify(&self, channel: &str, payload: &str) -> ModelResult<()>;
}

/// Per-type strategy for a node type.
///
/// Handlers are stateless and shared across threads. Only [`get_struct`]
/// is required; every other capability passes the node through unchanged.
///
/// Pre-hooks run before the write transaction and abort the save on error.
/// Post-hooks run after commit; their errors are reported to the caller but
/// the write stays committed.
///
/// [`get_struct`]: NodeHandler::get_struct
pub trait NodeHandler: Send + Sync {
    /// Fresh `(data, meta)` payloads for a new node of this type.
    fn get_struct(&self) -> (Value, Value);

    /// Shapes payloads read from storage into this type's structure.
    ///
    /// The default overlays the stored values on the [`get_struct`] shape so
    /// fields added since the row was written get their defaults.
    ///
    /// [`get_struct`]: NodeHandler::get_struct
    fn load(&self, data: Value, meta: Value) -> ModelResult<(Value, Value)> {
        let (shape_data, shape_meta) = self.get_struct();
        Ok((merge_payload(shape_data, data), merge_payload(shape_meta, meta)))
    }

    /// Adds type-specific errors. Must not mutate the node.
    fn validate(&self, node: &Node, errors: &mut ValidationErrors) {
        let _ = (node, errors);
    }

    fn pre_insert(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        let _ = (node, ctx);
        Ok(())
    }

    fn pre_update(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        let _ = (node, ctx);
        Ok(())
    }

    fn post_insert(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        let _ = (node, ctx);
        Ok(())
    }

    fn post_update(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        let _ = (node, ctx);
        Ok(())
    }
}

/// Overlays `stored` on `shape`, key by key for objects.
///
/// Keys present only in `stored` are kept. A `null` stored payload yields
/// the shape.
#[must_use]
pub fn merge_payload(shape: Value, stored: Value) -> Value {
    match (shape, stored) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (shape, Value::Null) => shape,
        (_, stored) => stored,
    }
}

/// Round-trips payloads through a handler's typed structs.
pub(crate) fn load_typed<D, M>(node_type: &str, data: Value, meta: Value) -> ModelResult<(Value, Value)>
where
    D: Serialize + DeserializeOwned,
    M: Serialize + DeserializeOwned,
{
    let (data, meta) = decode_typed::<D, M>(node_type, data, meta)?;
    Ok((encode(node_type, &data)?, encode(node_type, &meta)?))
}

pub(crate) fn decode_typed<D, M>(node_type: &str, data: Value, meta: Value) -> ModelResult<(D, M)>
where
    D: DeserializeOwned,
    M: DeserializeOwned,
{
    let data = normalize(data);
    let meta = normalize(meta);
    let payload_err = |source| ModelError::Payload {
        node_type: node_type.to_string(),
        source,
    };
    Ok((
        serde_json::from_value(data).map_err(payload_err)?,
        serde_json::from_value(meta).map_err(payload_err)?,
    ))
}

pub(crate) fn encode<T: Serialize>(node_type: &str, value: &T) -> ModelResult<Value> {
    serde_json::to_value(value).map_err(|source| ModelError::Payload {
        node_type: node_type.to_string(),
        source,
    })
}

fn normalize(value: Value) -> Value {
    if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value
    }
}
