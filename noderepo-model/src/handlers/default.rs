use serde_json::{Map, Value};

use crate::NodeHandler;

/// Untyped node: free-form payloads, no validation, no hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

impl NodeHandler for DefaultHandler {
    fn get_struct(&self) -> (Value, Value) {
        (Value::Object(Map::new()), Value::Object(Map::new()))
    }
}
