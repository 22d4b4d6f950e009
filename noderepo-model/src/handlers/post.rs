use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::{encode, load_typed};
use crate::{ModelResult, NodeHandler};

const NODE_TYPE: &str = "blog.post";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub title: String,
    pub sub_title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMeta {
    /// Markup of `content`, e.g. `markdown`.
    pub format: String,
}

impl Default for PostMeta {
    fn default() -> Self {
        Self {
            format: "markdown".to_string(),
        }
    }
}

/// Blog post (`blog.post`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PostHandler;

impl NodeHandler for PostHandler {
    fn get_struct(&self) -> (Value, Value) {
        (
            encode(NODE_TYPE, &Post::default()).unwrap_or_default(),
            encode(NODE_TYPE, &PostMeta::default()).unwrap_or_default(),
        )
    }

    fn load(&self, data: Value, meta: Value) -> ModelResult<(Value, Value)> {
        load_typed::<Post, PostMeta>(NODE_TYPE, data, meta)
    }
}
