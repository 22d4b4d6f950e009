use std::collections::HashMap;
use std::sync::Arc;

use crate::handlers::{DefaultHandler, ImageHandler, PostHandler, UserHandler, YoutubeHandler};
use crate::{ModelError, ModelResult, Node, NodeHandler};

/// Maps node type strings to their handlers.
///
/// Built once at startup and shared read-only (usually behind an `Arc`).
/// Lookups never fall back to a default handler: an unregistered type is
/// an error.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in types: `default`, `blog.post`,
    /// `media.image` and `core.user`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("default", DefaultHandler);
        registry.register("blog.post", PostHandler);
        registry.register("media.image", ImageHandler);
        registry.register("media.youtube", YoutubeHandler);
        registry.register("core.user", UserHandler::default());
        registry
    }

    /// Registers `handler` for `node_type`, replacing any previous handler.
    pub fn register(&mut self, node_type: impl Into<String>, handler: impl NodeHandler + 'static) {
        self.handlers.insert(node_type.into(), Arc::new(handler));
    }

    pub fn get(&self, node_type: &str) -> ModelResult<Arc<dyn NodeHandler>> {
        self.handlers
            .get(node_type)
            .cloned()
            .ok_or_else(|| ModelError::UnknownType(node_type.to_string()))
    }

    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Registered type strings, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// A new node of `node_type` with the handler's default payloads.
    pub fn new_node(&self, node_type: &str) -> ModelResult<Node> {
        let handler = self.get(node_type)?;
        let (data, meta) = handler.get_struct();

        let mut node = Node::new();
        node.node_type = node_type.to_string();
        node.data = data;
        node.meta = meta;
        Ok(node)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.keys())
            .finish()
    }
}
