#![allow(dead_code)]

use std::sync::Arc;

use noderepo_model::handlers::{PasswordParams, UserHandler};
use noderepo_model::{HandlerRegistry, Node};
use noderepo_storage::{NodeStore, StoreConfig};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Built-in types, with cheap password hashing.
pub fn registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::with_defaults();
    registry.register("core.user", UserHandler::with_params(PasswordParams::fast()));
    Arc::new(registry)
}

pub fn store() -> NodeStore {
    init_tracing();
    NodeStore::open_in_memory(registry()).unwrap()
}

pub fn store_with(config: StoreConfig) -> NodeStore {
    init_tracing();
    NodeStore::open_in_memory_with_config(registry(), config).unwrap()
}

/// An unsaved blog post named and slugged after `name`.
pub fn post(store: &NodeStore, name: &str) -> Node {
    let mut node = store.new_node("blog.post").unwrap();
    node.name = name.to_string();
    node.slug = name.to_lowercase().replace(' ', "-");
    node.data["title"] = name.into();
    node
}

pub fn saved_post(store: &NodeStore, name: &str) -> Node {
    let mut node = post(store, name);
    store.save(&mut node).unwrap();
    node
}
