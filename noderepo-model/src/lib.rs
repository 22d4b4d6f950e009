//! Node model for the content repository.
//!
//! Defines the types the storage engine and every handler agree on:
//! - [`Node`] the polymorphic record (metadata plus JSON `data`/`meta` payloads)
//! - [`ValidationErrors`] field-keyed validation messages
//! - [`NodeHandler`] the per-type strategy (payload shape, validation, lifecycle hooks)
//! - [`HandlerRegistry`] type string to handler lookup, built once at startup
//!
//! The storage engine never names concrete node types; everything type
//! specific flows through the registry.

mod error;
mod handler;
pub mod handlers;
mod node;
mod registry;
mod validation;

pub use error::{ModelError, ModelResult};
pub use handler::{HookContext, NodeHandler, merge_payload};
pub use node::Node;
pub use registry::HandlerRegistry;
pub use validation::ValidationErrors;

pub use noderepo_types::{NodeStatus, ProcessStatus, Reference};
