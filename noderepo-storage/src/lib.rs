//! Versioned storage engine for the node repository.
//!
//! - [`NodeStore`] find / save / soft-delete with optimistic revision checks
//! - an append-only audit table holding every committed revision
//! - per-type lifecycle hooks and validation through the handler registry
//! - one [`ModelEvent`](noderepo_types::ModelEvent) published per committed write
//!
//! Backed by SQLite (`rusqlite`); payloads are stored as JSON text and
//! queried with SQLite's JSON functions.

mod config;
mod error;
mod query;
mod schema;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use query::{Column, FilterValue, NodeQuery, SortDirection, SqlParts};
pub use store::{NodeStore, Page};
