//! Versioned node store.
//!
//! One live row per reference plus an append-only audit table holding every
//! committed revision. Updates are optimistic: the caller's revision must
//! match the stored one, and the live row is replaced with a
//! compare-and-swap on `(id, revision)` inside the same transaction that
//! appends the audit row. In-place saves and moves rewrite live rows
//! without starting a revision.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use noderepo_bus::{HubListener, NotificationHub, Notifier};
use noderepo_model::{
    HandlerRegistry, HookContext, ModelError, ModelResult, Node, NodeHandler, ValidationErrors,
};
use noderepo_types::{ModelAction, ModelEvent, Reference};
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use tracing::{debug, info, warn};

use crate::query::NodeQuery;
use crate::schema::{self, NODE_COLUMNS, NodeRow, RawNode};
use crate::{StoreConfig, StoreError, StoreResult};

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub nodes: Vec<Node>,
    pub offset: usize,
    pub limit: usize,
    /// More rows match beyond this page.
    pub has_next: bool,
}

impl Page {
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.offset > 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Gives hooks access to the store's notifier.
struct StoreHooks<'a> {
    notifier: &'a dyn Notifier,
}

impl HookContext for StoreHooks<'_> {
    fn notify(&self, channel: &str, payload: &str) -> ModelResult<()> {
        self.notifier
            .notify(channel, payload)
            .map_err(|e| ModelError::Notify(e.to_string()))
    }
}

/// Versioned storage engine backed by SQLite.
pub struct NodeStore {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<HandlerRegistry>,
    notifier: Arc<dyn Notifier>,
    hub: Option<NotificationHub>,
    config: StoreConfig,
    nodes_table: String,
    audit_table: String,
    event_channel: String,
}

impl NodeStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(
        path: impl AsRef<Path>,
        registry: Arc<HandlerRegistry>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self::open_with_conn(conn, registry, config)?;
        info!(path = ?path.as_ref(), "node store opened");
        Ok(store)
    }

    /// Opens an in-memory store with the default configuration.
    pub fn open_in_memory(registry: Arc<HandlerRegistry>) -> StoreResult<Self> {
        Self::open_in_memory_with_config(registry, StoreConfig::default())
    }

    pub fn open_in_memory_with_config(
        registry: Arc<HandlerRegistry>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        Self::open_with_conn(Connection::open_in_memory()?, registry, config)
    }

    /// Wraps an existing connection, creating the tables if needed.
    ///
    /// Events go to an in-process [`NotificationHub`] until
    /// [`with_notifier`](Self::with_notifier) replaces it.
    pub fn open_with_conn(
        conn: Connection,
        registry: Arc<HandlerRegistry>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        config.validate()?;

        let nodes_table = config.nodes_table();
        let audit_table = config.audit_table();
        schema::init_schema(&conn, &nodes_table, &audit_table)?;

        let hub = NotificationHub::from_config(&config.bus);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
            notifier: Arc::new(hub.clone()),
            hub: Some(hub),
            event_channel: config.event_channel(),
            nodes_table,
            audit_table,
            config,
        })
    }

    /// Publishes events and hook notifications through `notifier` instead
    /// of the built-in hub.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self.hub = None;
        self
    }

    /// The built-in hub, unless a custom notifier was installed.
    #[must_use]
    pub fn hub(&self) -> Option<&NotificationHub> {
        self.hub.as_ref()
    }

    /// A new connection to the built-in hub, for a
    /// [`Subscriber`](noderepo_bus::Subscriber).
    #[must_use]
    pub fn listener(&self) -> Option<HubListener> {
        self.hub.as_ref().map(NotificationHub::listener)
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Channel on which [`ModelEvent`]s are published.
    #[must_use]
    pub fn event_channel(&self) -> &str {
        &self.event_channel
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns the live row for `reference`, soft-deleted or not.
    pub fn find(&self, reference: &Reference) -> StoreResult<Option<Node>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {NODE_COLUMNS} FROM {} WHERE reference = ?",
                self.nodes_table
            ))?;
            let mut rows = stmt.query(params![reference.to_string()])?;
            let raw = match rows.next()? {
                Some(row) => Some(RawNode::from_row(row)?),
                None => None,
            };
            raw
        };
        raw.map(|raw| self.hydrate(raw)).transpose()
    }

    /// Returns up to `limit` live rows matching `query`, skipping `offset`.
    pub fn find_by(&self, query: &NodeQuery, offset: usize, limit: usize) -> StoreResult<Page> {
        let parts = query.to_sql()?;
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            self.nodes_table, parts.where_clause, parts.order_clause,
        );
        debug!(sql = %sql, "find_by");

        let mut params = parts.params;
        params.extend(page_window(offset, limit));
        let mut raws = self.select(&sql, params)?;
        let has_next = raws.len() > limit;
        raws.truncate(limit);

        let nodes = raws
            .into_iter()
            .map(|raw| self.hydrate(raw))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            nodes,
            offset,
            limit,
            has_next,
        })
    }

    /// First live row matching `query`, in the query's order.
    pub fn find_one_by(&self, query: &NodeQuery) -> StoreResult<Option<Node>> {
        Ok(self.find_by(query, 0, 1)?.nodes.into_iter().next())
    }

    /// Committed revisions of `reference`, oldest first.
    pub fn find_revisions(
        &self,
        reference: &Reference,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Page> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE reference = ? ORDER BY revision ASC LIMIT ? OFFSET ?",
            self.audit_table
        );
        let mut params = vec![reference.to_string().into()];
        params.extend(page_window(offset, limit));
        let mut raws = self.select(&sql, params)?;
        let has_next = raws.len() > limit;
        raws.truncate(limit);

        let nodes = raws
            .into_iter()
            .map(|raw| self.hydrate(raw))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            nodes,
            offset,
            limit,
            has_next,
        })
    }

    /// One committed revision of `reference`.
    pub fn find_revision(&self, reference: &Reference, revision: u32) -> StoreResult<Option<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE reference = ? AND revision = ?",
            self.audit_table
        );
        let raws = self.select(
            &sql,
            vec![reference.to_string().into(), i64::from(revision).into()],
        )?;
        raws.into_iter().next().map(|raw| self.hydrate(raw)).transpose()
    }

    /// Number of audit rows for `reference`.
    pub fn audit_count(&self, reference: &Reference) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE reference = ?", self.audit_table),
            params![reference.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("bad count {count}")))
    }

    fn select(&self, sql: &str, params: Vec<rusqlite::types::Value>) -> StoreResult<Vec<RawNode>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params), RawNode::from_row)?;
        let raws = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(raws)
    }

    /// Shapes payloads through the type's handler. Rows of unregistered
    /// types keep their raw payloads.
    fn hydrate(&self, raw: RawNode) -> StoreResult<Node> {
        let handler = self.registry.get(raw.node_type()).ok();
        let mut node = raw.into_node()?;

        let Some(handler) = handler else {
            warn!(reference = %node.reference, node_type = %node.node_type, "no handler for stored type");
            return Ok(node);
        };

        match handler.load(node.data.clone(), node.meta.clone()) {
            Ok((data, meta)) => {
                node.data = data;
                node.meta = meta;
            }
            Err(e) => {
                warn!(reference = %node.reference, "stored payload does not match its type: {e}");
            }
        }
        Ok(node)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// A new, unsaved node of `node_type`.
    pub fn new_node(&self, node_type: &str) -> StoreResult<Node> {
        Ok(self.registry.new_node(node_type)?)
    }

    /// Inserts a new node or stores the next revision of an existing one.
    ///
    /// On success `node` reflects the committed row (id, reference, slug,
    /// revision, timestamps, tree position). On a pre-commit failure it is
    /// left as the pre-hook left it; a [`StoreError::Hook`] returned after
    /// commit means the write is durable and only the post-hook failed.
    ///
    /// Publishing the change event also happens after commit. A bus failure
    /// there is logged and does not fail the save.
    ///
    /// `parent` and `parents` are fixed at insert; updates keep the stored
    /// values. Use [`move_node`](Self::move_node) to re-parent.
    pub fn save(&self, node: &mut Node) -> StoreResult<()> {
        self.save_with(node, Revisioning::Bump)
    }

    /// Saves without starting a new revision.
    ///
    /// New nodes are inserted as usual. For a stored node the caller's
    /// revision must still match, but the live row is overwritten in place,
    /// keeps its revision and gets no audit row. Meant for background
    /// status updates that should not show up in the history.
    pub fn save_in_place(&self, node: &mut Node) -> StoreResult<()> {
        self.save_with(node, Revisioning::InPlace)
    }

    fn save_with(&self, node: &mut Node, revisioning: Revisioning) -> StoreResult<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        let handler = self.registry.get(&node.node_type)?;

        if node.is_new() {
            self.insert(node, handler.as_ref())
        } else {
            self.update(node, handler.as_ref(), ModelAction::Update, revisioning)
        }
    }

    /// Validates, then saves.
    pub fn save_valid(&self, node: &mut Node) -> StoreResult<()> {
        let (ok, errors) = self.validate(node);
        if !ok {
            return Err(StoreError::ValidationFailed(errors));
        }
        self.save(node)
    }

    /// Soft-deletes `node` as a new revision.
    ///
    /// Publishes a single [`ModelAction::SoftDelete`] event.
    pub fn remove_one(&self, node: &mut Node) -> StoreResult<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        if node.is_new() {
            return Err(StoreError::NotFound(node.reference));
        }
        if node.deleted {
            return Err(StoreError::AlreadyDeleted(node.reference));
        }
        let handler = self.registry.get(&node.node_type)?;

        let mut deleted = node.clone();
        deleted.deleted = true;
        deleted.updated_at = Utc::now();

        let result = self.update(
            &mut deleted,
            handler.as_ref(),
            ModelAction::SoftDelete,
            Revisioning::Bump,
        );
        // A post-commit failure still leaves the new revision in place.
        if deleted.revision > node.revision {
            *node = deleted;
        }
        result
    }

    /// Soft-deletes every live, not yet deleted row matching `query`.
    ///
    /// Works in batches of `remove_batch_size`, re-running the query after
    /// each batch until nothing matches. Returns the number of nodes removed.
    pub fn remove(&self, query: &NodeQuery) -> StoreResult<usize> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        let query = query.clone().where_eq(crate::Column::Deleted, false);
        let batch = self.config.remove_batch_size;
        let mut removed = 0;

        loop {
            let page = self.find_by(&query, 0, batch)?;
            if page.is_empty() {
                break;
            }
            for mut node in page.nodes {
                self.remove_one(&mut node)?;
                removed += 1;
            }
        }

        info!(removed, "soft-deleted nodes");
        Ok(removed)
    }

    /// Moves `reference` under `parent` and rewrites the ancestor path of the
    /// whole subtree.
    ///
    /// An empty `parent` detaches the node to the top level. Moving a node
    /// under itself or one of its descendants fails with
    /// [`StoreError::InvalidMove`]. Live rows change in place: no revision,
    /// no audit row. Publishes one [`ModelAction::Update`] event for the
    /// moved node.
    pub fn move_node(&self, reference: &Reference, parent: &Reference) -> StoreResult<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }

        let rewritten = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;

            let head = schema::read_head(&tx, &self.nodes_table, reference)?
                .ok_or(StoreError::NotFound(*reference))?;
            if head.deleted {
                return Err(StoreError::AlreadyDeleted(*reference));
            }
            let parents = schema::lineage(&tx, &self.nodes_table, parent)?
                .ok_or(StoreError::NotFound(*parent))?;
            if parents.contains(reference) {
                return Err(StoreError::InvalidMove {
                    reference: *reference,
                    parent: *parent,
                });
            }

            let rewritten = schema::move_subtree(&tx, &self.nodes_table, head.id, parent, &parents)
                .map_err(map_constraint)?;
            tx.commit()?;
            rewritten
        };
        info!(%reference, %parent, rewritten, "node moved");

        if let Some(node) = self.find(reference)? {
            self.publish(&node, ModelAction::Update);
        }
        Ok(())
    }

    /// Checks common fields, then the type's own rules. Never mutates.
    pub fn validate(&self, node: &Node) -> (bool, ValidationErrors) {
        let mut errors = ValidationErrors::new();

        if node.name.trim().is_empty() {
            errors.add_error("name", "Name cannot be empty");
        }
        if node.slug.trim().is_empty() {
            errors.add_error("slug", "Slug cannot be empty");
        }
        if node.node_type.is_empty() {
            errors.add_error("type", "Type cannot be empty");
        } else {
            match self.registry.get(&node.node_type) {
                Ok(handler) => handler.validate(node, &mut errors),
                Err(_) => errors.add_error("type", "Unknown node type"),
            }
        }

        (!errors.has_errors(), errors)
    }

    /// Publishes a raw notification through the store's notifier.
    pub fn notify(&self, channel: &str, payload: &str) -> StoreResult<()> {
        Ok(self.notifier.notify(channel, payload)?)
    }

    fn hooks(&self) -> StoreHooks<'_> {
        StoreHooks {
            notifier: self.notifier.as_ref(),
        }
    }

    fn insert(&self, node: &mut Node, handler: &dyn NodeHandler) -> StoreResult<()> {
        let hooks = self.hooks();
        handler.pre_insert(node, &hooks)?;

        let mut next = node.clone();
        if next.reference.is_empty() {
            next.reference = Reference::new();
        }
        if next.slug.trim().is_empty() {
            next.slug = next.reference.to_string();
        }
        next.created_at = schema::truncate_millis(next.created_at)?;
        next.updated_at = schema::truncate_millis(next.updated_at)?;

        let id = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            // An unknown parent still anchors the path.
            next.parents = schema::lineage(&tx, &self.nodes_table, &next.parent)?
                .unwrap_or_else(|| vec![next.parent]);

            let row = NodeRow::from_node(&next)?;
            let id = schema::insert_live(&tx, &self.nodes_table, &row).map_err(map_constraint)?;
            schema::insert_audit(&tx, &self.audit_table, id, &row).map_err(map_constraint)?;
            tx.commit()?;
            id
        };

        next.set_id(id);
        *node = next;
        debug!(reference = %node.reference, node_type = %node.node_type, "node created");

        let post = handler.post_insert(node, &hooks);
        self.publish(node, ModelAction::Create);
        Ok(post?)
    }

    fn update(
        &self,
        node: &mut Node,
        handler: &dyn NodeHandler,
        action: ModelAction,
        revisioning: Revisioning,
    ) -> StoreResult<()> {
        let hooks = self.hooks();
        handler.pre_update(node, &hooks)?;

        let reference = node.reference;
        let now = schema::truncate_millis(Utc::now())?;

        let next = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;

            let stored = schema::read_head(&tx, &self.nodes_table, &reference)?
                .ok_or(StoreError::NotFound(reference))?;

            if stored.deleted {
                return Err(StoreError::AlreadyDeleted(reference));
            }
            if stored.node_type != node.node_type {
                return Err(StoreError::TypeChanged {
                    reference,
                    stored: stored.node_type,
                    requested: node.node_type.clone(),
                });
            }
            if stored.revision != node.revision {
                return Err(StoreError::RevisionConflict {
                    reference,
                    expected: node.revision,
                    actual: stored.revision,
                });
            }

            let mut next = node.clone();
            next.set_id(stored.id);
            next.revision = match revisioning {
                Revisioning::Bump => stored.revision + 1,
                Revisioning::InPlace => stored.revision,
            };
            next.created_at = schema::from_millis(stored.created_at)?;
            next.updated_at = now;
            next.parent = stored.parent;
            next.parents = stored.parents;

            let row = NodeRow::from_node(&next)?;
            let changed = schema::update_live(&tx, &self.nodes_table, stored.id, stored.revision, &row)
                .map_err(map_constraint)?;
            if changed == 0 {
                return Err(StoreError::RevisionConflict {
                    reference,
                    expected: node.revision,
                    actual: stored.revision,
                });
            }
            if revisioning == Revisioning::Bump {
                schema::insert_audit(&tx, &self.audit_table, stored.id, &row)
                    .map_err(map_constraint)?;
            }
            tx.commit()?;
            next
        };

        *node = next;
        debug!(reference = %reference, revision = node.revision, %action, ?revisioning, "node stored");

        let post = handler.post_update(node, &hooks);
        self.publish(node, action);
        Ok(post?)
    }

    /// Announces a committed change. The write is already durable, so a
    /// failure is only logged.
    fn publish(&self, node: &Node, action: ModelAction) {
        let written_at = match action {
            ModelAction::Create => node.created_at,
            _ => node.updated_at,
        };
        let event = ModelEvent::new(
            node.reference,
            action,
            node.node_type.clone(),
            node.revision,
            node.name.clone(),
        )
        .at(written_at);

        let sent = serde_json::to_string(&event)
            .map_err(StoreError::from)
            .and_then(|payload| {
                self.notifier
                    .notify(&self.event_channel, &payload)
                    .map_err(StoreError::from)
            });
        if let Err(e) = sent {
            warn!(reference = %node.reference, %action, "change event not published: {e}");
        }
    }
}

/// Whether an update appends a revision or rewrites the live row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Revisioning {
    Bump,
    InPlace,
}

/// `LIMIT` and `OFFSET` for a page, fetching one extra row to detect a next
/// page. SQLite integers are signed, so both saturate at `i64::MAX`.
fn page_window(offset: usize, limit: usize) -> [rusqlite::types::Value; 2] {
    let fetch = i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1);
    let skip = i64::try_from(offset).unwrap_or(i64::MAX);
    [fetch.into(), skip.into()]
}

/// Turns a slug uniqueness violation into a validation error.
fn map_constraint(error: StoreError) -> StoreError {
    match error {
        StoreError::Database(rusqlite::Error::SqliteFailure(failure, Some(message)))
            if failure.code == ErrorCode::ConstraintViolation && message.contains(".slug") =>
        {
            let mut errors = ValidationErrors::new();
            errors.add_error("slug", "Slug already used by another node");
            StoreError::ValidationFailed(errors)
        }
        other => other,
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
