//! Table layout and row mapping.

use chrono::{DateTime, Utc};
use noderepo_model::Node;
use noderepo_types::{NodeStatus, Reference};
use rusqlite::{Connection, Row, ToSql, Transaction, params};

use crate::{StoreError, StoreResult};

/// Columns shared by the live and audit tables, in `SELECT` order.
pub(crate) const NODE_COLUMNS: &str = "id, reference, type, name, slug, revision, status, weight, \
     enabled, deleted, created_at, created_by, updated_at, updated_by, set_reference, \
     parent_reference, parents, source, data, meta";

/// Column definitions shared by both tables (everything but the keys).
const COLUMN_DEFS: &str = "
    reference TEXT NOT NULL,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    revision INTEGER NOT NULL,
    status INTEGER NOT NULL,
    weight INTEGER NOT NULL,
    enabled INTEGER NOT NULL,
    deleted INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    created_by TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    updated_by TEXT NOT NULL,
    set_reference TEXT NOT NULL,
    parent_reference TEXT NOT NULL,
    parents TEXT NOT NULL,
    source TEXT NOT NULL,
    data TEXT NOT NULL,
    meta TEXT NOT NULL";

pub(crate) fn init_schema(conn: &Connection, nodes: &str, audit: &str) -> StoreResult<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {nodes} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {COLUMN_DEFS},
            UNIQUE(reference),
            UNIQUE(parent_reference, slug, revision)
        );

        CREATE INDEX IF NOT EXISTS {nodes}_type_idx ON {nodes} (type, deleted);

        CREATE TABLE IF NOT EXISTS {audit} (
            audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id INTEGER NOT NULL,
            {COLUMN_DEFS},
            UNIQUE(reference, revision)
        );
        "
    ))?;
    Ok(())
}

/// Node fields flattened to SQL values, without the id.
pub(crate) struct NodeRow {
    reference: String,
    node_type: String,
    name: String,
    slug: String,
    revision: i64,
    status: i64,
    weight: i64,
    enabled: bool,
    deleted: bool,
    created_at: i64,
    created_by: String,
    updated_at: i64,
    updated_by: String,
    set: String,
    parent: String,
    parents: String,
    source: String,
    data: String,
    meta: String,
}

impl NodeRow {
    pub(crate) fn from_node(node: &Node) -> StoreResult<Self> {
        Ok(Self {
            reference: node.reference.to_string(),
            node_type: node.node_type.clone(),
            name: node.name.clone(),
            slug: node.slug.clone(),
            revision: i64::from(node.revision),
            status: node.status.code(),
            weight: i64::from(node.weight),
            enabled: node.enabled,
            deleted: node.deleted,
            created_at: node.created_at.timestamp_millis(),
            created_by: node.created_by.to_string(),
            updated_at: node.updated_at.timestamp_millis(),
            updated_by: node.updated_by.to_string(),
            set: node.set.to_string(),
            parent: node.parent.to_string(),
            parents: serde_json::to_string(&node.parents)?,
            source: node.source.to_string(),
            data: serde_json::to_string(&node.data)?,
            meta: serde_json::to_string(&node.meta)?,
        })
    }

    fn values(&self) -> [&dyn ToSql; 19] {
        [
            &self.reference,
            &self.node_type,
            &self.name,
            &self.slug,
            &self.revision,
            &self.status,
            &self.weight,
            &self.enabled,
            &self.deleted,
            &self.created_at,
            &self.created_by,
            &self.updated_at,
            &self.updated_by,
            &self.set,
            &self.parent,
            &self.parents,
            &self.source,
            &self.data,
            &self.meta,
        ]
    }
}

const INSERT_COLUMNS: &str = "reference, type, name, slug, revision, status, weight, enabled, \
     deleted, created_at, created_by, updated_at, updated_by, set_reference, parent_reference, \
     parents, source, data, meta";

const INSERT_MARKS: &str = "?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?";

/// Inserts a new live row and returns its id.
pub(crate) fn insert_live(tx: &Transaction<'_>, table: &str, row: &NodeRow) -> StoreResult<i64> {
    tx.execute(
        &format!("INSERT INTO {table} ({INSERT_COLUMNS}) VALUES ({INSERT_MARKS})"),
        &row.values()[..],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Appends a revision to the audit table.
pub(crate) fn insert_audit(
    tx: &Transaction<'_>,
    table: &str,
    id: i64,
    row: &NodeRow,
) -> StoreResult<()> {
    let mut values: Vec<&dyn ToSql> = vec![&id];
    values.extend(row.values());
    tx.execute(
        &format!("INSERT INTO {table} (id, {INSERT_COLUMNS}) VALUES (?, {INSERT_MARKS})"),
        &values[..],
    )?;
    Ok(())
}

/// Replaces the live row `id` if it still holds `expected_revision`.
/// Returns the number of rows changed (0 or 1).
pub(crate) fn update_live(
    tx: &Transaction<'_>,
    table: &str,
    id: i64,
    expected_revision: u32,
    row: &NodeRow,
) -> StoreResult<usize> {
    let assignments = INSERT_COLUMNS
        .split(',')
        .map(|c| format!("{} = ?", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    let expected = i64::from(expected_revision);
    let mut values: Vec<&dyn ToSql> = row.values().to_vec();
    values.push(&id);
    values.push(&expected);

    let changed = tx.execute(
        &format!("UPDATE {table} SET {assignments} WHERE id = ? AND revision = ?"),
        &values[..],
    )?;
    Ok(changed)
}

/// The stored state the update path checks against.
pub(crate) struct StoredHead {
    pub id: i64,
    pub node_type: String,
    pub revision: u32,
    pub deleted: bool,
    pub created_at: i64,
    pub parent: Reference,
    pub parents: Vec<Reference>,
}

pub(crate) fn read_head(
    tx: &Transaction<'_>,
    table: &str,
    reference: &Reference,
) -> StoreResult<Option<StoredHead>> {
    let mut stmt = tx.prepare_cached(&format!(
        "SELECT id, type, revision, deleted, created_at, parent_reference, parents \
         FROM {table} WHERE reference = ?"
    ))?;
    let mut rows = stmt.query(params![reference.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let revision: i64 = row.get(2)?;
    let parent: String = row.get(5)?;
    let parents: String = row.get(6)?;
    Ok(Some(StoredHead {
        id: row.get(0)?,
        node_type: row.get(1)?,
        revision: to_revision(revision)?,
        deleted: row.get(3)?,
        created_at: row.get(4)?,
        parent: parse_reference(&parent)?,
        parents: serde_json::from_str(&parents)?,
    }))
}

/// Ancestors of a child placed under `parent`, root first.
///
/// `None` when `parent` has no live row.
pub(crate) fn lineage(
    tx: &Transaction<'_>,
    table: &str,
    parent: &Reference,
) -> StoreResult<Option<Vec<Reference>>> {
    if parent.is_empty() {
        return Ok(Some(Vec::new()));
    }
    Ok(read_head(tx, table, parent)?.map(|head| {
        let mut parents = head.parents;
        parents.push(*parent);
        parents
    }))
}

/// Re-parents row `id` and rewrites the `parents` path of it and every
/// descendant. Revisions are left untouched.
pub(crate) fn move_subtree(
    tx: &Transaction<'_>,
    table: &str,
    id: i64,
    parent: &Reference,
    parents: &[Reference],
) -> StoreResult<usize> {
    tx.execute(
        &format!("UPDATE {table} SET parent_reference = ? WHERE id = ?"),
        params![parent.to_string(), id],
    )?;

    let changed = tx.execute(
        &format!(
            "WITH RECURSIVE tree(reference, parents) AS (
                SELECT reference, ?1 FROM {table} WHERE id = ?2
                UNION ALL
                SELECT child.reference, json_insert(tree.parents, '$[#]', tree.reference)
                FROM {table} AS child JOIN tree ON child.parent_reference = tree.reference
            )
            UPDATE {table}
            SET parents = (SELECT tree.parents FROM tree WHERE tree.reference = {table}.reference)
            WHERE reference IN (SELECT reference FROM tree)"
        ),
        params![serde_json::to_string(parents)?, id],
    )?;
    Ok(changed)
}

/// A row as read from either table, before payload shaping.
pub(crate) struct RawNode {
    id: i64,
    reference: String,
    node_type: String,
    name: String,
    slug: String,
    revision: i64,
    status: i64,
    weight: i64,
    enabled: bool,
    deleted: bool,
    created_at: i64,
    created_by: String,
    updated_at: i64,
    updated_by: String,
    set: String,
    parent: String,
    parents: String,
    source: String,
    data: String,
    meta: String,
}

impl RawNode {
    /// Maps a row selected with [`NODE_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            reference: row.get(1)?,
            node_type: row.get(2)?,
            name: row.get(3)?,
            slug: row.get(4)?,
            revision: row.get(5)?,
            status: row.get(6)?,
            weight: row.get(7)?,
            enabled: row.get(8)?,
            deleted: row.get(9)?,
            created_at: row.get(10)?,
            created_by: row.get(11)?,
            updated_at: row.get(12)?,
            updated_by: row.get(13)?,
            set: row.get(14)?,
            parent: row.get(15)?,
            parents: row.get(16)?,
            source: row.get(17)?,
            data: row.get(18)?,
            meta: row.get(19)?,
        })
    }

    pub(crate) fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Builds the node with its payloads still as stored.
    pub(crate) fn into_node(self) -> StoreResult<Node> {
        let mut node = Node::new();
        node.set_id(self.id);
        node.reference = parse_reference(&self.reference)?;
        node.node_type = self.node_type;
        node.name = self.name;
        node.slug = self.slug;
        node.revision = to_revision(self.revision)?;
        node.status = NodeStatus::from_code(self.status)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        node.weight = i32::try_from(self.weight)
            .map_err(|_| StoreError::InvalidData(format!("weight out of range: {}", self.weight)))?;
        node.enabled = self.enabled;
        node.deleted = self.deleted;
        node.created_at = from_millis(self.created_at)?;
        node.created_by = parse_reference(&self.created_by)?;
        node.updated_at = from_millis(self.updated_at)?;
        node.updated_by = parse_reference(&self.updated_by)?;
        node.set = parse_reference(&self.set)?;
        node.parent = parse_reference(&self.parent)?;
        node.parents = serde_json::from_str(&self.parents)?;
        node.source = parse_reference(&self.source)?;
        node.data = serde_json::from_str(&self.data)?;
        node.meta = serde_json::from_str(&self.meta)?;
        Ok(node)
    }
}

fn parse_reference(raw: &str) -> StoreResult<Reference> {
    Reference::parse(raw).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn to_revision(raw: i64) -> StoreResult<u32> {
    u32::try_from(raw).map_err(|_| StoreError::InvalidData(format!("revision out of range: {raw}")))
}

pub(crate) fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {millis}")))
}

/// Drops sub-millisecond precision so stored and in-memory values compare equal.
pub(crate) fn truncate_millis(at: DateTime<Utc>) -> StoreResult<DateTime<Utc>> {
    from_millis(at.timestamp_millis())
}
