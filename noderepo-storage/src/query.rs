//! Filter builder over the fixed node column set.
//!
//! Queries only ever reference known columns; user input reaches SQL as
//! bound parameters. Invalid column names, orderings or JSON paths are
//! recorded while building and reported by [`NodeQuery::to_sql`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use noderepo_types::{NodeStatus, Reference};
use rusqlite::types::Value as SqlValue;

use crate::{StoreError, StoreResult};

/// A filterable, sortable node column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Reference,
    Type,
    Name,
    Slug,
    Revision,
    Status,
    Weight,
    Enabled,
    Deleted,
    CreatedAt,
    CreatedBy,
    UpdatedAt,
    UpdatedBy,
    Set,
    Parent,
    Source,
}

impl Column {
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Reference => "reference",
            Self::Type => "type",
            Self::Name => "name",
            Self::Slug => "slug",
            Self::Revision => "revision",
            Self::Status => "status",
            Self::Weight => "weight",
            Self::Enabled => "enabled",
            Self::Deleted => "deleted",
            Self::CreatedAt => "created_at",
            Self::CreatedBy => "created_by",
            Self::UpdatedAt => "updated_at",
            Self::UpdatedBy => "updated_by",
            Self::Set => "set_reference",
            Self::Parent => "parent_reference",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for Column {
    type Err = StoreError;

    /// Accepts column names and the JSON names (`uuid`, `parent_uuid`, `set_uuid`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let column = match s.trim() {
            "id" => Self::Id,
            "reference" | "uuid" => Self::Reference,
            "type" => Self::Type,
            "name" => Self::Name,
            "slug" => Self::Slug,
            "revision" => Self::Revision,
            "status" => Self::Status,
            "weight" => Self::Weight,
            "enabled" => Self::Enabled,
            "deleted" => Self::Deleted,
            "created_at" => Self::CreatedAt,
            "created_by" => Self::CreatedBy,
            "updated_at" => Self::UpdatedAt,
            "updated_by" => Self::UpdatedBy,
            "set_reference" | "set_uuid" => Self::Set,
            "parent_reference" | "parent_uuid" => Self::Parent,
            "source" => Self::Source,
            other => return Err(StoreError::InvalidQuery(format!("unknown column {other:?}"))),
        };
        Ok(column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(StoreError::InvalidQuery(format!("unknown direction {other:?}"))),
        }
    }
}

/// A value compared against a column or payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Reference(Reference),
    Status(NodeStatus),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    fn to_sql(&self) -> SqlValue {
        match self {
            Self::Text(s) => SqlValue::Text(s.clone()),
            Self::Integer(i) => SqlValue::Integer(*i),
            Self::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Self::Reference(r) => SqlValue::Text(r.to_string()),
            Self::Status(s) => SqlValue::Integer(s.code()),
            Self::Timestamp(t) => SqlValue::Integer(t.timestamp_millis()),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Reference> for FilterValue {
    fn from(value: Reference) -> Self {
        Self::Reference(value)
    }
}

impl From<NodeStatus> for FilterValue {
    fn from(value: NodeStatus) -> Self {
        Self::Status(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Data,
    Meta,
}

impl Payload {
    const fn column(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq(Column, FilterValue),
    In(Column, Vec<FilterValue>),
    JsonEq(Payload, String, FilterValue),
    JsonContains(Payload, String, FilterValue),
}

/// Rendered query: `WHERE` and `ORDER BY` bodies plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParts {
    pub where_clause: String,
    pub order_clause: String,
    pub params: Vec<SqlValue>,
}

/// Predicates and ordering for `find_by`.
///
/// All predicates are combined with `AND`. Without an explicit ordering
/// rows come back by ascending internal id (insertion order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeQuery {
    predicates: Vec<Predicate>,
    order: Vec<(Column, SortDirection)>,
    errors: Vec<String>,
}

impl NodeQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches every live row of `node_type`.
    #[must_use]
    pub fn of_type(node_type: &str) -> Self {
        Self::new().where_eq(Column::Type, node_type)
    }

    #[must_use]
    pub fn where_eq(mut self, column: Column, value: impl Into<FilterValue>) -> Self {
        self.predicates.push(Predicate::Eq(column, value.into()));
        self
    }

    /// Set membership. An empty set matches nothing.
    #[must_use]
    pub fn where_in<V: Into<FilterValue>>(
        mut self,
        column: Column,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.predicates.push(Predicate::In(column, values));
        self
    }

    /// Equality on a column given by name, e.g. from a search form.
    #[must_use]
    pub fn filter(self, column: &str, value: impl Into<FilterValue>) -> Self {
        match column.parse::<Column>() {
            Ok(column) => self.where_eq(column, value),
            Err(e) => self.with_error(e),
        }
    }

    /// Equality on a `data` sub-field, `path` being dot separated (`author.name`).
    #[must_use]
    pub fn data_eq(self, path: &str, value: impl Into<FilterValue>) -> Self {
        self.json_predicate(path, |p| Predicate::JsonEq(Payload::Data, p, value.into()))
    }

    #[must_use]
    pub fn meta_eq(self, path: &str, value: impl Into<FilterValue>) -> Self {
        self.json_predicate(path, |p| Predicate::JsonEq(Payload::Meta, p, value.into()))
    }

    /// Matches rows whose `data` array at `path` contains `value`.
    #[must_use]
    pub fn data_contains(self, path: &str, value: impl Into<FilterValue>) -> Self {
        self.json_predicate(path, |p| {
            Predicate::JsonContains(Payload::Data, p, value.into())
        })
    }

    #[must_use]
    pub fn meta_contains(self, path: &str, value: impl Into<FilterValue>) -> Self {
        self.json_predicate(path, |p| {
            Predicate::JsonContains(Payload::Meta, p, value.into())
        })
    }

    #[must_use]
    pub fn order_by(mut self, column: Column, direction: SortDirection) -> Self {
        self.order.push((column, direction));
        self
    }

    /// Parses `"updated_at,ASC"`, `"created_at DESC"` or a bare column name.
    #[must_use]
    pub fn order_by_clause(self, clause: &str) -> Self {
        match parse_order(clause) {
            Ok((column, direction)) => self.order_by(column, direction),
            Err(e) => self.with_error(e),
        }
    }

    pub fn to_sql(&self) -> StoreResult<SqlParts> {
        if !self.errors.is_empty() {
            return Err(StoreError::InvalidQuery(self.errors.join("; ")));
        }

        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::new();

        for predicate in &self.predicates {
            match predicate {
                Predicate::Eq(column, value) => {
                    clauses.push(format!("{} = ?", column.sql_name()));
                    params.push(value.to_sql());
                }
                Predicate::In(_, values) if values.is_empty() => clauses.push("0".to_string()),
                Predicate::In(column, values) => {
                    let marks = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({marks})", column.sql_name()));
                    params.extend(values.iter().map(FilterValue::to_sql));
                }
                Predicate::JsonEq(payload, path, value) => {
                    clauses.push(format!("json_extract({}, ?) = ?", payload.column()));
                    params.push(SqlValue::Text(path.clone()));
                    params.push(value.to_sql());
                }
                Predicate::JsonContains(payload, path, value) => {
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM json_each({}, ?) AS item WHERE item.value = ?)",
                        payload.column()
                    ));
                    params.push(SqlValue::Text(path.clone()));
                    params.push(value.to_sql());
                }
            }
        }

        let where_clause = if clauses.is_empty() {
            "1".to_string()
        } else {
            clauses.join(" AND ")
        };

        let order_clause = if self.order.is_empty() {
            "id ASC".to_string()
        } else {
            self.order
                .iter()
                .map(|(column, direction)| format!("{} {}", column.sql_name(), direction.sql()))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Ok(SqlParts {
            where_clause,
            order_clause,
            params,
        })
    }

    fn json_predicate(self, path: &str, build: impl FnOnce(String) -> Predicate) -> Self {
        match json_path(path) {
            Ok(path) => {
                let mut query = self;
                query.predicates.push(build(path));
                query
            }
            Err(e) => self.with_error(e),
        }
    }

    fn with_error(mut self, error: StoreError) -> Self {
        self.errors.push(error.to_string());
        self
    }
}

fn parse_order(clause: &str) -> StoreResult<(Column, SortDirection)> {
    let mut parts = clause
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());

    let column = parts
        .next()
        .ok_or_else(|| StoreError::InvalidQuery("empty ordering".to_string()))?
        .parse()?;
    let direction = match parts.next() {
        Some(direction) => direction.parse()?,
        None => SortDirection::Asc,
    };
    if let Some(extra) = parts.next() {
        return Err(StoreError::InvalidQuery(format!(
            "unexpected {extra:?} in ordering {clause:?}"
        )));
    }
    Ok((column, direction))
}

/// Converts `a.b_c` into the SQLite JSON path `$.a.b_c`.
fn json_path(path: &str) -> StoreResult<String> {
    let valid = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(format!("$.{path}"))
    } else {
        Err(StoreError::InvalidQuery(format!("invalid payload path {path:?}")))
    }
}
