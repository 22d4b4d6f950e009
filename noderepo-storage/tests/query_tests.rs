mod common;

use common::{post, saved_post, store};
use noderepo_model::NodeStatus;
use noderepo_storage::{Column, NodeQuery, SortDirection, StoreError};
use pretty_assertions::assert_eq;
use rusqlite::types::Value as SqlValue;
use serde_json::json;

// ── Rendering ────────────────────────────────────────────────────

#[test]
fn empty_query_matches_everything_in_insertion_order() {
    let parts = NodeQuery::new().to_sql().unwrap();
    assert_eq!(parts.where_clause, "1");
    assert_eq!(parts.order_clause, "id ASC");
    assert!(parts.params.is_empty());
}

#[test]
fn predicates_are_bound_not_inlined() {
    let parts = NodeQuery::of_type("blog.post")
        .where_eq(Column::Status, NodeStatus::Validated)
        .where_eq(Column::Enabled, true)
        .data_eq("title", "x' OR 1=1 --")
        .order_by(Column::Weight, SortDirection::Desc)
        .to_sql()
        .unwrap();

    assert_eq!(
        parts.where_clause,
        "type = ? AND status = ? AND enabled = ? AND json_extract(data, ?) = ?"
    );
    assert_eq!(parts.order_clause, "weight DESC");
    assert_eq!(
        parts.params,
        vec![
            SqlValue::Text("blog.post".into()),
            SqlValue::Integer(3),
            SqlValue::Integer(1),
            SqlValue::Text("$.title".into()),
            SqlValue::Text("x' OR 1=1 --".into()),
        ]
    );
}

#[test]
fn where_in_renders_one_mark_per_value() {
    let parts = NodeQuery::new()
        .where_in(Column::Slug, ["a", "b", "c"])
        .to_sql()
        .unwrap();
    assert_eq!(parts.where_clause, "slug IN (?, ?, ?)");
    assert_eq!(parts.params.len(), 3);

    let empty: [&str; 0] = [];
    let parts = NodeQuery::new().where_in(Column::Slug, empty).to_sql().unwrap();
    assert_eq!(parts.where_clause, "0");
}

#[test]
fn named_filters_accept_json_names() {
    let parts = NodeQuery::new()
        .filter("parent_uuid", "x")
        .filter("set_reference", "y")
        .to_sql()
        .unwrap();
    assert_eq!(parts.where_clause, "parent_reference = ? AND set_reference = ?");
}

#[test]
fn ordering_clauses_parse() {
    let parts = NodeQuery::new()
        .order_by_clause("updated_at,ASC")
        .order_by_clause("created_at DESC")
        .order_by_clause("name")
        .to_sql()
        .unwrap();
    assert_eq!(parts.order_clause, "updated_at ASC, created_at DESC, name ASC");
}

// ── Invalid input ────────────────────────────────────────────────

#[test]
fn unknown_column_is_reported() {
    let err = NodeQuery::new().filter("password", "x").to_sql().unwrap_err();
    assert!(matches!(err, StoreError::InvalidQuery(msg) if msg.contains("password")));
}

#[test]
fn bad_ordering_is_reported() {
    for clause in ["", "name SIDEWAYS", "name ASC extra", "nope DESC"] {
        let result = NodeQuery::new().order_by_clause(clause).to_sql();
        assert!(
            matches!(result, Err(StoreError::InvalidQuery(_))),
            "{clause:?} should be rejected"
        );
    }
}

#[test]
fn bad_payload_path_is_reported() {
    for path in ["", "a..b", "a'); DROP TABLE x; --", "$.a"] {
        let result = NodeQuery::new().data_eq(path, 1).to_sql();
        assert!(
            matches!(result, Err(StoreError::InvalidQuery(_))),
            "{path:?} should be rejected"
        );
    }
}

#[test]
fn find_by_surfaces_query_errors() {
    let store = store();
    let err = store
        .find_by(&NodeQuery::new().filter("nope", 1), 0, 10)
        .unwrap_err();
    assert_eq!(err.http_status(), 500);
    assert!(matches!(err, StoreError::InvalidQuery(_)));
}

// ── Execution ────────────────────────────────────────────────────

#[test]
fn pagination_reports_neighbours() {
    let store = store();
    for i in 0..5 {
        saved_post(&store, &format!("Page {i}"));
    }
    let query = NodeQuery::of_type("blog.post");

    let first = store.find_by(&query, 0, 2).unwrap();
    assert_eq!(first.nodes.len(), 2);
    assert!(first.has_next);
    assert!(!first.has_previous());
    assert_eq!(first.nodes[0].name, "Page 0");

    let last = store.find_by(&query, 4, 2).unwrap();
    assert_eq!(last.nodes.len(), 1);
    assert!(!last.has_next);
    assert!(last.has_previous());
    assert_eq!(last.nodes[0].name, "Page 4");

    let exact = store.find_by(&query, 3, 2).unwrap();
    assert_eq!(exact.nodes.len(), 2);
    assert!(!exact.has_next);

    assert!(store.find_by(&query, 10, 2).unwrap().is_empty());
}

#[test]
fn unbounded_page_sizes_are_accepted() {
    let store = store();
    let node = saved_post(&store, "Only one");
    let query = NodeQuery::of_type("blog.post");

    for limit in [usize::MAX, i64::MAX as usize, i64::MAX as usize + 1] {
        let page = store.find_by(&query, 0, limit).unwrap();
        assert_eq!(page.nodes.len(), 1, "limit {limit}");
        assert!(!page.has_next);
        assert_eq!(page.limit, limit);
    }

    for offset in [usize::MAX, i64::MAX as usize] {
        let page = store.find_by(&query, offset, usize::MAX).unwrap();
        assert!(page.is_empty(), "offset {offset}");
        assert!(page.has_previous());
    }

    let history = store.find_revisions(&node.reference, 0, usize::MAX).unwrap();
    assert_eq!(history.nodes.len(), 1);
    assert!(store.find_revisions(&node.reference, usize::MAX, 1).unwrap().is_empty());
}

#[test]
fn payload_predicates_match() {
    let store = store();

    let mut rust = post(&store, "Rust");
    rust.data["tags"] = json!(["lang", "systems"]);
    store.save(&mut rust).unwrap();

    let mut go = post(&store, "Go");
    go.data["tags"] = json!(["lang"]);
    go.meta["format"] = json!("html");
    store.save(&mut go).unwrap();

    let by_title = store
        .find_one_by(&NodeQuery::new().data_eq("title", "Rust"))
        .unwrap()
        .unwrap();
    assert_eq!(by_title.reference, rust.reference);

    let systems = store
        .find_by(&NodeQuery::new().data_contains("tags", "systems"), 0, 10)
        .unwrap();
    assert_eq!(systems.nodes.len(), 1);
    assert_eq!(systems.nodes[0].reference, rust.reference);

    let lang = store
        .find_by(&NodeQuery::new().data_contains("tags", "lang"), 0, 10)
        .unwrap();
    assert_eq!(lang.nodes.len(), 2);

    let html = store
        .find_by(&NodeQuery::new().meta_eq("format", "html"), 0, 10)
        .unwrap();
    assert_eq!(html.nodes.len(), 1);
    assert_eq!(html.nodes[0].reference, go.reference);
}

#[test]
fn column_predicates_and_ordering() {
    let store = store();
    let mut a = post(&store, "A");
    a.weight = 2;
    store.save(&mut a).unwrap();
    let mut b = post(&store, "B");
    b.weight = 1;
    store.save(&mut b).unwrap();
    let mut c = post(&store, "C");
    c.weight = 3;
    c.enabled = false;
    store.save(&mut c).unwrap();

    let by_weight = store
        .find_by(
            &NodeQuery::of_type("blog.post").order_by(Column::Weight, SortDirection::Asc),
            0,
            10,
        )
        .unwrap();
    let names: Vec<_> = by_weight.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["B", "A", "C"]);

    let enabled = store
        .find_by(&NodeQuery::new().where_eq(Column::Enabled, true), 0, 10)
        .unwrap();
    assert_eq!(enabled.nodes.len(), 2);

    let picked = store
        .find_by(
            &NodeQuery::new()
                .where_in(Column::Reference, [a.reference, c.reference])
                .order_by_clause("name DESC"),
            0,
            10,
        )
        .unwrap();
    let names: Vec<_> = picked.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["C", "A"]);

    let none: Vec<&str> = Vec::new();
    assert!(
        store
            .find_by(&NodeQuery::new().where_in(Column::Slug, none), 0, 10)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn find_one_by_returns_none_without_match() {
    let store = store();
    saved_post(&store, "Only");
    assert_eq!(
        store.find_one_by(&NodeQuery::new().data_eq("title", "Other")).unwrap(),
        None
    );
}
