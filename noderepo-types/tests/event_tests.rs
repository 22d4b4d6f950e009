use noderepo_types::{ModelAction, ModelEvent, NodeStatus, ProcessStatus, Reference};
use pretty_assertions::assert_eq;

// ── ModelEvent ───────────────────────────────────────────────────

#[test]
fn event_wire_keys() {
    let subject = Reference::new();
    let event = ModelEvent::new(subject, ModelAction::SoftDelete, "blog.post", 3, "Hello");
    let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

    assert_eq!(value["subject"], subject.to_string());
    assert_eq!(value["action"], "SoftDelete");
    assert_eq!(value["type"], "blog.post");
    assert_eq!(value["revision"], 3);
    assert_eq!(value["name"], "Hello");
    assert!(value["date"].is_string());
}

#[test]
fn event_decodes_from_payload() {
    let event = ModelEvent::new(Reference::new(), ModelAction::Create, "core.user", 1, "thomas");
    let decoded = ModelEvent::from_json(&event.to_json().unwrap()).unwrap();
    assert_eq!(decoded, event);
}

#[test]
fn event_decode_rejects_unknown_action() {
    let payload = format!(
        r#"{{"subject":"{}","action":"explode","type":"x","revision":1,"name":"n","date":"2024-01-01T00:00:00Z"}}"#,
        Reference::new()
    );
    assert!(ModelEvent::from_json(&payload).is_err());
}

#[test]
fn action_text_forms() {
    for action in [ModelAction::Create, ModelAction::Update, ModelAction::SoftDelete] {
        let parsed: ModelAction = action.to_string().parse().unwrap();
        assert_eq!(parsed, action);
    }
    assert_eq!(ModelAction::SoftDelete.to_string(), "SoftDelete");
    assert!("destroy".parse::<ModelAction>().is_err());
    assert!("soft_delete".parse::<ModelAction>().is_err());
}

#[test]
fn actions_use_pascal_case_on_the_wire() {
    for (action, text) in [
        (ModelAction::Create, "\"Create\""),
        (ModelAction::Update, "\"Update\""),
        (ModelAction::SoftDelete, "\"SoftDelete\""),
    ] {
        assert_eq!(serde_json::to_string(&action).unwrap(), text);
        assert_eq!(serde_json::from_str::<ModelAction>(text).unwrap(), action);
    }
}

#[test]
fn event_can_carry_the_write_time() {
    let written = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let event = ModelEvent::new(Reference::new(), ModelAction::Update, "blog.post", 2, "x").at(written);
    let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

    assert_eq!(event.timestamp, written);
    assert_eq!(value["date"], "2024-05-01T10:00:00Z");
}

// ── Status codes ─────────────────────────────────────────────────

#[test]
fn node_status_codes() {
    assert_eq!(NodeStatus::default(), NodeStatus::Draft);
    assert_eq!(NodeStatus::Draft.code(), 1);
    assert_eq!(NodeStatus::Completed.code(), 2);
    assert_eq!(NodeStatus::Validated.code(), 3);
    assert!(NodeStatus::from_code(0).is_err());
    assert!(NodeStatus::from_code(4).is_err());
}

#[test]
fn node_status_serde_rejects_out_of_range() {
    assert_eq!(serde_json::from_str::<NodeStatus>("2").unwrap(), NodeStatus::Completed);
    assert!(serde_json::from_str::<NodeStatus>("9").is_err());
}

#[test]
fn process_status_codes() {
    assert_eq!(ProcessStatus::default(), ProcessStatus::Init);
    assert_eq!(ProcessStatus::Error.code(), -1);
    assert_eq!(ProcessStatus::from_code(2).unwrap(), ProcessStatus::Update);
    assert_eq!(serde_json::to_string(&ProcessStatus::Done).unwrap(), "3");
}
