use serde_json::json;

use crate::test::*;
use crate::{Caller, Error, ProjectStatus};

fn as_user(who: &str) -> Caller {
    Caller::User(name(who))
}

#[test]
fn test_standard_registry_lists_every_action() {
    let (engine, _) = setup();
    let names: Vec<&str> = engine.actions().collect();
    assert_eq!(names.len(), 16);
    for action in ["newaccount", "openfunding", "donate", "unpledge", "rmvproject"] {
        assert!(names.contains(&action), "{action}");
    }
}

#[test]
fn test_dispatch_runs_a_full_campaign() {
    let (mut engine, _) = setup();
    fund(&mut engine, "alice", "100.0000");
    fund(&mut engine, "bob", "100.0000");

    engine
        .dispatch(
            as_user("alice"),
            "newproject",
            json!({
                "project": "kiln",
                "category": "apps",
                "creator": "alice",
                "title": "Solar Kiln",
                "description": "A community kiln",
                "uri": "https://example.org/kiln",
                "requested": "30.0000 TLOS"
            }),
        )
        .unwrap();
    engine
        .dispatch(
            as_user("alice"),
            "addtier",
            json!({
                "project": "kiln",
                "creator": "alice",
                "tier": "mug",
                "price": "10.0000 TLOS",
                "description": "A kiln-fired mug",
                "stock": 5
            }),
        )
        .unwrap();
    engine
        .dispatch(
            as_user("alice"),
            "openfunding",
            json!({"project": "kiln", "creator": "alice", "length_in_days": 14}),
        )
        .unwrap();
    engine
        .dispatch(
            as_user("bob"),
            "pledge",
            json!({"project": "kiln", "tier": "mug", "contributor": "bob"}),
        )
        .unwrap();
    let receipt = engine
        .dispatch(
            as_user("bob"),
            "donate",
            json!({"project": "kiln", "contributor": "bob", "amount": "20.0000 TLOS"}),
        )
        .unwrap();

    assert!(receipt.events.iter().any(|e| e.topic() == "project_funded"));
    let project = engine.project(&name("kiln")).unwrap();
    assert_eq!(project.status, ProjectStatus::Funded);
    assert_eq!(project.received, tlos("30.0000"));
    check(&engine);
}

#[test]
fn test_dispatch_unknown_action_is_unsupported() {
    let (mut engine, _) = setup();
    assert!(matches!(
        engine.dispatch(as_user("alice"), "selfdestruct", json!({})),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn test_dispatch_malformed_payload_is_validation_error() {
    let (mut engine, _) = setup();
    let err = engine
        .dispatch(as_user("alice"), "newaccount", json!({"acount": "alice"}))
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");

    let err = engine
        .dispatch(as_user("alice"), "newaccount", json!({"account": "Alice!"}))
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
    assert!(engine.account(&name("alice")).is_none());
}

#[test]
fn test_dispatch_enforces_authorization() {
    let (mut engine, _) = setup();
    let err = engine
        .dispatch(as_user("bob"), "addcategory", json!({"category": "hardware"}))
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));

    engine
        .dispatch(
            Caller::User(admin()),
            "addcategory",
            json!({"category": "hardware"}),
        )
        .unwrap();
    assert!(engine.is_valid_category(&name("hardware")));
}
