//! Round-trip tests for a checked-in generated module
//!
//! `fixtures/session/session_json.rs` is compiled into this test crate next to its record, so these tests exercise
//! the exact impl shape the generator writes.

#[path = "fixtures/session/model.rs"]
mod model;

use std::time::Duration;

use model::Session;

fn session() -> Session {
    Session {
        id: 7,
        user_name: "ada".to_string(),
        ttl: Duration::from_secs(90),
    }
}

#[test]
fn test_encode_adds_aliased_key() {
    let json = serde_json::to_string(&session()).unwrap();
    assert_eq!(json, r#"{"id":7,"userName":"ada","ttlSecs":90}"#);
}

#[test]
fn test_decode_assigns_aliased_field() {
    let decoded: Session = serde_json::from_str(r#"{"ttlSecs":90,"userName":"ada","id":7}"#).unwrap();
    assert_eq!(decoded, session());
}

#[test]
fn test_round_trip() {
    let value = serde_json::to_value(session()).unwrap();
    assert_eq!(value["ttlSecs"], 90);
    assert!(value.get("ttl").is_none());
    let back: Session = serde_json::from_value(value).unwrap();
    assert_eq!(back, session());
}

#[test]
fn test_missing_alias_key_is_an_error() {
    let err = serde_json::from_str::<Session>(r#"{"id":7,"userName":"ada"}"#).unwrap_err();
    assert!(err.to_string().contains("ttlSecs"), "{err}");
}
