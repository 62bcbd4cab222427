// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn message_start_head_is_shared_between_clones() {
    let start = MessageStart::new(json!({"path": "/a"}));
    let copy = start.clone();
    assert_eq!(start.head(), copy.head());
    assert_eq!(copy.head().and_then(|h| h.get("path")), Some(&json!("/a")));
}

#[test]
fn message_end_payload() {
    let end = MessageEnd::with_payload(None, json!(42));
    assert_eq!(end.payload(), Some(&json!(42)));
    assert_eq!(end.tail(), None);
}

#[test]
fn stream_end_default_is_no_error() {
    let end = StreamEnd::no_error();
    assert!(!end.is_error());
    assert_eq!(end.error(), &ErrorKind::NoError);
}

#[test]
fn stream_end_runtime_carries_message() {
    let end = StreamEnd::new(ErrorKind::Runtime("boom".into()));
    assert!(end.is_error());
    match end.error() {
        ErrorKind::Runtime(msg) => assert_eq!(msg, "boom"),
        other => panic!("unexpected error kind: {other}"),
    }
}

#[parameterized(
    no_error = { ErrorKind::NoError, "no-error" },
    replay = { ErrorKind::Replay, "replay" },
    protocol = { ErrorKind::ProtocolError, "protocol-error" },
    runtime = { ErrorKind::Runtime("x".into()), "runtime-error" },
)]
fn error_kind_display(kind: ErrorKind, expected: &str) {
    assert_eq!(kind.to_string(), expected);
}

#[test]
fn error_kind_serde_round_trip() {
    let kind = ErrorKind::Runtime("bad callback".into());
    let json = serde_json::to_string(&kind).unwrap();
    let parsed: ErrorKind = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, kind);
}

#[test]
fn event_names() {
    assert_eq!(Event::data("x").name(), "Data");
    assert_eq!(Event::stream_end(ErrorKind::NoError).name(), "StreamEnd");
    assert_eq!(Event::from(MessageStart::empty()).name(), "MessageStart");
    assert_eq!(Event::from(MessageEnd::empty()).name(), "MessageEnd");
}
