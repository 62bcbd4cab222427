// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn message_events_round_trip() {
    let msg = Message::new(Some(json!({"path": "/a"})), "hello");
    let events = msg.events();
    assert_eq!(events.len(), 3);

    let mut reader = MessageReader::new();
    let mut out = None;
    for event in &events {
        if let Some(m) = reader.read(event) {
            out = Some(m);
        }
    }
    assert_eq!(out, Some(msg));
}

#[test]
fn empty_body_message_has_two_events() {
    let msg = Message::new(None, Data::new());
    assert_eq!(msg.events().len(), 2);
}

#[test]
fn reader_ignores_frames_outside_message() {
    let mut reader = MessageReader::new();
    assert_eq!(reader.read(&Event::data("stray")), None);
    assert_eq!(reader.read(&Event::MessageEnd(MessageEnd::empty())), None);
    assert!(!reader.is_reading());
}

#[test]
fn reader_restarts_on_second_start() {
    let mut reader = MessageReader::new();
    reader.read(&Event::MessageStart(MessageStart::new(json!({"n": 1}))));
    reader.read(&Event::data("old"));
    reader.read(&Event::MessageStart(MessageStart::new(json!({"n": 2}))));
    reader.read(&Event::data("new"));
    let msg = reader.read(&Event::MessageEnd(MessageEnd::empty())).unwrap();
    assert_eq!(msg.head, Some(json!({"n": 2})));
    assert_eq!(msg.body.to_string_lossy(), "new");
}

#[test]
fn reader_drops_partial_message_on_stream_end() {
    let mut reader = MessageReader::new();
    reader.read(&Event::MessageStart(MessageStart::empty()));
    reader.read(&Event::stream_end(crate::ErrorKind::NoError));
    assert!(!reader.is_reading());
    assert_eq!(reader.read(&Event::MessageEnd(MessageEnd::empty())), None);
}

#[test]
fn message_body_concatenates_data_frames() {
    let mut reader = MessageReader::new();
    reader.read(&Event::MessageStart(MessageStart::empty()));
    reader.read(&Event::data("ab"));
    reader.read(&Event::data("cd"));
    let msg = reader.read(&Event::MessageEnd(MessageEnd::empty())).unwrap();
    assert_eq!(msg.body.to_string_lossy(), "abcd");
}
