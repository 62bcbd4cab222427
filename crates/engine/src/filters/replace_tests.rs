// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{data_text, message_balance, rig_with};
use serde_json::json;
use sluice_core::Message;

#[test]
fn replace_message_substitutes_head_and_body() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.replace_message(None, |message| {
                let mut response = message.clone();
                response.body = "ok".into();
                response.head = Some(json!({"status": 200}));
                Ok(Replacement::Message(response))
            });
        });
    });
    rig.input_message(Some(json!({"path": "/a"})), "request");
    assert_eq!(rig.text(), "ok");
    let events = rig.events();
    assert_eq!(message_balance(&events), (1, 1));
    match &events[0] {
        Event::MessageStart(start) => {
            assert_eq!(start.head().and_then(|h| h.get("status")), Some(&json!(200)));
        }
        other => panic!("expected MessageStart, got {}", other.name()),
    }
}

#[test]
fn replace_data_maps_each_chunk() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.replace_data(|data| {
                let upper = data.to_string_lossy().to_uppercase();
                Ok(Replacement::Event(Event::data(upper.as_str())))
            });
        });
    });
    rig.input(Event::data("abc"));
    rig.input(Event::data("def"));
    assert_eq!(rig.text(), "ABCDEF");
}

#[test]
fn drop_replacement_swallows_the_trigger() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.replace_message_start(|_| Ok(Replacement::Drop));
        });
    });
    rig.input_message(None, "body");
    // The start frame is gone; data and end still pass.
    assert_eq!(message_balance(&rig.events()), (0, 1));
    assert_eq!(rig.text(), "body");
}

#[test]
fn replacement_may_expand_to_multiple_messages() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.replace_message(None, |_| {
                Ok(Replacement::Messages(vec![
                    Message::new(None, "one"),
                    Message::new(None, "two"),
                ]))
            });
        });
    });
    rig.input_message(None, "in");
    assert_eq!(message_balance(&rig.events()), (2, 2));
    assert_eq!(rig.text(), "onetwo");
}

#[test]
fn replace_message_body_keeps_the_message_boundaries() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.replace_message_body(None, |body| {
                let reversed: String = body.to_string_lossy().chars().rev().collect();
                Ok(Replacement::Event(Event::data(reversed.as_str())))
            });
        });
    });
    rig.input_message(Some(json!({"keep": true})), "abc");
    let events = rig.events();
    assert_eq!(message_balance(&events), (1, 1));
    assert_eq!(data_text(&events), "cba");
    match &events[0] {
        Event::MessageStart(start) => {
            assert_eq!(start.head().and_then(|h| h.get("keep")), Some(&json!(true)));
        }
        other => panic!("expected MessageStart, got {}", other.name()),
    }
}

#[test]
fn replace_stream_end_substitutes_the_terminal() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            // Normalize transport failures into a clean end-of-stream.
            d.replace_stream_end(|end| {
                if end.is_error() {
                    Ok(Replacement::Event(Event::stream_end(ErrorKind::NoError)))
                } else {
                    Ok(Replacement::Event(Event::StreamEnd(end.clone())))
                }
            });
        });
    });
    rig.input_message(None, "body");
    rig.input(Event::stream_end(ErrorKind::ConnectionReset));

    let events = rig.events();
    match events.last() {
        Some(Event::StreamEnd(end)) => assert_eq!(end.error(), &ErrorKind::NoError),
        other => panic!("expected StreamEnd, got {other:?}"),
    }
    assert_eq!(data_text(&events), "body");
}

#[test]
fn identity_replacement_round_trips() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.replace_message(None, |message| Ok(Replacement::Message(message.clone())));
        });
    });
    rig.input_message(Some(json!({"k": "v"})), "same");
    assert_eq!(rig.text(), "same");
    assert_eq!(message_balance(&rig.events()), (1, 1));
}
