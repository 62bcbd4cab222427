// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::filter::Settle;
use crate::test_support::{message_balance, rig_with};
use parking_lot::Mutex;
use serde_json::json;
use sluice_core::{ErrorKind, Event};
use std::sync::Arc;

#[test]
fn handle_message_observes_without_altering_the_stream() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            let seen3 = seen2.clone();
            d.handle_message(None, move |message| {
                seen3.lock().push(message.body.to_string_lossy());
                Ok(Settle::Done)
            });
        });
    });
    rig.input_message(Some(json!({"path": "/a"})), "hello");
    assert_eq!(seen.lock().as_slice(), ["hello"]);
    // Observationally identity.
    assert_eq!(rig.text(), "hello");
    assert_eq!(message_balance(&rig.events()), (1, 1));
}

#[test]
fn size_limit_truncates_the_observed_body() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            let seen3 = seen2.clone();
            d.handle_message(Some(4), move |message| {
                seen3.lock().push(message.body.to_string_lossy());
                Ok(Settle::Done)
            });
        });
    });
    rig.input_message(None, "0123456789");
    // The callback sees a truncated body; the stream itself is untouched.
    assert_eq!(seen.lock().as_slice(), ["0123"]);
    assert_eq!(rig.text(), "0123456789");
}

#[test]
fn handle_stream_start_fires_once() {
    let count = Arc::new(Mutex::new(0usize));
    let count2 = count.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            let count3 = count2.clone();
            d.handle_stream_start(move |_| {
                *count3.lock() += 1;
                Ok(Settle::Done)
            });
        });
    });
    rig.input(Event::data("a"));
    rig.input(Event::data("b"));
    assert_eq!(*count.lock(), 1);
    assert_eq!(rig.text(), "ab");
}

#[test]
fn handle_stream_end_sees_the_error_kind() {
    let seen = Arc::new(Mutex::new(None));
    let seen2 = seen.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            let seen3 = seen2.clone();
            d.handle_stream_end(move |end| {
                *seen3.lock() = Some(end.error().clone());
                Ok(Settle::Done)
            });
        });
    });
    rig.input(Event::stream_end(ErrorKind::ConnectionReset));
    assert_eq!(*seen.lock(), Some(ErrorKind::ConnectionReset));
}

#[test]
fn handle_message_body_sees_only_the_accumulated_body() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            let seen3 = seen2.clone();
            d.handle_message_body(None, move |body| {
                seen3.lock().push(body.to_string_lossy());
                Ok(Settle::Done)
            });
        });
    });
    rig.input(Event::from(sluice_core::MessageStart::empty()));
    rig.input(Event::data("ab"));
    rig.input(Event::data("cd"));
    rig.input(Event::from(sluice_core::MessageEnd::empty()));
    assert_eq!(seen.lock().as_slice(), ["abcd"]);
    assert_eq!(rig.text(), "abcd");
}

#[test]
fn handle_event_observes_every_frame() {
    let count = Arc::new(Mutex::new(0usize));
    let count2 = count.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            let count3 = count2.clone();
            d.handle_event(move |_| {
                *count3.lock() += 1;
                Ok(Settle::Done)
            });
        });
    });
    rig.input_message(None, "x");
    assert_eq!(*count.lock(), 3);
}

#[test]
fn callback_error_becomes_a_runtime_stream_end() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.handle_data(|_| Err("no thanks".into()));
        });
    });
    rig.input(Event::data("x"));
    let events = rig.events();
    match &events[0] {
        Event::StreamEnd(end) => {
            assert_eq!(end.error(), &ErrorKind::Runtime("no thanks".into()));
        }
        other => panic!("expected StreamEnd, got {}", other.name()),
    }
}
