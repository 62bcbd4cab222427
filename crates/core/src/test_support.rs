// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::{ErrorKind, Event, MessageEnd, MessageStart};
use crate::message::Message;
use serde_json::Value;

// ── Event factory functions ─────────────────────────────────────────────────

/// Canonical event sequence for a message with the given head and body.
pub fn message_events(head: Option<Value>, body: &str) -> Vec<Event> {
    Message::new(head, body).events()
}

pub fn start(head: Value) -> Event {
    Event::MessageStart(MessageStart::new(head))
}

pub fn end() -> Event {
    Event::MessageEnd(MessageEnd::empty())
}

pub fn eos() -> Event {
    Event::stream_end(ErrorKind::NoError)
}

// ── Assertions ──────────────────────────────────────────────────────────────

/// Concatenated text of all `Data` frames in a slice of events.
pub fn data_text(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Data(d) => Some(d.to_string_lossy()),
            _ => None,
        })
        .collect()
}

/// Count `(MessageStart, MessageEnd)` frames in a slice of events.
pub fn message_balance(events: &[Event]) -> (usize, usize) {
    let starts = events.iter().filter(|e| matches!(e, Event::MessageStart(_))).count();
    let ends = events.iter().filter(|e| matches!(e, Event::MessageEnd(_))).count();
    (starts, ends)
}
