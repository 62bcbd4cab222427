// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn event_buffer_flush_preserves_order() {
    let mut buffer = EventBuffer::new();
    buffer.push(Event::data("a"));
    buffer.push(Event::data("b"));
    buffer.push(Event::data("c"));

    let mut seen = Vec::new();
    buffer.flush(|event| {
        if let Event::Data(data) = event {
            seen.push(data.to_string_lossy());
        }
    });
    assert_eq!(seen, vec!["a", "b", "c"]);
    assert!(buffer.is_empty());
}

#[test]
fn event_buffer_iterate_keeps_events() {
    let mut buffer = EventBuffer::new();
    buffer.push(Event::data("x"));
    buffer.push(Event::data("y"));

    let mut count = 0;
    buffer.iterate(|_| count += 1);
    assert_eq!(count, 2);
    assert_eq!(buffer.len(), 2);
}

#[test]
fn message_buffer_fifo() {
    let mut buffer = MessageBuffer::new();
    buffer.push(Message::new(None, "first"));
    buffer.push(Message::new(None, "second"));

    assert_eq!(buffer.shift().unwrap().body.to_string_lossy(), "first");
    assert_eq!(buffer.shift().unwrap().body.to_string_lossy(), "second");
    assert_eq!(buffer.shift(), None);
}

#[test]
fn clear_empties_buffers() {
    let mut events = EventBuffer::new();
    events.push(Event::data("a"));
    events.clear();
    assert!(events.is_empty());

    let mut messages = MessageBuffer::new();
    messages.push(Message::default());
    messages.clear();
    assert!(messages.is_empty());
}
