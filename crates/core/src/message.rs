// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-message view over the event stream.
//!
//! `Message` is the aggregate handed to handle/replace callbacks;
//! `MessageReader` re-assembles one from a stream of frames.

use crate::data::Data;
use crate::event::{Event, MessageEnd, MessageStart};
use serde_json::Value;

/// A complete `MessageStart (Data)* MessageEnd` sequence, collapsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub head: Option<Value>,
    pub body: Data,
    pub tail: Option<Value>,
}

impl Message {
    pub fn new(head: Option<Value>, body: impl Into<Data>) -> Self {
        Self { head, body: body.into(), tail: None }
    }

    /// Expand back into the canonical event sequence.
    pub fn events(&self) -> Vec<Event> {
        let start = match &self.head {
            Some(head) => MessageStart::new(head.clone()),
            None => MessageStart::empty(),
        };
        let end = match &self.tail {
            Some(tail) => MessageEnd::new(tail.clone()),
            None => MessageEnd::empty(),
        };
        let mut events = Vec::with_capacity(3);
        events.push(Event::MessageStart(start));
        if !self.body.is_empty() {
            events.push(Event::Data(self.body.clone()));
        }
        events.push(Event::MessageEnd(end));
        events
    }
}

/// Accumulates frames until a full message is available.
///
/// Frames outside a message (before any `MessageStart`) are ignored.
/// A second `MessageStart` before a `MessageEnd` restarts accumulation.
#[derive(Debug, Default)]
pub struct MessageReader {
    current: Option<Message>,
}

impl MessageReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame; returns the completed message on `MessageEnd`.
    pub fn read(&mut self, event: &Event) -> Option<Message> {
        match event {
            Event::MessageStart(start) => {
                self.current = Some(Message {
                    head: start.head().cloned(),
                    body: Data::new(),
                    tail: None,
                });
                None
            }
            Event::Data(data) => {
                if let Some(msg) = self.current.as_mut() {
                    msg.body.push_data(data);
                }
                None
            }
            Event::MessageEnd(end) => {
                let mut msg = self.current.take()?;
                msg.tail = end.tail().cloned();
                Some(msg)
            }
            Event::StreamEnd(_) => {
                self.current = None;
                None
            }
        }
    }

    /// True while a message is partially accumulated.
    pub fn is_reading(&self) -> bool {
        self.current.is_some()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
