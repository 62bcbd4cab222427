// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed frames exchanged between filters.
//!
//! A well-formed message is `MessageStart (Data)* MessageEnd`. `StreamEnd`
//! may appear at any point and terminates the channel; nothing follows it.

use crate::data::Data;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One frame of the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MessageStart(MessageStart),
    Data(Data),
    MessageEnd(MessageEnd),
    StreamEnd(StreamEnd),
}

impl Event {
    /// Convenience constructor for a `Data` frame.
    pub fn data(bytes: impl Into<Data>) -> Self {
        Event::Data(bytes.into())
    }

    pub fn stream_end(error: ErrorKind) -> Self {
        Event::StreamEnd(StreamEnd::new(error))
    }

    pub fn is_stream_end(&self) -> bool {
        matches!(self, Event::StreamEnd(_))
    }

    /// Stable frame name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::MessageStart(_) => "MessageStart",
            Event::Data(_) => "Data",
            Event::MessageEnd(_) => "MessageEnd",
            Event::StreamEnd(_) => "StreamEnd",
        }
    }
}

impl From<MessageStart> for Event {
    fn from(e: MessageStart) -> Self {
        Event::MessageStart(e)
    }
}

impl From<Data> for Event {
    fn from(d: Data) -> Self {
        Event::Data(d)
    }
}

impl From<MessageEnd> for Event {
    fn from(e: MessageEnd) -> Self {
        Event::MessageEnd(e)
    }
}

impl From<StreamEnd> for Event {
    fn from(e: StreamEnd) -> Self {
        Event::StreamEnd(e)
    }
}

/// Start of a message, optionally carrying a metadata head.
///
/// The head is shared between clones and immutable once attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageStart {
    head: Option<Arc<Value>>,
}

impl MessageStart {
    pub fn new(head: Value) -> Self {
        Self { head: Some(Arc::new(head)) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<&Value> {
        self.head.as_deref()
    }
}

/// End of a message, optionally carrying a metadata tail and a payload
/// value handed to `on_end` hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEnd {
    tail: Option<Arc<Value>>,
    payload: Option<Arc<Value>>,
}

impl MessageEnd {
    pub fn new(tail: Value) -> Self {
        Self { tail: Some(Arc::new(tail)), payload: None }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_payload(tail: Option<Value>, payload: Value) -> Self {
        Self { tail: tail.map(Arc::new), payload: Some(Arc::new(payload)) }
    }

    pub fn tail(&self) -> Option<&Value> {
        self.tail.as_deref()
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_deref()
    }
}

/// Terminal frame for the whole channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamEnd {
    error: ErrorKind,
    value: Option<Arc<Value>>,
}

impl StreamEnd {
    pub fn new(error: ErrorKind) -> Self {
        Self { error, value: None }
    }

    pub fn no_error() -> Self {
        Self::default()
    }

    pub fn with_value(error: ErrorKind, value: Value) -> Self {
        Self { error, value: Some(Arc::new(value)) }
    }

    pub fn error(&self) -> &ErrorKind {
        &self.error
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }

    pub fn is_error(&self) -> bool {
        !matches!(self.error, ErrorKind::NoError)
    }
}

/// Why a stream ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "kebab-case")]
pub enum ErrorKind {
    #[default]
    NoError,
    ReadError,
    WriteError,
    CannotResolve,
    ConnectionRefused,
    ConnectionReset,
    ConnectionTimeout,
    ReadTimeout,
    WriteTimeout,
    Unauthorized,
    BufferOverflow,
    ProtocolError,
    /// Sentinel consumed by the `replay` filter to request a retry.
    Replay,
    Cancelled,
    /// User-callback failure, carrying its message.
    Runtime(String),
}

crate::simple_display! {
    ErrorKind {
        NoError => "no-error",
        ReadError => "read-error",
        WriteError => "write-error",
        CannotResolve => "cannot-resolve",
        ConnectionRefused => "connection-refused",
        ConnectionReset => "connection-reset",
        ConnectionTimeout => "connection-timeout",
        ReadTimeout => "read-timeout",
        WriteTimeout => "write-timeout",
        Unauthorized => "unauthorized",
        BufferOverflow => "buffer-overflow",
        ProtocolError => "protocol-error",
        Replay => "replay",
        Cancelled => "cancelled",
        Runtime(..) => "runtime-error",
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
