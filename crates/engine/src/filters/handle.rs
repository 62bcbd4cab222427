// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer callbacks over stream milestones.
//!
//! One filter covers the whole family; the hook point picks which frames
//! trigger the callback. A callback may settle asynchronously: the filter
//! then defers every subsequent event until the host settles the token.

use crate::filter::{CallbackToken, Filter, FilterCtx, Settle};
use serde_json::Value;
use sluice_core::{
    Data, ErrorKind, Event, EventBuffer, Message, MessageEnd, MessageStart, StreamEnd,
};
use std::sync::Arc;

/// Which milestone invokes the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    StreamStart,
    MessageStart,
    Data,
    /// The whole body, accumulated up to the size limit.
    MessageBody,
    Message,
    MessageEnd,
    StreamEnd,
    /// Every event.
    Any,
}

/// Aggregate handed to the callback.
pub enum HookArg<'a> {
    StreamStart(&'a Event),
    MessageStart(&'a MessageStart),
    Data(&'a Data),
    /// Accumulated message body (`MessageBody` hook).
    Body(&'a Data),
    Message(&'a Message),
    MessageEnd(&'a MessageEnd),
    StreamEnd(&'a StreamEnd),
    /// Any event (`Any` hook).
    Event(&'a Event),
}

pub type HandleFn = Arc<dyn Fn(HookArg<'_>) -> Result<Settle, String> + Send + Sync>;

/// Pass-through observer; see the module docs.
pub struct Handle {
    point: HookPoint,
    callback: HandleFn,
    size_limit: Option<usize>,
    started: bool,
    head: Option<Value>,
    body: Option<Data>,
    discarded: usize,
    waiting: bool,
    deferred: EventBuffer,
}

impl Handle {
    pub fn new(point: HookPoint, size_limit: Option<usize>, callback: HandleFn) -> Self {
        Self {
            point,
            callback,
            size_limit,
            started: false,
            head: None,
            body: None,
            discarded: 0,
            waiting: false,
            deferred: EventBuffer::new(),
        }
    }

    /// Append data to the collected body, honoring the size limit.
    fn collect(&mut self, data: &Data) {
        let Some(body) = self.body.as_mut() else {
            return;
        };
        match self.size_limit {
            Some(limit) => {
                let room = limit.saturating_sub(body.len());
                if room >= data.len() {
                    body.push_data(data);
                } else {
                    let mut chunk = data.clone();
                    let kept = chunk.shift(room);
                    body.push_data(&kept);
                    self.discarded += chunk.len();
                }
            }
            None => body.push_data(data),
        }
    }

    fn trigger(&mut self, event: &Event) -> Option<Result<Settle, String>> {
        match (self.point, event) {
            (HookPoint::StreamStart, event) if !self.started => {
                self.started = true;
                Some((self.callback)(HookArg::StreamStart(event)))
            }
            (HookPoint::MessageStart, Event::MessageStart(start)) => {
                Some((self.callback)(HookArg::MessageStart(start)))
            }
            (HookPoint::Data, Event::Data(data)) => Some((self.callback)(HookArg::Data(data))),
            (HookPoint::MessageEnd, Event::MessageEnd(end)) => {
                Some((self.callback)(HookArg::MessageEnd(end)))
            }
            (HookPoint::StreamEnd, Event::StreamEnd(end)) => {
                Some((self.callback)(HookArg::StreamEnd(end)))
            }
            (HookPoint::Any, event) => Some((self.callback)(HookArg::Event(event))),
            (HookPoint::Message | HookPoint::MessageBody, Event::MessageStart(start)) => {
                self.head = start.head().cloned();
                self.body = Some(Data::new());
                self.discarded = 0;
                None
            }
            (HookPoint::Message | HookPoint::MessageBody, Event::Data(data)) => {
                self.collect(data);
                None
            }
            (HookPoint::Message, Event::MessageEnd(end)) => {
                let body = self.body.take()?;
                self.warn_discarded();
                let message =
                    Message { head: self.head.take(), body, tail: end.tail().cloned() };
                Some((self.callback)(HookArg::Message(&message)))
            }
            (HookPoint::MessageBody, Event::MessageEnd(_)) => {
                let body = self.body.take()?;
                self.warn_discarded();
                self.head = None;
                Some((self.callback)(HookArg::Body(&body)))
            }
            _ => None,
        }
    }

    fn warn_discarded(&mut self) {
        if self.discarded > 0 {
            tracing::warn!(
                discarded = self.discarded,
                limit = self.size_limit,
                "message body bytes discarded over size limit"
            );
            self.discarded = 0;
        }
    }

    fn handle(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        match self.trigger(&event) {
            None | Some(Ok(Settle::Done)) => ctx.output(event),
            Some(Ok(Settle::Pending(token))) => {
                ctx.register_callback(token);
                self.waiting = true;
                self.deferred.push(event);
            }
            Some(Err(message)) => ctx.error(ErrorKind::Runtime(message)),
        }
    }
}

impl Filter for Handle {
    fn name(&self) -> &'static str {
        match self.point {
            HookPoint::StreamStart => "handleStreamStart",
            HookPoint::MessageStart => "handleMessageStart",
            HookPoint::Data => "handleData",
            HookPoint::MessageBody => "handleMessageBody",
            HookPoint::Message => "handleMessage",
            HookPoint::MessageEnd => "handleMessageEnd",
            HookPoint::StreamEnd => "handleStreamEnd",
            HookPoint::Any => "handle",
        }
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.point, self.size_limit, self.callback.clone()))
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if self.waiting {
            self.deferred.push(event);
        } else {
            self.handle(ctx, event);
        }
    }

    fn on_settle(
        &mut self,
        ctx: &mut FilterCtx<'_>,
        _token: CallbackToken,
        result: Result<Value, String>,
    ) {
        self.waiting = false;
        match result {
            Ok(_) => {
                // The head of the queue is the settled trigger event itself;
                // it passes through without re-triggering.
                if let Some(event) = self.deferred.pop_front() {
                    ctx.output(event);
                }
                while !self.waiting {
                    let Some(event) = self.deferred.pop_front() else {
                        break;
                    };
                    self.handle(ctx, event);
                }
            }
            Err(message) => {
                self.deferred.clear();
                ctx.error(ErrorKind::Runtime(message));
            }
        }
    }

    fn reset(&mut self, _ctx: &mut FilterCtx<'_>) {
        self.started = false;
        self.head = None;
        self.body = None;
        self.discarded = 0;
        self.waiting = false;
        self.deferred.clear();
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
