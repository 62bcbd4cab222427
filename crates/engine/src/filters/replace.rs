// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Substitution callbacks over stream milestones.
//!
//! Mirror of the handle family: the callback's return value replaces the
//! triggering events instead of observing them.

use crate::filter::{Filter, FilterCtx};
use crate::filters::handle::{HookArg, HookPoint};
use serde_json::Value;
use sluice_core::{Data, ErrorKind, Event, Message};
use std::sync::Arc;

/// What to emit in place of the triggering events.
pub enum Replacement {
    /// Emit nothing: the trigger is dropped.
    Drop,
    Event(Event),
    Events(Vec<Event>),
    Message(Message),
    Messages(Vec<Message>),
}

pub type ReplaceFn = Arc<dyn Fn(HookArg<'_>) -> Result<Replacement, String> + Send + Sync>;

/// Replaces triggering events with the callback's return value. Supported
/// hook points: stream start, message start, data, message body, whole
/// message, message end, stream end, or every event.
pub struct Replace {
    point: HookPoint,
    callback: ReplaceFn,
    size_limit: Option<usize>,
    started: bool,
    head: Option<Value>,
    body: Option<Data>,
    tail: Option<Value>,
    discarded: usize,
}

impl Replace {
    pub fn new(point: HookPoint, size_limit: Option<usize>, callback: ReplaceFn) -> Self {
        Self {
            point,
            callback,
            size_limit,
            started: false,
            head: None,
            body: None,
            tail: None,
            discarded: 0,
        }
    }

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

    fn emit(&self, ctx: &mut FilterCtx<'_>, replacement: Replacement) {
        match replacement {
            Replacement::Drop => {}
            Replacement::Event(event) => ctx.output(event),
            Replacement::Events(events) => {
                for event in events {
                    ctx.output(event);
                }
            }
            Replacement::Message(message) => {
                for event in message.events() {
                    ctx.output(event);
                }
            }
            Replacement::Messages(messages) => {
                for message in messages {
                    for event in message.events() {
                        ctx.output(event);
                    }
                }
            }
        }
    }

    fn apply(&mut self, ctx: &mut FilterCtx<'_>, arg: HookArg<'_>) {
        match (self.callback)(arg) {
            Ok(replacement) => self.emit(ctx, replacement),
            Err(message) => ctx.error(ErrorKind::Runtime(message)),
        }
    }

    fn finish_message(&mut self, ctx: &mut FilterCtx<'_>) {
        let Some(body) = self.body.take() else {
            return;
        };
        if self.discarded > 0 {
            tracing::warn!(
                discarded = self.discarded,
                limit = self.size_limit,
                "message body bytes discarded over size limit"
            );
            self.discarded = 0;
        }
        let message = Message { head: self.head.take(), body, tail: self.tail.take() };
        self.apply(ctx, HookArg::Message(&message));
    }
}

impl Filter for Replace {
    fn name(&self) -> &'static str {
        match self.point {
            HookPoint::StreamStart => "replaceStreamStart",
            HookPoint::MessageStart => "replaceMessageStart",
            HookPoint::Data => "replaceData",
            HookPoint::MessageBody => "replaceMessageBody",
            HookPoint::Message => "replaceMessage",
            HookPoint::MessageEnd => "replaceMessageEnd",
            HookPoint::StreamEnd => "replaceStreamEnd",
            HookPoint::Any => "replace",
        }
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.point, self.size_limit, self.callback.clone()))
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        match (self.point, &event) {
            (HookPoint::Any, _) => {
                self.apply(ctx, HookArg::Event(&event));
            }
            (HookPoint::MessageBody, Event::MessageStart(_)) => {
                self.body = Some(Data::new());
                self.discarded = 0;
                ctx.output(event);
            }
            (HookPoint::MessageBody, Event::Data(data)) if self.body.is_some() => {
                self.collect(data);
            }
            (HookPoint::MessageBody, Event::MessageEnd(_)) if self.body.is_some() => {
                // The replacement stands in for the body; the message
                // boundaries stay as they were.
                if let Some(body) = self.body.take() {
                    if self.discarded > 0 {
                        tracing::warn!(
                            discarded = self.discarded,
                            limit = self.size_limit,
                            "message body bytes discarded over size limit"
                        );
                        self.discarded = 0;
                    }
                    self.apply(ctx, HookArg::Body(&body));
                }
                ctx.output(event);
            }
            (HookPoint::StreamStart, _) if !self.started => {
                self.started = true;
                self.apply(ctx, HookArg::StreamStart(&event));
            }
            (HookPoint::MessageStart, Event::MessageStart(start)) => {
                self.apply(ctx, HookArg::MessageStart(start));
            }
            (HookPoint::Data, Event::Data(data)) => {
                self.apply(ctx, HookArg::Data(data));
            }
            (HookPoint::MessageEnd, Event::MessageEnd(end)) => {
                self.apply(ctx, HookArg::MessageEnd(end));
            }
            (HookPoint::StreamEnd, Event::StreamEnd(end)) => {
                self.apply(ctx, HookArg::StreamEnd(end));
            }
            (HookPoint::Message, Event::MessageStart(start)) => {
                self.head = start.head().cloned();
                self.body = Some(Data::new());
                self.tail = None;
                self.discarded = 0;
            }
            (HookPoint::Message, Event::Data(data)) if self.body.is_some() => {
                self.collect(data);
            }
            (HookPoint::Message, Event::MessageEnd(end)) if self.body.is_some() => {
                self.tail = end.tail().cloned();
                self.finish_message(ctx);
            }
            (HookPoint::Message, Event::StreamEnd(_)) if self.body.is_some() => {
                // Stream ended mid-message: replace what was collected,
                // then let the terminal through.
                self.finish_message(ctx);
                ctx.output(event);
            }
            _ => ctx.output(event),
        }
    }

    fn reset(&mut self, _ctx: &mut FilterCtx<'_>) {
        self.started = false;
        self.head = None;
        self.body = None;
        self.tail = None;
        self.discarded = 0;
    }
}

#[cfg(test)]
#[path = "replace_tests.rs"]
mod tests;
