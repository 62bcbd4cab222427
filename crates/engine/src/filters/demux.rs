// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Split one inbound stream into one sub-pipeline per logical request.
//!
//! Each `MessageStart..MessageEnd` on the input becomes its own
//! sub-pipeline; responses are serialized back in request order. Request
//! N+1 may start before request N's response completes; its response
//! buffers until its turn.

use crate::arena::PipelineHandle;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::layout::{LayoutId, SubRef};
use indexmap::IndexMap;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event, EventBuffer, StreamEnd};
use std::collections::VecDeque;

struct SubStream {
    tag: u64,
    handle: Option<PipelineHandle>,
    buffer: EventBuffer,
    done: bool,
}

/// Server-side message demultiplexer.
pub struct Demux {
    sub: SubRef,
    streams: VecDeque<SubStream>,
    next_tag: u64,
    current: Option<PipelineHandle>,
    input_ended: bool,
    held_end: Option<StreamEnd>,
}

impl Demux {
    pub fn new(sub: SubRef) -> Self {
        Self {
            sub,
            streams: VecDeque::new(),
            next_tag: 0,
            current: None,
            input_ended: false,
            held_end: None,
        }
    }

    /// Pop completed head streams, flushing buffered responses in order.
    fn advance(&mut self, ctx: &mut FilterCtx<'_>) {
        loop {
            let Some(front) = self.streams.front_mut() else {
                break;
            };
            if !front.done && front.buffer.is_empty() {
                break;
            }
            let mut buffer = std::mem::take(&mut front.buffer);
            buffer.flush(|event| {
                if !event.is_stream_end() {
                    ctx.output(event);
                }
            });
            if !front.done {
                break;
            }
            if let Some(handle) = front.handle.take() {
                ctx.release(handle);
            }
            self.streams.pop_front();
        }
        if self.streams.is_empty() && self.input_ended {
            let end = self.held_end.take().unwrap_or_default();
            ctx.output(Event::StreamEnd(end));
            self.input_ended = false;
        }
    }
}

impl Filter for Demux {
    fn name(&self) -> &'static str {
        "demux"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.sub.clone()))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        self.sub.bind(self.name(), names)
    }

    fn attach_sub(&mut self, sub: SubRef) -> Result<(), LayoutError> {
        self.sub = sub;
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        match &event {
            Event::MessageStart(_) => {
                let Some(id) = self.sub.resolved() else {
                    ctx.error(ErrorKind::Runtime("demux sub-pipeline unresolved".into()));
                    return;
                };
                let tag = self.next_tag;
                self.next_tag += 1;
                let Some(handle) = ctx.spawn_reply(id, tag) else {
                    return;
                };
                ctx.start(handle, &[]);
                self.streams.push_back(SubStream {
                    tag,
                    handle: Some(handle),
                    buffer: EventBuffer::new(),
                    done: false,
                });
                self.current = Some(handle);
                ctx.input_pipeline(handle, event);
            }
            Event::Data(_) => {
                if let Some(handle) = self.current {
                    ctx.input_pipeline(handle, event);
                }
            }
            Event::MessageEnd(_) => {
                if let Some(handle) = self.current.take() {
                    ctx.input_pipeline(handle, event);
                }
            }
            Event::StreamEnd(end) => {
                self.current = None;
                if end.is_error() {
                    // The transport died: cancel outstanding requests.
                    for mut stream in self.streams.drain(..) {
                        if let Some(handle) = stream.handle.take() {
                            ctx.release(handle);
                        }
                    }
                    ctx.output(event);
                    return;
                }
                self.input_ended = true;
                self.held_end = Some(end.clone());
                self.advance(ctx);
            }
        }
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, tag: u64, event: Event) {
        let Some(pos) = self.streams.iter().position(|s| s.tag == tag) else {
            return;
        };
        let is_head = pos == 0;
        let stream = &mut self.streams[pos];
        match &event {
            Event::StreamEnd(_) => {
                stream.done = true;
            }
            Event::MessageEnd(_) => {
                stream.done = true;
                if is_head {
                    ctx.output(event);
                } else {
                    stream.buffer.push(event);
                }
            }
            _ => {
                if is_head {
                    ctx.output(event);
                } else {
                    stream.buffer.push(event);
                }
            }
        }
        if self.streams.front().map(|s| s.done).unwrap_or(false) {
            self.advance(ctx);
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        for mut stream in self.streams.drain(..) {
            if let Some(handle) = stream.handle.take() {
                ctx.release(handle);
            }
        }
        self.current = None;
        self.next_tag = 0;
        self.input_ended = false;
        self.held_end = None;
    }
}

#[cfg(test)]
#[path = "demux_tests.rs"]
mod tests;
