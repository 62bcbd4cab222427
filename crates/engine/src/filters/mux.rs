// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge many logical requests onto shared keyed sessions.
//!
//! A session is one sub-pipeline (typically a transport connection) plus a
//! FIFO of inflight requests. Responses are correlated in order: the next
//! complete response message belongs to the oldest inflight request. A
//! session `StreamEnd` fans out to every inflight and queued request; they
//! do not auto-retry.

use crate::arena::PipelineHandle;
use crate::context::Context;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::input::{InputRef, OutputTarget, Port, SinkId, TapState};
use crate::layout::{LayoutId, SubRef};
use crate::worker::{EventSink, SinkOps};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event, EventBuffer, StreamEnd};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub type SessionKeyFn = Arc<dyn Fn(&Event, &Context) -> SmolStr + Send + Sync>;

#[derive(Clone)]
pub struct MuxOptions {
    /// Per-session inflight cap; excess requests queue.
    pub max_queue: usize,
    /// Session lifetime cap in request messages; the session retires after.
    pub max_messages: usize,
    /// Idle TTL before a session is torn down.
    pub max_idle: Duration,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self { max_queue: usize::MAX, max_messages: usize::MAX, max_idle: Duration::from_secs(60) }
    }
}

type SessionShared = Arc<Mutex<SessionState>>;

struct SessionState {
    key: SmolStr,
    options: MuxOptions,
    pipeline: Option<PipelineHandle>,
    sink: Option<SinkId>,
    /// Reply addresses of requests whose events went to the session.
    inflight: VecDeque<InputRef>,
    /// Reply addresses waiting for an inflight slot.
    queued: VecDeque<InputRef>,
    messages: usize,
    ended: Option<StreamEnd>,
    retired: bool,
    idle_timer: Option<crate::scheduler::TimerToken>,
}

struct SessionPool {
    sessions: HashMap<SmolStr, SessionShared>,
}

/// Routes one session pipeline's output back to its inflight requests.
struct SessionSink {
    state: SessionShared,
    pool: Arc<Mutex<SessionPool>>,
}

impl SessionSink {
    fn retire(state: &mut SessionState, pool: &Mutex<SessionPool>, ops: &mut SinkOps<'_>) {
        state.retired = true;
        if let Some(pipeline) = state.pipeline.take() {
            ops.release(pipeline);
        }
        if let Some(token) = state.idle_timer.take() {
            ops.cancel_timer(token);
        }
        pool.lock().sessions.remove(&state.key);
        if let Some(sink) = state.sink.take() {
            ops.retire_sink(sink);
        }
    }
}

impl EventSink for SessionSink {
    fn on_event(&mut self, event: Event, ops: &mut SinkOps<'_>) {
        let mut state = self.state.lock();
        if let Event::StreamEnd(end) = &event {
            let mut targets: Vec<InputRef> = state.inflight.drain(..).collect();
            targets.extend(state.queued.drain(..));
            for target in targets {
                ops.input(target, event.clone());
            }
            state.ended = Some(end.clone());
            Self::retire(&mut state, &self.pool, ops);
            return;
        }
        let Some(front) = state.inflight.front().copied() else {
            tracing::debug!(key = %state.key, frame = event.name(), "unsolicited session event");
            return;
        };
        let response_done = matches!(event, Event::MessageEnd(_));
        ops.input(front, event);
        if response_done {
            state.inflight.pop_front();
            if let Some(promoted) = state.queued.pop_front() {
                state.inflight.push_back(promoted);
                if let Port::Reply { filter, .. } = promoted.port {
                    ops.notify(promoted.pipeline, filter);
                }
            }
            if state.inflight.is_empty() && state.queued.is_empty() {
                if let Some(sink) = state.sink {
                    let token = ops.schedule(sink, state.options.max_idle, 0);
                    state.idle_timer = Some(token);
                }
            }
        }
    }

    fn on_timer(&mut self, _tag: u64, ops: &mut SinkOps<'_>) {
        let mut state = self.state.lock();
        state.idle_timer = None;
        if state.inflight.is_empty() && state.queued.is_empty() && !state.retired {
            tracing::debug!(key = %state.key, "session idle, closing");
            Self::retire(&mut state, &self.pool, ops);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Unassigned,
    Queued,
    Inflight,
    Done,
}

/// Client-side session multiplexer.
pub struct Mux {
    sub: SubRef,
    key_fn: SessionKeyFn,
    options: MuxOptions,
    pool: Arc<Mutex<SessionPool>>,
    session: Option<SessionShared>,
    state: RequestState,
    pending: EventBuffer,
    watching_tap: bool,
}

impl Mux {
    pub fn new(sub: SubRef, key_fn: SessionKeyFn, options: MuxOptions) -> Self {
        let pool = Arc::new(Mutex::new(SessionPool { sessions: HashMap::new() }));
        Self::with_pool(sub, key_fn, options, pool)
    }

    fn with_pool(
        sub: SubRef,
        key_fn: SessionKeyFn,
        options: MuxOptions,
        pool: Arc<Mutex<SessionPool>>,
    ) -> Self {
        Self {
            sub,
            key_fn,
            options,
            pool,
            session: None,
            state: RequestState::Unassigned,
            pending: EventBuffer::new(),
            watching_tap: false,
        }
    }

    fn assign(&mut self, ctx: &mut FilterCtx<'_>, event: &Event) {
        let key = match ctx.context() {
            Some(context) => (self.key_fn)(event, context),
            None => return,
        };
        let existing = {
            let pool = self.pool.lock();
            pool.sessions.get(&key).cloned()
        };
        let shared = match existing {
            Some(shared) if !shared.lock().retired => shared,
            _ => match self.open_session(ctx, key) {
                Some(shared) => shared,
                None => return,
            },
        };
        // Enroll: take an inflight slot or queue for one.
        {
            let mut state = shared.lock();
            if let Some(token) = state.idle_timer.take() {
                ctx.cancel_timer(token);
            }
            let reply = ctx.reply_ref(0);
            if state.inflight.len() < self.options.max_queue {
                state.inflight.push_back(reply);
                self.state = RequestState::Inflight;
            } else {
                state.queued.push_back(reply);
                self.state = RequestState::Queued;
            }
        }
        self.session = Some(shared);
    }

    fn open_session(&mut self, ctx: &mut FilterCtx<'_>, key: SmolStr) -> Option<SessionShared> {
        let id = self.sub.resolved()?;
        let shared = Arc::new(Mutex::new(SessionState {
            key: key.clone(),
            options: self.options.clone(),
            pipeline: None,
            sink: None,
            inflight: VecDeque::new(),
            queued: VecDeque::new(),
            messages: 0,
            ended: None,
            retired: false,
            idle_timer: None,
        }));
        let sink = ctx.add_sink(Box::new(SessionSink {
            state: shared.clone(),
            pool: self.pool.clone(),
        }));
        let pipeline = ctx.spawn_sub(id, OutputTarget::Sink(sink))?;
        ctx.start(pipeline, &[Value::String(key.to_string())]);
        {
            let mut state = shared.lock();
            state.pipeline = Some(pipeline);
            state.sink = Some(sink);
        }
        self.pool.lock().sessions.insert(key, shared.clone());
        Some(shared)
    }

    fn forward(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        let Some(shared) = self.session.clone() else {
            return;
        };
        let (pipeline, over_lifetime) = {
            let mut state = shared.lock();
            if matches!(event, Event::MessageEnd(_)) {
                state.messages += 1;
            }
            (state.pipeline, state.messages >= state.options.max_messages)
        };
        let Some(pipeline) = pipeline else {
            return;
        };
        // Mirror session backpressure onto our own input.
        if ctx.tap(pipeline) == TapState::Closed && !self.watching_tap {
            ctx.close_tap();
            ctx.watch_tap(pipeline);
            self.watching_tap = true;
        }
        ctx.input_pipeline(pipeline, event);
        if over_lifetime {
            // Lifetime cap reached: stop handing this session to new
            // requests; inflight ones run to completion.
            let mut pool = self.pool.lock();
            let state = shared.lock();
            pool.sessions.remove(&state.key);
        }
    }
}

impl Filter for Mux {
    fn name(&self) -> &'static str {
        "mux"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::with_pool(
            self.sub.clone(),
            self.key_fn.clone(),
            self.options.clone(),
            self.pool.clone(),
        ))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        self.sub.bind(self.name(), names)
    }

    fn attach_sub(&mut self, sub: SubRef) -> Result<(), LayoutError> {
        self.sub = sub;
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if self.state == RequestState::Done {
            return;
        }
        if self.session.is_none() {
            self.assign(ctx, &event);
            if self.session.is_none() {
                ctx.error(ErrorKind::Runtime("mux session unavailable".into()));
                return;
            }
            if let Some(shared) = &self.session {
                if let Some(end) = shared.lock().ended.clone() {
                    ctx.output(Event::StreamEnd(end));
                    self.state = RequestState::Done;
                    return;
                }
            }
        }
        match self.state {
            RequestState::Inflight => self.forward(ctx, event),
            RequestState::Queued => self.pending.push(event),
            _ => {}
        }
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64, event: Event) {
        let terminal =
            matches!(event, Event::MessageEnd(_)) || event.is_stream_end();
        ctx.output(event);
        if terminal {
            self.state = RequestState::Done;
        }
    }

    fn on_notify(&mut self, ctx: &mut FilterCtx<'_>) {
        // Promotion from the session queue.
        if self.state == RequestState::Queued {
            if let Some(shared) = self.session.clone() {
                let promoted = {
                    let state = shared.lock();
                    let reply = ctx.reply_ref(0);
                    state.inflight.contains(&reply)
                };
                if promoted {
                    self.state = RequestState::Inflight;
                    let mut pending = std::mem::take(&mut self.pending);
                    pending.flush(|event| self.forward(ctx, event));
                }
            }
        }
        // The session's tap reopened.
        if self.watching_tap {
            if let Some(shared) = &self.session {
                let pipeline = shared.lock().pipeline;
                if let Some(pipeline) = pipeline {
                    if ctx.tap(pipeline) == TapState::Open {
                        ctx.open_tap();
                        self.watching_tap = false;
                    }
                }
            }
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(shared) = self.session.take() {
            let reply = ctx.reply_ref(0);
            let mut state = shared.lock();
            // Inflight entries stay: the FIFO correlation must keep its
            // slot, and delivery to a released request is a safe no-op.
            state.queued.retain(|r| *r != reply);
        }
        self.state = RequestState::Unassigned;
        self.pending.clear();
        self.watching_tap = false;
    }
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
