// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The polymorphic pipeline node.
//!
//! Prototypes live in layouts; each pipeline instance clones them. A filter
//! never blocks: it consumes one event, emits zero or more through
//! [`FilterCtx`], and may arm a continuation (timer, callback settle, tap
//! reopen) that resumes it later under a fresh InputContext.

use crate::arena::PipelineHandle;
use crate::context::Context;
use crate::error::LayoutError;
use crate::hub::HubId;
use crate::input::{InputRef, OutputTarget, Port, SinkId, TapState};
use crate::layout::{LayoutId, Module};
use crate::scheduler::{TimerToken, Wake};
use crate::worker::{EventSink, WorkerCore};
use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle to a pending user callback (the promise bridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackToken(pub(crate) u64);

/// Outcome of a user callback: finished synchronously, or parked on a token
/// the host settles later via `Worker::settle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    Done,
    Pending(CallbackToken),
}

/// One node in a pipeline.
///
/// `Send + Sync` because prototypes ride inside `Arc<Module>` across the
/// host's threads; per-run state is still only ever touched by the one
/// worker that owns the instance.
pub trait Filter: Send + Sync {
    /// Stable filter name, as spelled in the designer API.
    fn name(&self) -> &'static str;

    /// Deep copy of prototype state (never of per-run state).
    fn clone_filter(&self) -> Box<dyn Filter>;

    /// One-time resolution of symbolic sub-layout references.
    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        let _ = names;
        Ok(())
    }

    /// Designer hook: accept the sub-layout reference from `to()`.
    /// Filters that own no sub-pipeline reject it.
    fn attach_sub(&mut self, sub: crate::layout::SubRef) -> Result<(), LayoutError> {
        let _ = sub;
        Err(LayoutError::NotAJoint(self.name()))
    }

    /// Consume one forward event.
    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event);

    /// An event came back from a sub-pipeline spawned with this `tag`.
    /// Default: forward to the successor untouched.
    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, tag: u64, event: Event) {
        let _ = tag;
        ctx.output(event);
    }

    /// A timer armed through [`FilterCtx::schedule`] fired.
    fn on_timer(&mut self, ctx: &mut FilterCtx<'_>, tag: u64) {
        let _ = (ctx, tag);
    }

    /// The filter's context group (or a watched tap) changed.
    fn on_notify(&mut self, ctx: &mut FilterCtx<'_>) {
        let _ = ctx;
    }

    /// A callback this filter parked on settled.
    fn on_settle(
        &mut self,
        ctx: &mut FilterCtx<'_>,
        token: CallbackToken,
        result: Result<Value, String>,
    ) {
        let _ = (ctx, token, result);
    }

    /// Clear per-run state: release sub-pipelines, cancel timers,
    /// deregister from hubs and waiter lists.
    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        let _ = ctx;
    }

    /// Idempotent final release.
    fn shutdown(&mut self) {}
}

/// Capability handle passed to a running filter.
///
/// The filter is detached from its slot while it runs, so the context has
/// free access to the worker: spawning sub-pipelines, scheduling timers,
/// touching the arena.
pub struct FilterCtx<'a> {
    pub(crate) core: &'a mut WorkerCore,
    pub(crate) now: Instant,
    pub(crate) pipeline: PipelineHandle,
    pub(crate) filter: u32,
}

impl FilterCtx<'_> {
    pub fn now(&self) -> Instant {
        self.now
    }

    /// The pipeline this filter belongs to.
    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    /// This filter's position in its pipeline.
    pub fn filter_index(&self) -> u32 {
        self.filter
    }

    /// Delivery address of this filter's successor: the next filter in the
    /// pipeline, or the pipeline's output boundary for the last one.
    pub fn successor(&self) -> InputRef {
        let next = self.filter + 1;
        let port = match self.core.arena.get(self.pipeline) {
            Some(p) if (next as usize) < p.filters.len() => Port::Filter(next),
            _ => Port::Output,
        };
        InputRef::new(self.pipeline, port)
    }

    /// Emit to the successor.
    pub fn output(&mut self, event: Event) {
        let target = self.successor();
        self.core.push_event(target, event);
    }

    /// Report a fatal stream fault to the successor.
    pub fn error(&mut self, kind: ErrorKind) {
        self.output(Event::stream_end(kind));
    }

    /// Enqueue for an arbitrary address.
    pub fn forward(&mut self, target: InputRef, event: Event) {
        self.core.push_event(target, event);
    }

    /// Enqueue into a pipeline's input (tap-gated).
    pub fn input_pipeline(&mut self, handle: PipelineHandle, event: Event) {
        self.core.push_event(InputRef::head(handle), event);
    }

    /// This filter's reply address for sub-pipelines spawned with `tag`.
    pub fn reply_ref(&self, tag: u64) -> InputRef {
        InputRef::new(self.pipeline, Port::Reply { filter: self.filter, tag })
    }

    /// Spawn a sub-pipeline from this module's layout `id`, wiring its
    /// output to `output`. Context group and module chain are inherited.
    pub fn spawn_sub(&mut self, id: LayoutId, output: OutputTarget) -> Option<PipelineHandle> {
        self.core.spawn_from(self.pipeline, id, output)
    }

    /// Spawn a sub-pipeline replying back into this filter under `tag`.
    pub fn spawn_reply(&mut self, id: LayoutId, tag: u64) -> Option<PipelineHandle> {
        let output = OutputTarget::Input(self.reply_ref(tag));
        self.spawn_sub(id, output)
    }

    /// Spawn a sub-pipeline chained straight to this filter's successor.
    pub fn spawn_chained(&mut self, id: LayoutId) -> Option<PipelineHandle> {
        let output = OutputTarget::Input(self.successor());
        self.spawn_sub(id, output)
    }

    /// Spawn the next module on this pipeline's chain, chained to the
    /// successor. `None` when the chain is exhausted.
    pub fn spawn_chain_next(&mut self) -> Option<PipelineHandle> {
        let output = OutputTarget::Input(self.successor());
        self.core.spawn_chain_next(self.pipeline, output)
    }

    /// Run a spawned pipeline's `on_start` hook.
    pub fn start(&mut self, handle: PipelineHandle, args: &[Value]) {
        self.core.start_pipeline(handle, args);
    }

    /// Release a pipeline at InputContext drain (never mid-flush).
    pub fn release(&mut self, handle: PipelineHandle) {
        self.core.pending_release.push(handle);
    }

    pub fn schedule(&mut self, delay: Duration, tag: u64) -> TimerToken {
        let wake = Wake::Filter { pipeline: self.pipeline, filter: self.filter, tag };
        self.core.scheduler.set(wake, delay, self.now)
    }

    pub fn cancel_timer(&mut self, token: TimerToken) {
        self.core.scheduler.cancel(token);
    }

    pub fn tap(&self, handle: PipelineHandle) -> TapState {
        self.core.tap(handle)
    }

    /// Close this pipeline's input tap (backpressure upstream).
    pub fn close_tap(&mut self) {
        self.core.set_tap(self.pipeline, TapState::Closed);
    }

    /// Reopen this pipeline's input tap, re-queueing gated events.
    pub fn open_tap(&mut self) {
        self.core.set_tap(self.pipeline, TapState::Open);
    }

    /// Be notified (via `on_notify`) when `handle`'s tap reopens.
    pub fn watch_tap(&mut self, handle: PipelineHandle) {
        if let Some(p) = self.core.arena.get_mut(handle) {
            let watcher = (self.pipeline, self.filter);
            if !p.tap_watchers.contains(&watcher) {
                p.tap_watchers.push(watcher);
            }
        }
    }

    /// The module this pipeline was spawned from.
    pub fn module(&self) -> Option<Arc<Module>> {
        self.core.arena.get(self.pipeline).map(|p| p.module.clone())
    }

    pub fn context(&self) -> Option<&Context> {
        self.core.arena.get(self.pipeline).map(|p| &p.context)
    }

    pub fn context_mut(&mut self) -> Option<&mut Context> {
        self.core.arena.get_mut(self.pipeline).map(|p| &mut p.context)
    }

    /// Set a context variable and notify the group's waiters.
    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        let Some(p) = self.core.arena.get_mut(self.pipeline) else {
            return;
        };
        p.context.set(key, value);
        let group = p.context.group();
        self.core.notify_group(group);
    }

    /// Register as a waiter on this pipeline's context group.
    pub fn wait(&mut self) {
        let Some(group) = self.context().map(|c| c.group()) else {
            return;
        };
        self.core.add_waiter(group, self.pipeline, self.filter);
    }

    /// Deregister from this pipeline's context group.
    pub fn unwait(&mut self) {
        let Some(group) = self.context().map(|c| c.group()) else {
            return;
        };
        self.core.remove_waiter(group, self.pipeline, self.filter);
    }

    /// Queue an `on_notify` wake for another filter.
    pub fn notify_filter(&mut self, pipeline: PipelineHandle, filter: u32) {
        self.core.push_notify(pipeline, filter);
    }

    /// Route a pending callback's settlement back to this filter.
    pub fn register_callback(&mut self, token: CallbackToken) {
        self.core.callbacks.insert(token.0, (self.pipeline, self.filter));
    }

    pub fn hub_join(&mut self, hub: HubId, party: InputRef) {
        self.core.hub_join(hub, party);
    }

    pub fn hub_exit(&mut self, hub: HubId, party: InputRef) {
        self.core.hub_exit(hub, party);
    }

    /// Broadcast to every hub party except `from`.
    pub fn hub_broadcast(&mut self, hub: HubId, event: &Event, from: Option<InputRef>) {
        self.core.hub_broadcast(hub, event, from);
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) -> SinkId {
        self.core.add_sink(sink)
    }

    pub fn remove_sink(&mut self, sink: SinkId) {
        self.core.remove_sink(sink);
    }

    pub fn schedule_sink(&mut self, sink: SinkId, delay: Duration, tag: u64) -> TimerToken {
        self.core.scheduler.set(Wake::Sink { sink, tag }, delay, self.now)
    }
}
