// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-thread cooperative runtime.
//!
//! One worker owns an arena of pipelines, the delivery queue, the timer
//! wheel, hubs, sinks, and callback continuations. Every public mutator
//! enqueues work and drains the queue to empty; that drain is the
//! InputContext of the concurrency model — nested emissions enqueue rather
//! than recurse, and deferred releases run when the drain unwinds.

use crate::arena::{PipelineArena, PipelineHandle};
use crate::context::{Context, GroupId};
use crate::error::LayoutError;
use crate::filter::{CallbackToken, FilterCtx};
use crate::hub::{Hub, HubId};
use crate::input::{Delivery, InputRef, OutputTarget, Port, SinkId, TapState};
use crate::layout::{LayoutId, Module, StartingEvents};
use crate::pipeline::{ChainEntry, Pipeline, PipelineState};
use crate::scheduler::{Scheduler, TimerToken, Wake};
use serde_json::Value;
use sluice_core::{Clock, Event, SystemClock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External consumer of a pipeline's output events: a socket writer, a test
/// collector, a mux session pool.
pub trait EventSink: Send {
    fn on_event(&mut self, event: Event, ops: &mut SinkOps<'_>);

    /// A timer armed through [`SinkOps::schedule`] fired.
    fn on_timer(&mut self, tag: u64, ops: &mut SinkOps<'_>) {
        let _ = (tag, ops);
    }
}

/// Operations available to a sink while it handles an event.
pub struct SinkOps<'a> {
    queue: &'a mut VecDeque<Delivery>,
    pending_release: &'a mut Vec<PipelineHandle>,
    scheduler: &'a mut Scheduler,
    retired_sinks: &'a mut Vec<SinkId>,
    now: Instant,
}

impl SinkOps<'_> {
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn input(&mut self, target: InputRef, event: Event) {
        self.queue.push_back(Delivery::Event { target, event });
    }

    pub fn input_pipeline(&mut self, handle: PipelineHandle, event: Event) {
        self.input(InputRef::head(handle), event);
    }

    pub fn release(&mut self, handle: PipelineHandle) {
        self.pending_release.push(handle);
    }

    pub fn schedule(&mut self, sink: SinkId, delay: Duration, tag: u64) -> TimerToken {
        self.scheduler.set(Wake::Sink { sink, tag }, delay, self.now)
    }

    pub fn cancel_timer(&mut self, token: TimerToken) {
        self.scheduler.cancel(token);
    }

    /// Queue an `on_notify` wake for a filter.
    pub fn notify(&mut self, pipeline: PipelineHandle, filter: u32) {
        self.queue.push_back(Delivery::Notify { pipeline, filter });
    }

    /// Retire a sink (usually the calling one) once this dispatch returns.
    pub fn retire_sink(&mut self, sink: SinkId) {
        self.retired_sinks.push(sink);
    }
}

struct GroupState {
    waiters: Vec<(PipelineHandle, u32)>,
}

/// Clock-independent worker state shared with running filters.
pub(crate) struct WorkerCore {
    pub(crate) arena: PipelineArena,
    pub(crate) queue: VecDeque<Delivery>,
    pub(crate) pending_release: Vec<PipelineHandle>,
    pub(crate) scheduler: Scheduler,
    pub(crate) callbacks: HashMap<u64, (PipelineHandle, u32)>,
    sinks: Vec<Option<Box<dyn EventSink>>>,
    sink_free: Vec<u32>,
    retired_sinks: Vec<SinkId>,
    hubs: Vec<Hub>,
    groups: Vec<GroupState>,
    next_token: u64,
    draining: bool,
}

impl WorkerCore {
    fn new() -> Self {
        Self {
            arena: PipelineArena::new(),
            queue: VecDeque::new(),
            pending_release: Vec::new(),
            scheduler: Scheduler::new(),
            callbacks: HashMap::new(),
            sinks: Vec::new(),
            sink_free: Vec::new(),
            retired_sinks: Vec::new(),
            hubs: Vec::new(),
            groups: Vec::new(),
            next_token: 0,
            draining: false,
        }
    }

    // ── Delivery ────────────────────────────────────────────────────────

    pub(crate) fn push_event(&mut self, target: InputRef, event: Event) {
        self.queue.push_back(Delivery::Event { target, event });
    }

    pub(crate) fn push_notify(&mut self, pipeline: PipelineHandle, filter: u32) {
        self.queue.push_back(Delivery::Notify { pipeline, filter });
    }

    /// Drain the queue to empty: one InputContext frame. Deferred releases
    /// run when the queue is exhausted; anything they enqueue drains too.
    fn drain(&mut self, now: Instant) {
        if self.draining {
            return;
        }
        self.draining = true;
        loop {
            while let Some(delivery) = self.queue.pop_front() {
                self.dispatch(delivery, now);
            }
            if self.pending_release.is_empty() {
                break;
            }
            while let Some(handle) = self.pending_release.pop() {
                self.teardown(handle, now);
            }
        }
        self.draining = false;
    }

    fn dispatch(&mut self, delivery: Delivery, now: Instant) {
        match delivery {
            Delivery::Event { target, event } => self.dispatch_event(target, event, now),
            Delivery::Timer { pipeline, filter, tag } => {
                self.with_filter(pipeline, filter, now, |f, ctx| f.on_timer(ctx, tag));
            }
            Delivery::SinkTimer { sink, tag } => self.sink_timer(sink, tag, now),
            Delivery::Notify { pipeline, filter } => {
                self.with_filter(pipeline, filter, now, |f, ctx| f.on_notify(ctx));
            }
            Delivery::Settle { pipeline, filter, tag, result } => {
                self.with_filter(pipeline, filter, now, |f, ctx| {
                    f.on_settle(ctx, CallbackToken(tag), result)
                });
            }
        }
    }

    fn dispatch_event(&mut self, target: InputRef, event: Event, now: Instant) {
        let Some(pipeline) = self.arena.get_mut(target.pipeline) else {
            return; // stale handle: deliberate no-op
        };
        if pipeline.state == PipelineState::Ended {
            return; // nothing after StreamEnd
        }
        match target.port {
            Port::Filter(index) => {
                if index == 0 && pipeline.tap == TapState::Closed {
                    pipeline.gated.push_back(event);
                    return;
                }
                if pipeline.filters.is_empty() {
                    self.deliver_output(target.pipeline, event, now);
                    return;
                }
                self.with_filter(target.pipeline, index, now, |f, ctx| f.process(ctx, event));
            }
            Port::Reply { filter, tag } => {
                self.with_filter(target.pipeline, filter, now, |f, ctx| {
                    f.on_reply(ctx, tag, event)
                });
            }
            Port::Output => self.deliver_output(target.pipeline, event, now),
        }
    }

    /// Detach filter `index`, run `f` with a context over the whole worker,
    /// then put the filter back (unless its pipeline went away meanwhile).
    fn with_filter(
        &mut self,
        handle: PipelineHandle,
        index: u32,
        now: Instant,
        f: impl FnOnce(&mut Box<dyn crate::filter::Filter>, &mut FilterCtx<'_>),
    ) {
        let Some(pipeline) = self.arena.get_mut(handle) else {
            return;
        };
        let Some(slot) = pipeline.filters.get_mut(index as usize) else {
            return;
        };
        let Some(mut filter) = slot.take() else {
            return;
        };
        {
            let mut ctx = FilterCtx { core: self, now, pipeline: handle, filter: index };
            f(&mut filter, &mut ctx);
        }
        if let Some(pipeline) = self.arena.get_mut(handle) {
            if let Some(slot) = pipeline.filters.get_mut(index as usize) {
                *slot = Some(filter);
            }
        }
    }

    fn deliver_output(&mut self, handle: PipelineHandle, event: Event, now: Instant) {
        let Some(pipeline) = self.arena.get_mut(handle) else {
            return;
        };
        let output = pipeline.output;
        if let Event::StreamEnd(end) = &event {
            pipeline.state = PipelineState::Ended;
            let hook = pipeline
                .layout
                .and_then(|id| pipeline.module.layout(id))
                .and_then(|layout| layout.on_end.clone());
            if let Some(hook) = hook {
                hook(end);
            }
        }
        match output {
            OutputTarget::Input(target) => {
                self.queue.push_back(Delivery::Event { target, event });
            }
            OutputTarget::Sink(id) => self.sink_event(id, event, now),
            OutputTarget::Discard => {}
        }
    }

    fn sink_event(&mut self, id: SinkId, event: Event, now: Instant) {
        let Some(Some(sink)) = self.sinks.get_mut(id.0 as usize) else {
            return;
        };
        let mut ops = SinkOps {
            queue: &mut self.queue,
            pending_release: &mut self.pending_release,
            scheduler: &mut self.scheduler,
            retired_sinks: &mut self.retired_sinks,
            now,
        };
        sink.on_event(event, &mut ops);
        self.reap_sinks();
    }

    fn sink_timer(&mut self, id: SinkId, tag: u64, now: Instant) {
        let Some(Some(sink)) = self.sinks.get_mut(id.0 as usize) else {
            return;
        };
        let mut ops = SinkOps {
            queue: &mut self.queue,
            pending_release: &mut self.pending_release,
            scheduler: &mut self.scheduler,
            retired_sinks: &mut self.retired_sinks,
            now,
        };
        sink.on_timer(tag, &mut ops);
        self.reap_sinks();
    }

    fn reap_sinks(&mut self) {
        while let Some(id) = self.retired_sinks.pop() {
            self.remove_sink(id);
        }
    }

    // ── Spawning ────────────────────────────────────────────────────────

    fn new_group(&mut self) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(GroupState { waiters: Vec::new() });
        id
    }

    pub(crate) fn spawn_root(
        &mut self,
        module: &Arc<Module>,
        layout: LayoutId,
        output: OutputTarget,
        chain: Arc<Vec<ChainEntry>>,
        chain_pos: u32,
    ) -> PipelineHandle {
        let group = self.new_group();
        self.spawn_with(module.clone(), layout, output, Context::new(group), chain, chain_pos)
    }

    /// Spawn a sub-pipeline inheriting `parent`'s module, context group,
    /// and module chain.
    pub(crate) fn spawn_from(
        &mut self,
        parent: PipelineHandle,
        layout: LayoutId,
        output: OutputTarget,
    ) -> Option<PipelineHandle> {
        let p = self.arena.get(parent)?;
        let module = p.module.clone();
        let context = p.context.fork();
        let chain = p.chain.clone();
        let chain_pos = p.chain_pos;
        Some(self.spawn_with(module, layout, output, context, chain, chain_pos))
    }

    /// Spawn the next module on `parent`'s chain, or `None` if exhausted.
    pub(crate) fn spawn_chain_next(
        &mut self,
        parent: PipelineHandle,
        output: OutputTarget,
    ) -> Option<PipelineHandle> {
        let p = self.arena.get(parent)?;
        let entry = p.chain.get(p.chain_pos as usize)?.clone();
        let context = p.context.fork();
        let chain = p.chain.clone();
        let chain_pos = p.chain_pos + 1;
        Some(self.spawn_with(entry.module, entry.layout, output, context, chain, chain_pos))
    }

    fn spawn_with(
        &mut self,
        module: Arc<Module>,
        layout: LayoutId,
        output: OutputTarget,
        context: Context,
        chain: Arc<Vec<ChainEntry>>,
        chain_pos: u32,
    ) -> PipelineHandle {
        let filters = match module.layout(layout) {
            Some(l) => l.filters.iter().map(|f| Some(f.clone_filter())).collect(),
            None => Vec::new(),
        };
        let pipeline =
            Pipeline::new(module, Some(layout), filters, output, context, chain, chain_pos);
        self.arena.insert(pipeline)
    }

    /// Run `on_start` and mark the pipeline running.
    pub(crate) fn start_pipeline(&mut self, handle: PipelineHandle, args: &[Value]) {
        let Some(pipeline) = self.arena.get_mut(handle) else {
            return;
        };
        if pipeline.state != PipelineState::Created {
            return;
        }
        pipeline.state = PipelineState::Running;
        let starting = pipeline
            .layout
            .and_then(|id| pipeline.module.layout(id))
            .and_then(|layout| layout.on_start.clone());
        let events = match starting {
            Some(StartingEvents::Events(events)) => events,
            Some(StartingEvents::Fn(f)) => f(args),
            None => Vec::new(),
        };
        for event in events {
            self.push_event(InputRef::head(handle), event);
        }
    }

    fn teardown(&mut self, handle: PipelineHandle, now: Instant) {
        let Some(mut pipeline) = self.arena.remove(handle) else {
            return;
        };
        for group in &mut self.groups {
            group.waiters.retain(|(p, _)| *p != handle);
        }
        self.callbacks.retain(|_, (p, _)| *p != handle);
        // Reset in reverse order so downstream filters let go first.
        for (index, slot) in pipeline.filters.iter_mut().enumerate().rev() {
            if let Some(mut filter) = slot.take() {
                let mut ctx =
                    FilterCtx { core: self, now, pipeline: handle, filter: index as u32 };
                filter.reset(&mut ctx);
                filter.shutdown();
            }
        }
    }

    // ── Taps ────────────────────────────────────────────────────────────

    pub(crate) fn tap(&self, handle: PipelineHandle) -> TapState {
        self.arena.get(handle).map(|p| p.tap).unwrap_or_default()
    }

    pub(crate) fn set_tap(&mut self, handle: PipelineHandle, state: TapState) {
        let Some(pipeline) = self.arena.get_mut(handle) else {
            return;
        };
        if pipeline.tap == state {
            return;
        }
        pipeline.tap = state;
        if state == TapState::Open {
            let gated: Vec<Event> = pipeline.gated.drain(..).collect();
            let watchers = pipeline.tap_watchers.clone();
            for event in gated {
                self.queue.push_back(Delivery::Event { target: InputRef::head(handle), event });
            }
            for (p, f) in watchers {
                self.push_notify(p, f);
            }
        }
    }

    // ── Context groups ──────────────────────────────────────────────────

    pub(crate) fn add_waiter(&mut self, group: GroupId, pipeline: PipelineHandle, filter: u32) {
        if let Some(state) = self.groups.get_mut(group.0 as usize) {
            if !state.waiters.contains(&(pipeline, filter)) {
                state.waiters.push((pipeline, filter));
            }
        }
    }

    pub(crate) fn remove_waiter(&mut self, group: GroupId, pipeline: PipelineHandle, filter: u32) {
        if let Some(state) = self.groups.get_mut(group.0 as usize) {
            state.waiters.retain(|w| *w != (pipeline, filter));
        }
    }

    pub(crate) fn notify_group(&mut self, group: GroupId) {
        let Some(state) = self.groups.get(group.0 as usize) else {
            return;
        };
        let waiters = state.waiters.clone();
        for (pipeline, filter) in waiters {
            self.push_notify(pipeline, filter);
        }
    }

    // ── Hubs ────────────────────────────────────────────────────────────

    pub(crate) fn new_hub(&mut self) -> HubId {
        let id = HubId(self.hubs.len() as u32);
        self.hubs.push(Hub::new());
        id
    }

    pub(crate) fn hub_join(&mut self, hub: HubId, party: InputRef) {
        if let Some(hub) = self.hubs.get_mut(hub.0 as usize) {
            hub.join(party);
        }
    }

    pub(crate) fn hub_exit(&mut self, hub: HubId, party: InputRef) {
        if let Some(hub) = self.hubs.get_mut(hub.0 as usize) {
            hub.exit(party);
        }
    }

    pub(crate) fn hub_broadcast(&mut self, hub: HubId, event: &Event, from: Option<InputRef>) {
        let Some(hub) = self.hubs.get_mut(hub.0 as usize) else {
            return;
        };
        let queue = &mut self.queue;
        hub.broadcast(event, from, |target, event| {
            queue.push_back(Delivery::Event { target, event });
        });
    }

    // ── Sinks and callbacks ─────────────────────────────────────────────

    pub(crate) fn add_sink(&mut self, sink: Box<dyn EventSink>) -> SinkId {
        if let Some(index) = self.sink_free.pop() {
            self.sinks[index as usize] = Some(sink);
            SinkId(index)
        } else {
            let index = self.sinks.len() as u32;
            self.sinks.push(Some(sink));
            SinkId(index)
        }
    }

    pub(crate) fn remove_sink(&mut self, id: SinkId) {
        if let Some(slot) = self.sinks.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.sink_free.push(id.0);
            }
        }
    }

    fn new_callback_token(&mut self) -> CallbackToken {
        let token = CallbackToken(self.next_token);
        self.next_token += 1;
        token
    }
}

/// The per-thread engine entry point.
pub struct Worker<C: Clock = SystemClock> {
    clock: C,
    core: WorkerCore,
}

impl Worker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Worker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Worker<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, core: WorkerCore::new() }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ── Pipeline lifecycle ──────────────────────────────────────────────

    /// Spawn a root pipeline from a module layout.
    pub fn spawn(
        &mut self,
        module: &Arc<Module>,
        layout: LayoutId,
        output: OutputTarget,
    ) -> PipelineHandle {
        self.core.spawn_root(module, layout, output, Arc::new(Vec::new()), 0)
    }

    /// Spawn a root pipeline by layout name.
    pub fn spawn_named(
        &mut self,
        module: &Arc<Module>,
        name: &str,
        output: OutputTarget,
    ) -> Result<PipelineHandle, LayoutError> {
        let id = module.layout_id(name).ok_or_else(|| LayoutError::UnknownLayout(name.into()))?;
        Ok(self.spawn(module, id, output))
    }

    /// Spawn the entrance of the first module, chaining the rest for
    /// `pipe_next` traversal.
    pub fn spawn_chain(
        &mut self,
        modules: &[Arc<Module>],
        output: OutputTarget,
    ) -> Result<PipelineHandle, LayoutError> {
        let mut entries = Vec::with_capacity(modules.len());
        for module in modules {
            let layout = module.entrance().ok_or(LayoutError::NoEntrance)?;
            entries.push(ChainEntry { module: module.clone(), layout });
        }
        let first = entries.first().cloned().ok_or(LayoutError::NoEntrance)?;
        Ok(self.core.spawn_root(&first.module, first.layout, output, Arc::new(entries), 1))
    }

    /// Run `on_start` and flush.
    pub fn start(&mut self, handle: PipelineHandle, args: &[Value]) {
        self.core.start_pipeline(handle, args);
        self.flush();
    }

    /// Deliver one event into a pipeline's input and drain to quiescence.
    pub fn input(&mut self, handle: PipelineHandle, event: Event) {
        self.core.push_event(InputRef::head(handle), event);
        self.flush();
    }

    /// Release a pipeline (deferred to the drain, like any release).
    pub fn release(&mut self, handle: PipelineHandle) {
        self.core.pending_release.push(handle);
        self.flush();
    }

    pub fn is_live(&self, handle: PipelineHandle) -> bool {
        self.core.arena.contains(handle)
    }

    pub fn pipeline_state(&self, handle: PipelineHandle) -> Option<PipelineState> {
        self.core.arena.get(handle).map(|p| p.state)
    }

    pub fn pipeline_count(&self) -> usize {
        self.core.arena.len()
    }

    // ── Timers ──────────────────────────────────────────────────────────

    /// Fire every due timer and drain.
    pub fn poll_timers(&mut self) {
        let now = self.clock.now();
        for wake in self.core.scheduler.fired(now) {
            match wake {
                Wake::Filter { pipeline, filter, tag } => {
                    self.core.queue.push_back(Delivery::Timer { pipeline, filter, tag });
                }
                Wake::Sink { sink, tag } => {
                    self.core.queue.push_back(Delivery::SinkTimer { sink, tag });
                }
            }
        }
        self.core.drain(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.core.scheduler.next_deadline()
    }

    pub fn has_timers(&self) -> bool {
        self.core.scheduler.has_timers()
    }

    // ── Callbacks (promise bridge) ──────────────────────────────────────

    pub fn new_callback_token(&mut self) -> CallbackToken {
        self.core.new_callback_token()
    }

    /// Settle a pending callback; the owning filter resumes under a fresh
    /// InputContext.
    pub fn settle(&mut self, token: CallbackToken, result: Result<Value, String>) {
        if let Some((pipeline, filter)) = self.core.callbacks.remove(&token.0) {
            self.core.queue.push_back(Delivery::Settle {
                pipeline,
                filter,
                tag: token.0,
                result,
            });
            self.flush();
        }
    }

    // ── Context, taps, hubs, sinks ──────────────────────────────────────

    /// Set a context variable on a pipeline and notify its group.
    pub fn set_var(&mut self, handle: PipelineHandle, key: impl Into<String>, value: Value) {
        let Some(pipeline) = self.core.arena.get_mut(handle) else {
            return;
        };
        pipeline.context.set(key, value);
        let group = pipeline.context.group();
        self.core.notify_group(group);
        self.flush();
    }

    pub fn get_var(&self, handle: PipelineHandle, key: &str) -> Option<Value> {
        self.core.arena.get(handle).and_then(|p| p.context.get(key).cloned())
    }

    pub fn tap(&self, handle: PipelineHandle) -> TapState {
        self.core.tap(handle)
    }

    pub fn close_tap(&mut self, handle: PipelineHandle) {
        self.core.set_tap(handle, TapState::Closed);
    }

    pub fn open_tap(&mut self, handle: PipelineHandle) {
        self.core.set_tap(handle, TapState::Open);
        self.flush();
    }

    pub fn new_hub(&mut self) -> HubId {
        self.core.new_hub()
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) -> SinkId {
        self.core.add_sink(sink)
    }

    pub fn remove_sink(&mut self, sink: SinkId) {
        self.core.remove_sink(sink);
    }

    fn flush(&mut self) {
        let now = self.clock.now();
        self.core.drain(now);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
