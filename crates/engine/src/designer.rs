// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builder surface by which hosts describe pipeline layouts.
//!
//! A [`ModuleBuilder`] collects named layouts; each is described through a
//! [`PipelineDesigner`] closure. Joint filters are completed with
//! [`PipelineDesigner::to`] (a name or a prebuilt id) or
//! [`PipelineDesigner::to_inline`] (an anonymous sub-layout). Errors are
//! recorded as they happen and surface from [`ModuleBuilder::build`].

use crate::context::Context;
use crate::error::LayoutError;
use crate::filter::{Filter, Settle};
use crate::filters::deframe::{Deframe, FrameLogicFactory};
use crate::filters::handle::{Handle, HandleFn, HookArg, HookPoint};
use crate::filters::replace::{Replace, ReplaceFn, Replacement};
use crate::filters::{
    AccountSelector, Branch, BranchArm, BranchMode, Demux, Dummy, Dump, Fork, ForkMode,
    HubSource, Link, LinkChoice, LinkFn, LinkTarget, Loop, Mux, MuxOptions, Pipe, PipeArgs,
    PipeNext, PipeTarget, Replay, SelectFn, SessionKeyFn, Swap, Throttle, ThrottleKind,
    ThrottleOptions, Wait,
};
use crate::filters::replay::Delay;
use crate::hub::HubId;
use crate::layout::{EndFn, LayoutId, Module, PipelineLayout, StartingEvents, SubRef};
use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;
use sluice_core::{Data, Event, Message, MessageEnd, MessageStart, StreamEnd};
use std::sync::Arc;
use std::time::Duration;

/// Collects the layouts of one module.
pub struct ModuleBuilder {
    name: SmolStr,
    layouts: Vec<PipelineLayout>,
    names: IndexMap<SmolStr, LayoutId>,
    entrance: Option<SmolStr>,
    errors: Vec<LayoutError>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            layouts: Vec::new(),
            names: IndexMap::new(),
            entrance: None,
            errors: Vec::new(),
        }
    }

    /// Describe a named layout.
    pub fn pipeline(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut PipelineDesigner<'_>),
    ) -> &mut Self {
        if self.names.contains_key(name) {
            self.errors.push(LayoutError::DuplicateLayout(name.into()));
            return self;
        }
        let id = build_layout(self, Some(name.into()), build);
        self.names.insert(name.into(), id);
        self
    }

    /// Mark the entrance layout used when this module sits on a chain.
    pub fn entrance(&mut self, name: &str) -> &mut Self {
        self.entrance = Some(name.into());
        self
    }

    /// Bind every filter and freeze the module.
    pub fn build(mut self) -> Result<Arc<Module>, LayoutError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        let mut module = Module::new(self.name);
        module.names = self.names;
        module.layouts = self.layouts;
        for layout in &mut module.layouts {
            for filter in &mut layout.filters {
                filter.bind(&module.names)?;
            }
        }
        module.entrance = match self.entrance {
            Some(name) => Some(
                module
                    .names
                    .get(&name)
                    .copied()
                    .ok_or(LayoutError::UnknownLayout(name))?,
            ),
            None => None,
        };
        Ok(Arc::new(module))
    }
}

fn build_layout(
    builder: &mut ModuleBuilder,
    name: Option<SmolStr>,
    build: impl FnOnce(&mut PipelineDesigner<'_>),
) -> LayoutId {
    let mut designer =
        PipelineDesigner { builder, layout: PipelineLayout::new(name), pending_joint: None };
    build(&mut designer);
    let PipelineDesigner { builder, layout, pending_joint } = designer;
    if let Some(filter) = pending_joint {
        builder.errors.push(LayoutError::MissingTo(filter));
    }
    let id = LayoutId(builder.layouts.len() as u32);
    builder.layouts.push(layout);
    id
}

/// Appends filters to one layout under construction.
pub struct PipelineDesigner<'a> {
    builder: &'a mut ModuleBuilder,
    layout: PipelineLayout,
    pending_joint: Option<&'static str>,
}

impl PipelineDesigner<'_> {
    fn fail(&mut self, error: LayoutError) -> &mut Self {
        self.builder.errors.push(error);
        self
    }

    fn push(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        if let Some(name) = self.pending_joint.take() {
            return self.fail(LayoutError::MissingTo(name));
        }
        self.layout.filters.push(filter);
        self
    }

    fn push_joint(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        let name = filter.name();
        self.push(filter);
        self.pending_joint = Some(name);
        self
    }

    /// Build an anonymous sub-layout for use as a target.
    pub fn inline(&mut self, build: impl FnOnce(&mut PipelineDesigner<'_>)) -> LayoutId {
        build_layout(self.builder, None, build)
    }

    // ── Lifecycle hooks ─────────────────────────────────────────────────

    pub fn on_start(&mut self, events: Vec<Event>) -> &mut Self {
        self.set_on_start(StartingEvents::Events(events))
    }

    pub fn on_start_fn(
        &mut self,
        f: impl Fn(&[Value]) -> Vec<Event> + Send + Sync + 'static,
    ) -> &mut Self {
        self.set_on_start(StartingEvents::Fn(Arc::new(f)))
    }

    fn set_on_start(&mut self, events: StartingEvents) -> &mut Self {
        if !self.layout.filters.is_empty() {
            return self.fail(LayoutError::StartAfterFilters);
        }
        if self.layout.on_start.is_some() {
            return self.fail(LayoutError::DuplicateOnStart);
        }
        self.layout.on_start = Some(events);
        self
    }

    pub fn on_end(&mut self, f: impl Fn(&StreamEnd) + Send + Sync + 'static) -> &mut Self {
        if !self.layout.filters.is_empty() {
            return self.fail(LayoutError::EndAfterFilters);
        }
        if self.layout.on_end.is_some() {
            return self.fail(LayoutError::DuplicateOnEnd);
        }
        self.layout.on_end = Some(Arc::new(f) as EndFn);
        self
    }

    // ── Joint completion ────────────────────────────────────────────────

    /// Bind the most recently appended joint filter to a sub-layout.
    pub fn to(&mut self, sub: impl Into<SubRef>) -> &mut Self {
        if self.pending_joint.take().is_none() {
            return self.fail(LayoutError::DanglingTo);
        }
        let sub = sub.into();
        let result = match self.layout.filters.last_mut() {
            Some(filter) => filter.attach_sub(sub),
            None => Err(LayoutError::DanglingTo),
        };
        if let Err(error) = result {
            return self.fail(error);
        }
        self
    }

    /// Bind the most recent joint filter to an anonymous inline layout.
    pub fn to_inline(&mut self, build: impl FnOnce(&mut PipelineDesigner<'_>)) -> &mut Self {
        let id = self.inline(build);
        self.to(id)
    }

    // ── Joint filters ───────────────────────────────────────────────────

    pub fn demux(&mut self) -> &mut Self {
        self.push_joint(Box::new(Demux::new(SubRef::Unset)))
    }

    pub fn mux(
        &mut self,
        key: impl Fn(&Event, &Context) -> SmolStr + Send + Sync + 'static,
        options: MuxOptions,
    ) -> &mut Self {
        let key: SessionKeyFn = Arc::new(key);
        self.push_joint(Box::new(Mux::new(SubRef::Unset, key, options)))
    }

    pub fn fork(&mut self, seeds: impl Into<Option<Vec<Value>>>) -> &mut Self {
        self.push_joint(Box::new(Fork::new(ForkMode::Fork, seeds.into(), SubRef::Unset)))
    }

    pub fn fork_join(&mut self, seeds: impl Into<Option<Vec<Value>>>) -> &mut Self {
        self.push_joint(Box::new(Fork::new(ForkMode::Join, seeds.into(), SubRef::Unset)))
    }

    pub fn fork_race(&mut self, seeds: impl Into<Option<Vec<Value>>>) -> &mut Self {
        self.push_joint(Box::new(Fork::new(ForkMode::Race, seeds.into(), SubRef::Unset)))
    }

    pub fn branch(&mut self, arms: Vec<BranchArm>) -> &mut Self {
        self.push(Box::new(Branch::new(BranchMode::Immediate, arms)))
    }

    pub fn branch_message_start(&mut self, arms: Vec<BranchArm>) -> &mut Self {
        self.push(Box::new(Branch::new(BranchMode::OnMessageStart, arms)))
    }

    pub fn branch_message(&mut self, arms: Vec<BranchArm>) -> &mut Self {
        self.push(Box::new(Branch::new(BranchMode::OnMessage, arms)))
    }

    pub fn link(&mut self, name: &str) -> &mut Self {
        self.push(Box::new(Link::new(LinkTarget::Sub(SubRef::name(name)))))
    }

    pub fn link_with(
        &mut self,
        f: impl Fn(&Context) -> LinkChoice + Send + Sync + 'static,
    ) -> &mut Self {
        let f: LinkFn = Arc::new(f);
        self.push(Box::new(Link::new(LinkTarget::Fn(f))))
    }

    pub fn pipe(&mut self) -> &mut Self {
        self.push_joint(Box::new(Pipe::new(
            PipeTarget::Sub(SubRef::Unset),
            IndexMap::new(),
            PipeArgs::None,
        )))
    }

    pub fn pipe_select(
        &mut self,
        select: impl Fn(&Event, &Context) -> Option<SmolStr> + Send + Sync + 'static,
        map: IndexMap<SmolStr, SubRef>,
        init_args: PipeArgs,
    ) -> &mut Self {
        let select: SelectFn = Arc::new(select);
        self.push(Box::new(Pipe::new(PipeTarget::Select(select), map, init_args)))
    }

    pub fn pipe_next(&mut self) -> &mut Self {
        self.push(Box::new(PipeNext::new()))
    }

    pub fn swap(&mut self, hub: HubId) -> &mut Self {
        self.push(Box::new(Swap::new(HubSource::Id(hub))))
    }

    pub fn swap_with(
        &mut self,
        f: impl Fn(&Context) -> Option<HubId> + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(Box::new(Swap::new(HubSource::Fn(Arc::new(f)))))
    }

    pub fn replay(&mut self, delay: Duration) -> &mut Self {
        self.push_joint(Box::new(Replay::new(SubRef::Unset, Delay::Fixed(delay))))
    }

    pub fn replay_with(
        &mut self,
        delay: impl Fn() -> Duration + Send + Sync + 'static,
    ) -> &mut Self {
        self.push_joint(Box::new(Replay::new(SubRef::Unset, Delay::Fn(Arc::new(delay)))))
    }

    pub fn loop_(&mut self) -> &mut Self {
        self.push_joint(Box::new(Loop::new(SubRef::Unset)))
    }

    pub fn wait(&mut self, cond: impl Fn(&Context) -> bool + Send + Sync + 'static) -> &mut Self {
        self.push(Box::new(Wait::new(Arc::new(cond), None)))
    }

    /// `timeout` of zero means "never time out".
    pub fn wait_timeout(
        &mut self,
        cond: impl Fn(&Context) -> bool + Send + Sync + 'static,
        timeout: Duration,
    ) -> &mut Self {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.push(Box::new(Wait::new(Arc::new(cond), timeout)))
    }

    // ── Throttle family ─────────────────────────────────────────────────

    pub fn throttle_message_rate(&mut self, quota: f64, account: AccountSelector) -> &mut Self {
        let options = ThrottleOptions { quota, account, ..ThrottleOptions::new(quota) };
        self.push(Box::new(Throttle::new(ThrottleKind::MessageRate, options)))
    }

    pub fn throttle_data_rate(&mut self, quota: f64, account: AccountSelector) -> &mut Self {
        let options = ThrottleOptions { quota, account, ..ThrottleOptions::new(quota) };
        self.push(Box::new(Throttle::new(ThrottleKind::DataRate, options)))
    }

    pub fn throttle_concurrency(&mut self, quota: f64, account: AccountSelector) -> &mut Self {
        let options = ThrottleOptions { quota, account, ..ThrottleOptions::new(quota) };
        self.push(Box::new(Throttle::new(ThrottleKind::Concurrency, options)))
    }

    // ── Handle family ───────────────────────────────────────────────────

    pub fn handle_stream_start(
        &mut self,
        f: impl Fn(&Event) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::StreamStart(event) => f(event),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::StreamStart, None, cb)))
    }

    pub fn handle_message_start(
        &mut self,
        f: impl Fn(&MessageStart) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::MessageStart(start) => f(start),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::MessageStart, None, cb)))
    }

    pub fn handle_data(
        &mut self,
        f: impl Fn(&Data) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::Data(data) => f(data),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::Data, None, cb)))
    }

    pub fn handle_message_body(
        &mut self,
        size_limit: Option<usize>,
        f: impl Fn(&Data) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::Body(body) => f(body),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::MessageBody, size_limit, cb)))
    }

    pub fn handle_message(
        &mut self,
        size_limit: Option<usize>,
        f: impl Fn(&Message) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::Message(message) => f(message),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::Message, size_limit, cb)))
    }

    /// The generic hook: the callback sees every event.
    pub fn handle_event(
        &mut self,
        f: impl Fn(&Event) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::Event(event) => f(event),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::Any, None, cb)))
    }

    pub fn handle_message_end(
        &mut self,
        f: impl Fn(&MessageEnd) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::MessageEnd(end) => f(end),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::MessageEnd, None, cb)))
    }

    pub fn handle_stream_end(
        &mut self,
        f: impl Fn(&StreamEnd) -> Result<Settle, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: HandleFn = Arc::new(move |arg| match arg {
            HookArg::StreamEnd(end) => f(end),
            _ => Ok(Settle::Done),
        });
        self.push(Box::new(Handle::new(HookPoint::StreamEnd, None, cb)))
    }

    // ── Replace family ──────────────────────────────────────────────────

    pub fn replace_stream_start(
        &mut self,
        f: impl Fn(&Event) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::StreamStart(event) => f(event),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::StreamStart, None, cb)))
    }

    pub fn replace_message_start(
        &mut self,
        f: impl Fn(&MessageStart) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::MessageStart(start) => f(start),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::MessageStart, None, cb)))
    }

    pub fn replace_data(
        &mut self,
        f: impl Fn(&Data) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::Data(data) => f(data),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::Data, None, cb)))
    }

    pub fn replace_message_body(
        &mut self,
        size_limit: Option<usize>,
        f: impl Fn(&Data) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::Body(body) => f(body),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::MessageBody, size_limit, cb)))
    }

    pub fn replace_message(
        &mut self,
        size_limit: Option<usize>,
        f: impl Fn(&Message) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::Message(message) => f(message),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::Message, size_limit, cb)))
    }

    /// Substitutes the terminal itself; a replacement without a
    /// `StreamEnd` leaves the channel open for the caller to close.
    pub fn replace_stream_end(
        &mut self,
        f: impl Fn(&StreamEnd) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::StreamEnd(end) => f(end),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::StreamEnd, None, cb)))
    }

    /// The generic mirror: the callback's return replaces every event.
    pub fn replace_event(
        &mut self,
        f: impl Fn(&Event) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::Event(event) => f(event),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::Any, None, cb)))
    }

    pub fn replace_message_end(
        &mut self,
        f: impl Fn(&MessageEnd) -> Result<Replacement, String> + Send + Sync + 'static,
    ) -> &mut Self {
        let cb: ReplaceFn = Arc::new(move |arg| match arg {
            HookArg::MessageEnd(end) => f(end),
            _ => Ok(Replacement::Drop),
        });
        self.push(Box::new(Replace::new(HookPoint::MessageEnd, None, cb)))
    }

    // ── Leaf filters ────────────────────────────────────────────────────

    pub fn deframe(&mut self, initial_state: u32, factory: FrameLogicFactory) -> &mut Self {
        self.push(Box::new(Deframe::new(initial_state, factory)))
    }

    pub fn dummy(&mut self) -> &mut Self {
        self.push(Box::new(Dummy))
    }

    pub fn dump(&mut self, tag: Option<&str>) -> &mut Self {
        self.push(Box::new(Dump::new(tag.map(Into::into))))
    }

    /// Test-support: record every passing event.
    #[cfg(any(test, feature = "test-support"))]
    pub fn probe(&mut self, events: crate::test_support::Recording) -> &mut Self {
        self.push(Box::new(crate::test_support::Probe::new(events)))
    }
}

#[cfg(test)]
#[path = "designer_tests.rs"]
mod tests;
