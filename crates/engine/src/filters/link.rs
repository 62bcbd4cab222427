// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Splice the stream into a named layout, a computed layout, or a hub.

use crate::arena::PipelineHandle;
use crate::context::Context;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::hub::HubId;
use crate::layout::{LayoutId, SubRef};
use indexmap::IndexMap;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event, EventBuffer};
use std::sync::Arc;

/// What a dynamic link resolves to.
pub enum LinkChoice {
    /// A layout name resolved in the owning module.
    Layout(SmolStr),
    /// A hub to join; replies are whatever other parties broadcast.
    Hub(HubId),
    /// Not ready yet; keep buffering.
    Pending,
}

pub type LinkFn = Arc<dyn Fn(&Context) -> LinkChoice + Send + Sync>;

pub enum LinkTarget {
    Sub(SubRef),
    Fn(LinkFn),
}

/// Spawns (or joins) its target on the first event, replays what was
/// buffered, then forwards transparently. Replies come back out of this
/// filter's successor.
pub struct Link {
    target: LinkTarget,
    started: bool,
    pipeline: Option<PipelineHandle>,
    hub: Option<HubId>,
    buffer: EventBuffer,
}

impl Link {
    pub fn new(target: LinkTarget) -> Self {
        Self { target, started: false, pipeline: None, hub: None, buffer: EventBuffer::new() }
    }

    fn try_start(&mut self, ctx: &mut FilterCtx<'_>) {
        match &self.target {
            LinkTarget::Sub(sub) => {
                if let Some(id) = sub.resolved() {
                    self.start_layout(ctx, id);
                } else {
                    ctx.error(ErrorKind::Runtime("link sub-pipeline unresolved".into()));
                }
            }
            LinkTarget::Fn(f) => {
                let choice = match ctx.context() {
                    Some(context) => f(context),
                    None => LinkChoice::Pending,
                };
                match choice {
                    LinkChoice::Layout(name) => {
                        let id = ctx.module().and_then(|m| m.layout_id(&name));
                        match id {
                            Some(id) => self.start_layout(ctx, id),
                            None => ctx.error(ErrorKind::Runtime(format!(
                                "unknown pipeline layout name: {name}"
                            ))),
                        }
                    }
                    LinkChoice::Hub(hub) => {
                        let party = ctx.reply_ref(0);
                        ctx.hub_join(hub, party);
                        self.hub = Some(hub);
                        self.started = true;
                    }
                    LinkChoice::Pending => {}
                }
            }
        }
    }

    fn start_layout(&mut self, ctx: &mut FilterCtx<'_>, id: LayoutId) {
        if let Some(handle) = ctx.spawn_reply(id, 0) {
            ctx.start(handle, &[]);
            self.pipeline = Some(handle);
            self.started = true;
        }
    }

    fn forward(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if let Some(handle) = self.pipeline {
            ctx.input_pipeline(handle, event);
        } else if let Some(hub) = self.hub {
            let from = ctx.reply_ref(0);
            ctx.hub_broadcast(hub, &event, Some(from));
        }
    }
}

impl Filter for Link {
    fn name(&self) -> &'static str {
        "link"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        let target = match &self.target {
            LinkTarget::Sub(sub) => LinkTarget::Sub(sub.clone()),
            LinkTarget::Fn(f) => LinkTarget::Fn(f.clone()),
        };
        Box::new(Self::new(target))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        let name = self.name();
        if let LinkTarget::Sub(sub) = &mut self.target {
            sub.bind(name, names)?;
        }
        Ok(())
    }

    fn attach_sub(&mut self, sub: SubRef) -> Result<(), LayoutError> {
        self.target = LinkTarget::Sub(sub);
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if !self.started {
            self.try_start(ctx);
        }
        if !self.started {
            self.buffer.push(event);
            return;
        }
        let mut pending = std::mem::take(&mut self.buffer);
        pending.flush(|event| self.forward(ctx, event));
        self.forward(ctx, event);
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64, event: Event) {
        ctx.output(event);
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(handle) = self.pipeline.take() {
            ctx.release(handle);
        }
        if let Some(hub) = self.hub.take() {
            let party = ctx.reply_ref(0);
            ctx.hub_exit(hub, party);
        }
        self.started = false;
        self.buffer.clear();
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
