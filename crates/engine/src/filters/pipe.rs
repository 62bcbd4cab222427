// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic pipeline splicing and module-chain traversal.

use crate::arena::PipelineHandle;
use crate::context::Context;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::layout::{LayoutId, SubRef};
use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event, EventBuffer};
use std::sync::Arc;

pub type SelectFn = Arc<dyn Fn(&Event, &Context) -> Option<SmolStr> + Send + Sync>;

/// How `pipe` picks its target.
pub enum PipeTarget {
    /// A fixed sub-layout.
    Sub(SubRef),
    /// A key computed from the first event, looked up in the target map.
    Select(SelectFn),
}

/// Start arguments threaded to the spawned pipeline's `on_start`.
#[derive(Clone, Default)]
pub enum PipeArgs {
    #[default]
    None,
    Args(Vec<Value>),
    Fn(Arc<dyn Fn(&Event) -> Vec<Value> + Send + Sync>),
}

/// Spawns the resolved target on the first event and becomes transparent.
pub struct Pipe {
    target: PipeTarget,
    map: IndexMap<SmolStr, SubRef>,
    init_args: PipeArgs,
    started: bool,
    pipeline: Option<PipelineHandle>,
    buffer: EventBuffer,
}

impl Pipe {
    pub fn new(target: PipeTarget, map: IndexMap<SmolStr, SubRef>, init_args: PipeArgs) -> Self {
        Self { target, map, init_args, started: false, pipeline: None, buffer: EventBuffer::new() }
    }

    fn try_start(&mut self, ctx: &mut FilterCtx<'_>, event: &Event) {
        let id = match &self.target {
            PipeTarget::Sub(sub) => match sub.resolved() {
                Some(id) => id,
                None => {
                    ctx.error(ErrorKind::Runtime("pipe target unresolved".into()));
                    return;
                }
            },
            PipeTarget::Select(select) => {
                let key = match ctx.context() {
                    Some(context) => select(event, context),
                    None => None,
                };
                let Some(key) = key else {
                    return; // not decidable yet; keep buffering
                };
                match self.map.get(&key).and_then(|sub| sub.resolved()) {
                    Some(id) => id,
                    None => {
                        ctx.error(ErrorKind::Runtime(format!("pipeline '{key}' not found")));
                        return;
                    }
                }
            }
        };
        let Some(handle) = ctx.spawn_chained(id) else {
            return;
        };
        let args = match &self.init_args {
            PipeArgs::None => Vec::new(),
            PipeArgs::Args(args) => args.clone(),
            PipeArgs::Fn(f) => f(event),
        };
        ctx.start(handle, &args);
        self.pipeline = Some(handle);
        self.started = true;
    }
}

impl Filter for Pipe {
    fn name(&self) -> &'static str {
        "pipe"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        let target = match &self.target {
            PipeTarget::Sub(sub) => PipeTarget::Sub(sub.clone()),
            PipeTarget::Select(f) => PipeTarget::Select(f.clone()),
        };
        Box::new(Self::new(target, self.map.clone(), self.init_args.clone()))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        let name = self.name();
        if let PipeTarget::Sub(sub) = &mut self.target {
            sub.bind(name, names)?;
        }
        for sub in self.map.values_mut() {
            sub.bind(name, names)?;
        }
        Ok(())
    }

    fn attach_sub(&mut self, sub: SubRef) -> Result<(), LayoutError> {
        self.target = PipeTarget::Sub(sub);
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if !self.started {
            self.try_start(ctx, &event);
        }
        if !self.started {
            self.buffer.push(event);
            return;
        }
        let Some(handle) = self.pipeline else {
            return;
        };
        self.buffer.flush(|event| ctx.input_pipeline(handle, event));
        ctx.input_pipeline(handle, event);
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(handle) = self.pipeline.take() {
            ctx.release(handle);
        }
        self.started = false;
        self.buffer.clear();
    }
}

/// Forward into the next module's entrance pipeline on the chain; with no
/// next module, forward untouched.
#[derive(Default)]
pub struct PipeNext {
    started: bool,
    next: Option<PipelineHandle>,
}

impl PipeNext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for PipeNext {
    fn name(&self) -> &'static str {
        "pipeNext"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if !self.started {
            self.next = ctx.spawn_chain_next();
            if let Some(handle) = self.next {
                ctx.start(handle, &[]);
            }
            self.started = true;
        }
        match self.next {
            Some(handle) => ctx.input_pipeline(handle, event),
            None => ctx.output(event),
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(handle) = self.next.take() {
            ctx.release(handle);
        }
        self.started = false;
    }
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
