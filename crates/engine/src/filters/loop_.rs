// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feeds a sub-pipeline's replies back into its own input.

use crate::arena::PipelineHandle;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::layout::{LayoutId, SubRef};
use indexmap::IndexMap;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event};

/// Single sub-pipeline whose output re-enters its input.
///
/// The back-feed goes through the worker queue, so a reply produced while
/// upstream events are still delivering is simply ordered behind them;
/// recursion depth never grows.
pub struct Loop {
    sub: SubRef,
    pipeline: Option<PipelineHandle>,
}

impl Loop {
    pub fn new(sub: SubRef) -> Self {
        Self { sub, pipeline: None }
    }

    fn ensure_started(&mut self, ctx: &mut FilterCtx<'_>) -> Option<PipelineHandle> {
        if self.pipeline.is_none() {
            let id = self.sub.resolved()?;
            let handle = ctx.spawn_reply(id, 0)?;
            ctx.start(handle, &[]);
            self.pipeline = Some(handle);
        }
        self.pipeline
    }
}

impl Filter for Loop {
    fn name(&self) -> &'static str {
        "loop"
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
        match self.ensure_started(ctx) {
            Some(handle) => ctx.input_pipeline(handle, event),
            None => ctx.error(ErrorKind::Runtime("loop sub-pipeline unresolved".into())),
        }
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64, event: Event) {
        ctx.output(event.clone());
        if let Some(handle) = self.pipeline {
            ctx.input_pipeline(handle, event);
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(handle) = self.pipeline.take() {
            ctx.release(handle);
        }
    }
}

#[cfg(test)]
#[path = "loop_tests.rs"]
mod tests;
