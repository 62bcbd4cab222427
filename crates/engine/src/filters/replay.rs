// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffered retry on the `Replay` sentinel.

use crate::arena::PipelineHandle;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::layout::{LayoutId, SubRef};
use crate::scheduler::TimerToken;
use indexmap::IndexMap;
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event, EventBuffer};
use std::sync::Arc;
use std::time::Duration;

/// Replay delay: static, or computed per retry.
#[derive(Clone)]
pub enum Delay {
    Fixed(Duration),
    Fn(Arc<dyn Fn() -> Duration + Send + Sync>),
}

impl Delay {
    fn value(&self) -> Duration {
        match self {
            Delay::Fixed(d) => *d,
            Delay::Fn(f) => f(),
        }
    }
}

/// Buffers every upstream event. When the sub-pipeline replies with
/// `StreamEnd(Replay)`, the current sub-pipeline is cancelled, a timer runs
/// the delay, and a fresh sub-pipeline receives the buffered events
/// verbatim. Any other `StreamEnd` passes through and ends replay mode.
pub struct Replay {
    sub: SubRef,
    delay: Delay,
    buffer: EventBuffer,
    pipeline: Option<PipelineHandle>,
    timer: Option<TimerToken>,
    /// Spawn counter; replies tagged with an older epoch are stale.
    epoch: u64,
}

impl Replay {
    pub fn new(sub: SubRef, delay: Delay) -> Self {
        Self {
            sub,
            delay,
            buffer: EventBuffer::new(),
            pipeline: None,
            timer: None,
            epoch: 0,
        }
    }

    fn spawn(&mut self, ctx: &mut FilterCtx<'_>) -> Option<PipelineHandle> {
        let id = self.sub.resolved()?;
        let handle = ctx.spawn_reply(id, self.epoch)?;
        ctx.start(handle, &[]);
        self.pipeline = Some(handle);
        Some(handle)
    }
}

impl Filter for Replay {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.sub.clone(), self.delay.clone()))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        self.sub.bind(self.name(), names)
    }

    fn attach_sub(&mut self, sub: SubRef) -> Result<(), LayoutError> {
        self.sub = sub;
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if self.pipeline.is_none() && self.timer.is_none() {
            if self.spawn(ctx).is_none() {
                ctx.error(ErrorKind::Runtime("replay sub-pipeline unresolved".into()));
                return;
            }
        }
        self.buffer.push(event.clone());
        if let Some(handle) = self.pipeline {
            ctx.input_pipeline(handle, event);
        }
        // While a replay is pending, events only accumulate in the buffer.
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, tag: u64, event: Event) {
        if tag != self.epoch {
            return; // reply from a cancelled attempt
        }
        if let Event::StreamEnd(end) = &event {
            if end.error() == &ErrorKind::Replay {
                if self.timer.is_none() {
                    if let Some(handle) = self.pipeline.take() {
                        ctx.release(handle);
                    }
                    self.epoch += 1;
                    self.timer = Some(ctx.schedule(self.delay.value(), 0));
                }
                return;
            }
        }
        ctx.output(event);
    }

    fn on_timer(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64) {
        self.timer = None;
        if self.spawn(ctx).is_none() {
            ctx.error(ErrorKind::Runtime("replay sub-pipeline unresolved".into()));
            return;
        }
        let Some(handle) = self.pipeline else {
            return;
        };
        self.buffer.iterate(|event| {
            ctx.input_pipeline(handle, event.clone());
        });
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(token) = self.timer.take() {
            ctx.cancel_timer(token);
        }
        if let Some(handle) = self.pipeline.take() {
            ctx.release(handle);
        }
        self.buffer.clear();
        self.epoch += 1;
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
