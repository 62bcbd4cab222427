// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Holds events until a condition over the context group becomes true.

use crate::context::Context;
use crate::filter::{Filter, FilterCtx};
use crate::scheduler::TimerToken;
use sluice_core::{Event, EventBuffer};
use std::sync::Arc;
use std::time::Duration;

pub type CondFn = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Buffers incoming events while `condition` is false; re-evaluates on
/// context-group notifications. An optional timeout resolves the wait
/// unconditionally; `None` (spelled `0` by hosts) never arms a timer.
pub struct Wait {
    condition: CondFn,
    timeout: Option<Duration>,
    fulfilled: bool,
    waiting: bool,
    buffer: EventBuffer,
    timer: Option<TimerToken>,
}

impl Wait {
    pub fn new(condition: CondFn, timeout: Option<Duration>) -> Self {
        Self {
            condition,
            timeout,
            fulfilled: false,
            waiting: false,
            buffer: EventBuffer::new(),
            timer: None,
        }
    }

    fn check(&self, ctx: &FilterCtx<'_>) -> bool {
        match ctx.context() {
            Some(context) => (self.condition)(context),
            None => false,
        }
    }

    fn fulfill(&mut self, ctx: &mut FilterCtx<'_>) {
        if self.fulfilled {
            return;
        }
        self.fulfilled = true;
        if let Some(token) = self.timer.take() {
            ctx.cancel_timer(token);
        }
        if self.waiting {
            ctx.unwait();
            self.waiting = false;
        }
        self.buffer.flush(|event| ctx.output(event));
    }
}

impl Filter for Wait {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.condition.clone(), self.timeout))
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if self.fulfilled {
            ctx.output(event);
            return;
        }
        if self.check(ctx) {
            self.fulfill(ctx);
            ctx.output(event);
            return;
        }
        if self.buffer.is_empty() {
            if let Some(timeout) = self.timeout {
                self.timer = Some(ctx.schedule(timeout, 0));
            }
        }
        if !self.waiting {
            ctx.wait();
            self.waiting = true;
        }
        self.buffer.push(event);
    }

    fn on_notify(&mut self, ctx: &mut FilterCtx<'_>) {
        if !self.fulfilled && self.check(ctx) {
            self.fulfill(ctx);
        }
    }

    fn on_timer(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64) {
        self.timer = None;
        self.fulfill(ctx);
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(token) = self.timer.take() {
            ctx.cancel_timer(token);
        }
        if self.waiting {
            ctx.unwait();
            self.waiting = false;
        }
        self.fulfilled = false;
        self.buffer.clear();
    }
}

#[cfg(test)]
#[path = "wait_tests.rs"]
mod tests;
