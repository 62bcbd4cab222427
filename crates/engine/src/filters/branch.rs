// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route a stream to one of several sub-layouts by condition.

use crate::arena::PipelineHandle;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::layout::{LayoutId, SubRef};
use indexmap::IndexMap;
use smol_str::SmolStr;
use sluice_core::{Event, EventBuffer, Message, MessageReader, MessageStart};
use std::sync::Arc;

/// What the predicates get to look at before the branch commits.
pub enum BranchArg<'a> {
    /// `branch`: decides at the first event, sight unseen.
    None,
    /// `branchMessageStart`: the message head.
    Head(&'a MessageStart),
    /// `branchMessage`: the whole buffered message.
    Message(&'a Message),
}

pub type BranchCondFn = Arc<dyn Fn(&BranchArg<'_>) -> bool + Send + Sync>;

/// When the decision happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchMode {
    Immediate,
    OnMessageStart,
    OnMessage,
}

/// `(condition, sub-layout)` arm; a `None` condition is the default arm.
pub struct BranchArm {
    pub cond: Option<BranchCondFn>,
    pub sub: SubRef,
}

impl BranchArm {
    pub fn when(
        cond: impl Fn(&BranchArg<'_>) -> bool + Send + Sync + 'static,
        sub: impl Into<SubRef>,
    ) -> Self {
        Self { cond: Some(Arc::new(cond)), sub: sub.into() }
    }

    /// The default arm: always taken when reached.
    pub fn otherwise(sub: impl Into<SubRef>) -> Self {
        Self { cond: None, sub: sub.into() }
    }
}

/// Buffers events until a predicate commits to an arm, then replays the
/// buffer through the chosen sub-pipeline and becomes transparent to it.
/// With no match and no default, events are dropped — not an error.
pub struct Branch {
    mode: BranchMode,
    arms: Vec<BranchArm>,
    reader: MessageReader,
    buffer: EventBuffer,
    chosen: Option<PipelineHandle>,
    decided: bool,
}

impl Branch {
    pub fn new(mode: BranchMode, arms: Vec<BranchArm>) -> Self {
        Self {
            mode,
            arms,
            reader: MessageReader::new(),
            buffer: EventBuffer::new(),
            chosen: None,
            decided: false,
        }
    }

    fn choose(&mut self, ctx: &mut FilterCtx<'_>, arg: &BranchArg<'_>) {
        self.decided = true;
        let mut target = None;
        for arm in &self.arms {
            let hit = match &arm.cond {
                Some(cond) => cond(arg),
                None => true,
            };
            if hit {
                target = arm.sub.resolved();
                break;
            }
        }
        match target {
            Some(id) => {
                if let Some(handle) = ctx.spawn_chained(id) {
                    ctx.start(handle, &[]);
                    self.chosen = Some(handle);
                    self.buffer.flush(|event| ctx.input_pipeline(handle, event));
                    return;
                }
                self.buffer.clear();
            }
            None => {
                // No arm matched: the stream is silently discarded.
                self.buffer.clear();
            }
        }
    }
}

impl Filter for Branch {
    fn name(&self) -> &'static str {
        match self.mode {
            BranchMode::Immediate => "branch",
            BranchMode::OnMessageStart => "branchMessageStart",
            BranchMode::OnMessage => "branchMessage",
        }
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        let arms = self
            .arms
            .iter()
            .map(|arm| BranchArm { cond: arm.cond.clone(), sub: arm.sub.clone() })
            .collect();
        Box::new(Self::new(self.mode, arms))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        let name = self.name();
        for arm in &mut self.arms {
            arm.sub.bind(name, names)?;
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if self.decided {
            match self.chosen {
                Some(handle) => ctx.input_pipeline(handle, event),
                None => {}
            }
            return;
        }

        self.buffer.push(event.clone());
        match self.mode {
            BranchMode::Immediate => self.choose(ctx, &BranchArg::None),
            BranchMode::OnMessageStart => {
                if let Event::MessageStart(start) = &event {
                    self.choose(ctx, &BranchArg::Head(start));
                }
            }
            BranchMode::OnMessage => {
                if let Some(message) = self.reader.read(&event) {
                    self.choose(ctx, &BranchArg::Message(&message));
                }
            }
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(handle) = self.chosen.take() {
            ctx.release(handle);
        }
        self.decided = false;
        self.reader.reset();
        self.buffer.clear();
    }
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
