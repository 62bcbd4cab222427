// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clone the event stream into side branches.

use crate::arena::PipelineHandle;
use crate::error::LayoutError;
use crate::filter::{Filter, FilterCtx};
use crate::layout::{LayoutId, SubRef};
use indexmap::IndexMap;
use serde_json::{json, Value};
use smol_str::SmolStr;
use sluice_core::{ErrorKind, Event, EventBuffer};

/// How branch output relates to the main stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkMode {
    /// Main output passes the original events through; branch output is
    /// ignored except for terminal events.
    Fork,
    /// Main output is held until every branch reached `StreamEnd`.
    Join,
    /// The first branch to produce output wins and becomes the main output.
    Race,
}

/// Spawns one branch per seed value (or a single unseeded branch) and
/// clones every arriving event to all of them.
pub struct Fork {
    mode: ForkMode,
    seeds: Option<Vec<Value>>,
    sub: SubRef,
    branches: Vec<PipelineHandle>,
    started: bool,
    waiting: bool,
    ended: usize,
    winner: Option<u64>,
    buffer: EventBuffer,
}

impl Fork {
    pub fn new(mode: ForkMode, seeds: Option<Vec<Value>>, sub: SubRef) -> Self {
        Self {
            mode,
            seeds,
            sub,
            branches: Vec::new(),
            started: false,
            waiting: false,
            ended: 0,
            winner: None,
            buffer: EventBuffer::new(),
        }
    }

    fn start_branches(&mut self, ctx: &mut FilterCtx<'_>) -> bool {
        let Some(id) = self.sub.resolved() else {
            return false;
        };
        match self.seeds.clone() {
            Some(seeds) => {
                for (index, seed) in seeds.into_iter().enumerate() {
                    let tag = index as u64;
                    let Some(handle) = ctx.spawn_reply(id, tag) else {
                        continue;
                    };
                    ctx.start(handle, &[seed, json!(index)]);
                    self.branches.push(handle);
                }
            }
            None => {
                if let Some(handle) = ctx.spawn_reply(id, 0) {
                    ctx.start(handle, &[]);
                    self.branches.push(handle);
                }
            }
        }
        self.waiting = self.mode == ForkMode::Join && !self.branches.is_empty();
        self.started = true;
        true
    }
}

impl Filter for Fork {
    fn name(&self) -> &'static str {
        match self.mode {
            ForkMode::Fork => "fork",
            ForkMode::Join => "forkJoin",
            ForkMode::Race => "forkRace",
        }
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.mode, self.seeds.clone(), self.sub.clone()))
    }

    fn bind(&mut self, names: &IndexMap<SmolStr, LayoutId>) -> Result<(), LayoutError> {
        self.sub.bind(self.name(), names)
    }

    fn attach_sub(&mut self, sub: SubRef) -> Result<(), LayoutError> {
        self.sub = sub;
        Ok(())
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if !self.started && !self.start_branches(ctx) {
            ctx.error(ErrorKind::Runtime("fork sub-pipeline unresolved".into()));
            return;
        }
        for handle in self.branches.clone() {
            ctx.input_pipeline(handle, event.clone());
        }
        if self.waiting {
            self.buffer.push(event);
        } else if self.mode != ForkMode::Race {
            ctx.output(event);
        }
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, tag: u64, event: Event) {
        match self.mode {
            ForkMode::Join => {
                if event.is_stream_end() {
                    self.ended += 1;
                    if let Some(handle) = self.branches.get(tag as usize).copied() {
                        ctx.release(handle);
                    }
                    if self.ended >= self.branches.len() && self.waiting {
                        self.waiting = false;
                        self.buffer.flush(|event| ctx.output(event));
                    }
                }
            }
            ForkMode::Race => {
                let winner = *self.winner.get_or_insert(tag);
                if winner == tag {
                    ctx.output(event);
                } else if event.is_stream_end() {
                    // Losing branch finished; drop its terminal silently.
                    if let Some(handle) = self.branches.get(tag as usize).copied() {
                        ctx.release(handle);
                    }
                }
            }
            ForkMode::Fork => {
                if event.is_stream_end() {
                    if let Some(handle) = self.branches.get(tag as usize).copied() {
                        ctx.release(handle);
                    }
                    ctx.output(event);
                }
            }
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        for handle in self.branches.drain(..) {
            ctx.release(handle);
        }
        self.started = false;
        self.waiting = false;
        self.ended = 0;
        self.winner = None;
        self.buffer.clear();
    }
}

#[cfg(test)]
#[path = "fork_tests.rs"]
mod tests;
