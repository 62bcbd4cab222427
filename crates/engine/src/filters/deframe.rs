// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filter façade over the core byte-level state machine.

use crate::filter::{Filter, FilterCtx};
use sluice_core::{Data, Deframer, Event, FrameLogic};
use std::sync::Arc;

pub type FrameLogicFactory = Arc<dyn Fn() -> Box<dyn FrameLogic + Send + Sync> + Send + Sync>;

/// Drives `Data` frames through a codec's framing machine; forwards
/// whatever events the machine emits. `StreamEnd` passes through and
/// rewinds the machine. Other non-`Data` frames are dropped — this is a
/// byte-level filter.
pub struct Deframe {
    factory: FrameLogicFactory,
    initial_state: u32,
    logic: Box<dyn FrameLogic + Send + Sync>,
    machine: Deframer,
}

impl Deframe {
    pub fn new(initial_state: u32, factory: FrameLogicFactory) -> Self {
        let logic = factory();
        Self { factory, initial_state, logic, machine: Deframer::new(initial_state) }
    }

    fn emit(&mut self, ctx: &mut FilterCtx<'_>, data: &Data) {
        let mut out = Vec::new();
        self.machine.deframe(self.logic.as_mut(), data, &mut out);
        for event in out {
            ctx.output(event);
        }
    }
}

impl Filter for Deframe {
    fn name(&self) -> &'static str {
        "deframe"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.initial_state, self.factory.clone()))
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        match event {
            Event::Data(data) => self.emit(ctx, &data),
            Event::StreamEnd(_) => {
                ctx.output(event);
                self.machine.reset(self.initial_state);
            }
            _ => {}
        }
    }

    fn reset(&mut self, _ctx: &mut FilterCtx<'_>) {
        self.machine.reset(self.initial_state);
        self.logic = (self.factory)();
    }
}
