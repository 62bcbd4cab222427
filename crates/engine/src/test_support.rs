// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::filter::{Filter, FilterCtx};
use crate::worker::{EventSink, SinkOps};
use parking_lot::Mutex;
use sluice_core::Event;
use std::sync::Arc;

/// Shared recording of observed events.
pub type Recording = Arc<Mutex<Vec<Event>>>;

pub fn recording() -> Recording {
    Arc::new(Mutex::new(Vec::new()))
}

/// Pass-through filter that records every event it sees.
pub struct Probe {
    events: Recording,
}

impl Probe {
    pub fn new(events: Recording) -> Self {
        Self { events }
    }
}

impl Filter for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self { events: self.events.clone() })
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        self.events.lock().push(event.clone());
        ctx.output(event);
    }
}

/// Output sink that records every event a pipeline emits.
pub struct Collector {
    events: Recording,
}

impl Collector {
    pub fn new(events: Recording) -> Self {
        Self { events }
    }
}

impl EventSink for Collector {
    fn on_event(&mut self, event: Event, _ops: &mut SinkOps<'_>) {
        self.events.lock().push(event);
    }
}

pub use sluice_core::test_support::{data_text, message_balance};

use crate::arena::PipelineHandle;
use crate::designer::{ModuleBuilder, PipelineDesigner};
use crate::input::OutputTarget;
use crate::layout::Module;
use crate::worker::Worker;
use serde_json::Value;
use sluice_core::{FakeClock, Message};
use std::time::Duration;

/// One-pipeline worker harness driven by a fake clock.
pub struct Rig {
    pub clock: FakeClock,
    pub worker: Worker<FakeClock>,
    pub module: std::sync::Arc<Module>,
    pub out: Recording,
    pub pipeline: PipelineHandle,
}

/// Build a module with a single `main` layout, spawn it against a
/// collector sink, and start it with no arguments.
pub fn rig(build: impl FnOnce(&mut PipelineDesigner<'_>)) -> Rig {
    rig_with(|builder| {
        builder.pipeline("main", build);
    })
}

/// Same, but the whole module is in the caller's hands; `main` must exist.
pub fn rig_with(build: impl FnOnce(&mut ModuleBuilder)) -> Rig {
    let mut builder = ModuleBuilder::new("test");
    build(&mut builder);
    let module = match builder.build() {
        Ok(module) => module,
        Err(error) => unreachable!("test layout failed to build: {error}"),
    };
    let clock = FakeClock::new();
    let mut worker = Worker::with_clock(clock.clone());
    let out = recording();
    let sink = worker.add_sink(Box::new(Collector::new(out.clone())));
    let pipeline = match worker.spawn_named(&module, "main", OutputTarget::Sink(sink)) {
        Ok(pipeline) => pipeline,
        Err(error) => unreachable!("no main layout: {error}"),
    };
    worker.start(pipeline, &[]);
    Rig { clock, worker, module, out, pipeline }
}

impl Rig {
    pub fn input(&mut self, event: Event) {
        self.worker.input(self.pipeline, event);
    }

    /// Feed a whole message as its canonical event sequence.
    pub fn input_message(&mut self, head: Option<Value>, body: &str) {
        for event in Message::new(head, body).events() {
            self.worker.input(self.pipeline, event);
        }
    }

    /// Advance the fake clock and fire due timers.
    pub fn advance(&mut self, duration: Duration) {
        self.clock.advance(duration);
        self.worker.poll_timers();
    }

    pub fn events(&self) -> Vec<Event> {
        self.out.lock().clone()
    }

    pub fn text(&self) -> String {
        data_text(&self.events())
    }
}
