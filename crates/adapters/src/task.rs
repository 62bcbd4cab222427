// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic task runner.
//!
//! Fires a pipeline on a fixed period (or once), delivering its `on_start`
//! events and handing output events to the host's callback.

use crate::AdapterError;
use sluice_core::{Clock, ErrorKind, Event};
use sluice_engine::{EventSink, Module, OutputTarget, SinkOps, Worker};
use smol_str::SmolStr;
use std::sync::Arc;
use std::time::Duration;

pub type OutputFn = Arc<dyn Fn(Event) + Send + Sync>;

/// Fires a named layout on a schedule.
pub struct TaskRunner {
    module: Arc<Module>,
    pipeline: SmolStr,
    period: Option<Duration>,
    output: OutputFn,
}

struct CallbackSink {
    output: OutputFn,
}

impl EventSink for CallbackSink {
    fn on_event(&mut self, event: Event, _ops: &mut SinkOps<'_>) {
        (self.output)(event);
    }
}

impl TaskRunner {
    /// `period` of `None` fires exactly once.
    pub fn new(
        module: Arc<Module>,
        pipeline: &str,
        period: Option<Duration>,
        output: OutputFn,
    ) -> Self {
        Self { module, pipeline: pipeline.into(), period, output }
    }

    pub async fn run(self) -> Result<(), AdapterError> {
        self.module
            .layout_id(&self.pipeline)
            .ok_or(sluice_engine::LayoutError::UnknownLayout(self.pipeline.clone()))?;

        let mut worker = Worker::new();
        let sink = worker.add_sink(Box::new(CallbackSink { output: self.output.clone() }));

        match self.period {
            None => {
                fire(&mut worker, &self.module, &self.pipeline, sink);
                drain_timers(&mut worker).await;
            }
            Some(period) => {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    fire(&mut worker, &self.module, &self.pipeline, sink);
                    // Let pending timers run between ticks without
                    // blocking the next firing.
                    while let Some(deadline) = worker.next_deadline() {
                        if deadline > worker.clock().now() + period {
                            break;
                        }
                        tokio::time::sleep_until(deadline.into()).await;
                        worker.poll_timers();
                    }
                }
            }
        }
        Ok(())
    }
}

fn fire(
    worker: &mut Worker,
    module: &Arc<Module>,
    pipeline: &str,
    sink: sluice_engine::SinkId,
) {
    match worker.spawn_named(module, pipeline, OutputTarget::Sink(sink)) {
        Ok(handle) => {
            tracing::debug!(pipeline, "task fired");
            worker.start(handle, &[]);
            // A task pipeline is one-shot: close its input right away.
            worker.input(handle, Event::stream_end(ErrorKind::NoError));
            worker.release(handle);
        }
        Err(error) => {
            tracing::error!(pipeline, %error, "failed to fire task");
        }
    }
}

async fn drain_timers(worker: &mut Worker) {
    while let Some(deadline) = worker.next_deadline() {
        tokio::time::sleep_until(deadline.into()).await;
        worker.poll_timers();
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
