// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling file-watch source.
//!
//! Checks a path's modification time on a period; each observed change
//! fires a pipeline whose start argument carries the path.

use crate::task::OutputFn;
use crate::AdapterError;
use serde_json::json;
use sluice_core::{ErrorKind, Event};
use sluice_engine::{EventSink, Module, OutputTarget, SinkOps, Worker};
use smol_str::SmolStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Fires a named layout whenever the watched path changes.
pub struct FileWatch {
    path: PathBuf,
    module: Arc<Module>,
    pipeline: SmolStr,
    period: Duration,
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

impl FileWatch {
    pub fn new(
        path: impl Into<PathBuf>,
        module: Arc<Module>,
        pipeline: &str,
        period: Duration,
        output: OutputFn,
    ) -> Self {
        Self { path: path.into(), module, pipeline: pipeline.into(), period, output }
    }

    fn mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    pub async fn run(self) -> Result<(), AdapterError> {
        self.module
            .layout_id(&self.pipeline)
            .ok_or(sluice_engine::LayoutError::UnknownLayout(self.pipeline.clone()))?;

        let mut worker = Worker::new();
        let sink = worker.add_sink(Box::new(CallbackSink { output: self.output.clone() }));
        let mut last = self.mtime();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let current = self.mtime();
            if current != last {
                last = current;
                tracing::debug!(path = %self.path.display(), "watched file changed");
                let args = [json!(self.path.display().to_string())];
                match worker.spawn_named(&self.module, &self.pipeline, OutputTarget::Sink(sink)) {
                    Ok(handle) => {
                        worker.start(handle, &args);
                        worker.input(handle, Event::stream_end(ErrorKind::NoError));
                        worker.release(handle);
                    }
                    Err(error) => {
                        tracing::error!(%error, "failed to fire watch pipeline");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
