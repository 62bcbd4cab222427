// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery addressing and backpressure signals.
//!
//! Every event delivery targets a pipeline slot plus a port. All delivery
//! funnels through the worker's FIFO queue: the outermost call drains it to
//! empty (one InputContext frame), nested emissions only enqueue. That is
//! what bounds stack depth and makes reentrant release safe.

use crate::arena::PipelineHandle;
use serde_json::Value;
use sluice_core::Event;

/// Where within a pipeline an event lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// The forward path into filter `i` (0 is the pipeline input).
    Filter(u32),
    /// A joint filter's reply channel from one of its sub-pipelines.
    Reply { filter: u32, tag: u64 },
    /// The pipeline's downstream boundary.
    Output,
}

/// A deliverable address: pipeline + port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub pipeline: PipelineHandle,
    pub port: Port,
}

impl InputRef {
    pub fn new(pipeline: PipelineHandle, port: Port) -> Self {
        Self { pipeline, port }
    }

    /// The pipeline's input (its first filter).
    pub fn head(pipeline: PipelineHandle) -> Self {
        Self { pipeline, port: Port::Filter(0) }
    }
}

/// Identifies an external event sink registered with the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(pub(crate) u32);

/// Where a pipeline's last filter emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Chain into another delivery address.
    Input(InputRef),
    /// Hand to an external sink (socket writer, test collector, mux pool).
    Sink(SinkId),
    /// Drop on the floor.
    Discard,
}

/// Backpressure state of a pipeline's input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TapState {
    #[default]
    Open,
    Closed,
}

/// One unit of work on the worker queue.
#[derive(Debug)]
pub(crate) enum Delivery {
    Event { target: InputRef, event: Event },
    Timer { pipeline: PipelineHandle, filter: u32, tag: u64 },
    SinkTimer { sink: SinkId, tag: u64 },
    Notify { pipeline: PipelineHandle, filter: u32 },
    Settle { pipeline: PipelineHandle, filter: u32, tag: u64, result: Result<Value, String> },
}
