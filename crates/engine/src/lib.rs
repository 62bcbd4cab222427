// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sluice-engine: layouts, pipelines, filters, and the per-thread worker.
//!
//! The data plane is a single-threaded cooperative dataflow runtime: a
//! `Worker` owns every live `Pipeline` in a generational arena, delivers
//! events through one FIFO queue (the InputContext), and drives timers
//! from a `Clock`. Scripts describe layouts through the `ModuleBuilder` /
//! `PipelineDesigner` pair; the filter roster lives in [`filters`].

pub mod arena;
pub mod context;
pub mod designer;
pub mod error;
pub mod filter;
pub mod filters;
pub mod hub;
pub mod input;
pub mod layout;
pub mod pipeline;
pub mod scheduler;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
pub mod test_support;

pub use arena::PipelineHandle;
pub use context::{Context, GroupId};
pub use designer::{ModuleBuilder, PipelineDesigner};
pub use error::LayoutError;
pub use filter::{CallbackToken, Filter, FilterCtx, Settle};
pub use hub::HubId;
pub use input::{InputRef, OutputTarget, Port, SinkId, TapState};
pub use layout::{LayoutId, Module, PipelineLayout, StartingEvents, SubRef};
pub use pipeline::PipelineState;
pub use scheduler::{TimerToken, Wake};
pub use worker::{EventSink, SinkOps, Worker};
