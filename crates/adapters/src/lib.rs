// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sluice-adapters: glue between the engine core and the outside world.
//!
//! Three small adapters feed pipelines with events of the core model: a
//! TCP listener (one pipeline per connection), a periodic task runner, and
//! a polling file-watch source. Each owns its worker on a dedicated task
//! and bridges to the async world over channels; the engine itself never
//! touches a socket or the filesystem.

pub mod config;
pub mod listener;
pub mod task;
pub mod watch;

pub use config::HostConfig;
pub use listener::Listener;
pub use task::TaskRunner;
pub use watch::FileWatch;

use thiserror::Error;

/// Errors from adapter setup and I/O
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("layout error: {0}")]
    Layout(#[from] sluice_engine::LayoutError),
    #[error("config error: {0}")]
    Config(String),
}
