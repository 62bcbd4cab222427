// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration-time errors.
//!
//! Stream-time faults never surface here; they travel as
//! `StreamEnd` events (see `sluice_core::ErrorKind`).

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while building or binding pipeline layouts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("duplicated on_start()")]
    DuplicateOnStart,
    #[error("duplicated on_end()")]
    DuplicateOnEnd,
    #[error("on_start() is only allowed prior to filters")]
    StartAfterFilters,
    #[error("on_end() is only allowed prior to filters")]
    EndAfterFilters,
    #[error("missing to(...) for joint filter {0}")]
    MissingTo(&'static str),
    #[error("calling to() without a joint filter")]
    DanglingTo,
    #[error("filter {0} does not take a sub-pipeline")]
    NotAJoint(&'static str),
    #[error("unknown pipeline layout name: {0}")]
    UnknownLayout(SmolStr),
    #[error("duplicate pipeline layout name: {0}")]
    DuplicateLayout(SmolStr),
    #[error("module has no entrance pipeline")]
    NoEntrance,
}
