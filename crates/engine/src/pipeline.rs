// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live pipeline instances.
//!
//! A pipeline owns clones of its layout's filter prototypes. Filters are
//! stored in `Option` slots so the worker can detach one while it runs and
//! keep full access to the arena underneath it.

use crate::context::Context;
use crate::filter::Filter;
use crate::input::{OutputTarget, TapState};
use crate::layout::{LayoutId, Module};
use sluice_core::Event;
use std::collections::VecDeque;
use std::sync::Arc;

/// Lifecycle of a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Running,
    Ended,
}

/// One step of a module chain: which layout to enter in which module.
#[derive(Clone)]
pub(crate) struct ChainEntry {
    pub module: Arc<Module>,
    pub layout: LayoutId,
}

pub(crate) struct Pipeline {
    pub(crate) module: Arc<Module>,
    pub(crate) layout: Option<LayoutId>,
    pub(crate) filters: Vec<Option<Box<dyn Filter>>>,
    pub(crate) output: OutputTarget,
    pub(crate) state: PipelineState,
    pub(crate) tap: TapState,
    /// Events parked while the tap is closed.
    pub(crate) gated: VecDeque<Event>,
    pub(crate) context: Context,
    /// Remaining module chain for `pipe_next`.
    pub(crate) chain: Arc<Vec<ChainEntry>>,
    pub(crate) chain_pos: u32,
    /// Filters to wake (`on_notify`) when this tap reopens.
    pub(crate) tap_watchers: Vec<(crate::arena::PipelineHandle, u32)>,
}

impl Pipeline {
    pub(crate) fn new(
        module: Arc<Module>,
        layout: Option<LayoutId>,
        filters: Vec<Option<Box<dyn Filter>>>,
        output: OutputTarget,
        context: Context,
        chain: Arc<Vec<ChainEntry>>,
        chain_pos: u32,
    ) -> Self {
        Self {
            module,
            layout,
            filters,
            output,
            state: PipelineState::Created,
            tap: TapState::Open,
            gated: VecDeque::new(),
            context,
            chain,
            chain_pos,
            tap_watchers: Vec::new(),
        }
    }

    /// Bare pipeline with no filters, for arena and hub unit tests.
    #[cfg(test)]
    pub(crate) fn for_tests(output: OutputTarget) -> Self {
        Self::new(
            Module::empty(),
            None,
            Vec::new(),
            output,
            Context::new(crate::context::GroupId(0)),
            Arc::new(Vec::new()),
            0,
        )
    }
}
