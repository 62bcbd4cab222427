// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable pipeline blueprints.
//!
//! A [`Module`] owns every layout built by one designer run; layouts refer
//! to each other by [`LayoutId`] (an index into the module), which keeps
//! the object graph acyclic even when a layout links to itself by name.
//! Modules are created at load time, shared behind `Arc`, and never
//! mutated during traffic.

use crate::error::LayoutError;
use crate::filter::Filter;
use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;
use sluice_core::{Event, StreamEnd};
use std::sync::Arc;

/// Index of a layout within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutId(pub(crate) u32);

/// Events fed into a pipeline when it starts.
#[derive(Clone)]
pub enum StartingEvents {
    /// Literal events, re-delivered for every instance.
    Events(Vec<Event>),
    /// Computed from the start arguments.
    Fn(StartFn),
}

pub type StartFn = Arc<dyn Fn(&[Value]) -> Vec<Event> + Send + Sync>;
pub type EndFn = Arc<dyn Fn(&StreamEnd) + Send + Sync>;

/// Ordered filter prototypes plus lifecycle hooks.
pub struct PipelineLayout {
    name: Option<SmolStr>,
    pub(crate) filters: Vec<Box<dyn Filter>>,
    pub(crate) on_start: Option<StartingEvents>,
    pub(crate) on_end: Option<EndFn>,
}

impl PipelineLayout {
    pub(crate) fn new(name: Option<SmolStr>) -> Self {
        Self { name, filters: Vec::new(), on_start: None, on_end: None }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }
}

/// A bound set of layouts produced by one designer run.
pub struct Module {
    name: SmolStr,
    pub(crate) layouts: Vec<PipelineLayout>,
    pub(crate) names: IndexMap<SmolStr, LayoutId>,
    pub(crate) entrance: Option<LayoutId>,
}

impl Module {
    /// Empty module, used by tests and by pipelines with no layout.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            name: SmolStr::new_static("empty"),
            layouts: Vec::new(),
            names: IndexMap::new(),
            entrance: None,
        })
    }

    pub(crate) fn new(name: SmolStr) -> Self {
        Self { name, layouts: Vec::new(), names: IndexMap::new(), entrance: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout_id(&self, name: &str) -> Option<LayoutId> {
        self.names.get(name).copied()
    }

    pub(crate) fn layout(&self, id: LayoutId) -> Option<&PipelineLayout> {
        self.layouts.get(id.0 as usize)
    }

    /// The layout `pipe_next` chains into when this module is on a chain.
    pub fn entrance(&self) -> Option<LayoutId> {
        self.entrance
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }
}

/// Symbolic reference from a joint filter to its sub-layout.
///
/// Designers record a name or id; `bind` resolves names once and rejects
/// joint filters that were never given a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubRef {
    #[default]
    Unset,
    Name(SmolStr),
    Id(LayoutId),
}

impl SubRef {
    pub fn name(name: impl Into<SmolStr>) -> Self {
        SubRef::Name(name.into())
    }

    pub(crate) fn bind(
        &mut self,
        filter_name: &'static str,
        names: &IndexMap<SmolStr, LayoutId>,
    ) -> Result<(), LayoutError> {
        match self {
            SubRef::Unset => Err(LayoutError::MissingTo(filter_name)),
            SubRef::Name(name) => match names.get(name.as_str()) {
                Some(id) => {
                    *self = SubRef::Id(*id);
                    Ok(())
                }
                None => Err(LayoutError::UnknownLayout(name.clone())),
            },
            SubRef::Id(_) => Ok(()),
        }
    }

    /// The bound layout id; `None` before a successful `bind`.
    pub(crate) fn resolved(&self) -> Option<LayoutId> {
        match self {
            SubRef::Id(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<LayoutId> for SubRef {
    fn from(id: LayoutId) -> Self {
        SubRef::Id(id)
    }
}

impl From<&str> for SubRef {
    fn from(name: &str) -> Self {
        SubRef::Name(name.into())
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
