// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pipeline runtime context.
//!
//! Variables are plain JSON values; a pipeline and the sub-pipelines it
//! spawns share a context group, which is how `wait` filters learn that
//! something they are watching may have changed.

use serde_json::Value;
use std::collections::HashMap;

/// Identifies a context group within one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) u32);

/// Runtime variables bound to one pipeline instance.
#[derive(Debug, Clone)]
pub struct Context {
    vars: HashMap<String, Value>,
    group: GroupId,
}

impl Context {
    pub(crate) fn new(group: GroupId) -> Self {
        Self { vars: HashMap::new(), group }
    }

    /// Copy for a sub-pipeline: variables are snapshotted, the group is shared.
    pub(crate) fn fork(&self) -> Self {
        self.clone()
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }
}
