// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Many-to-many broadcast node used by the `swap` and `link` filters.
//!
//! A hub keeps at most two privileged direct parties plus an unlimited set
//! of extras. Broadcast enqueues onto the worker queue, so a party that
//! joins while a broadcast's deliveries are still draining never sees that
//! event, and the party set is never mutated mid-iteration.

use crate::input::InputRef;
use sluice_core::Event;

/// Identifies a hub within one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HubId(pub(crate) u32);

#[derive(Debug, Default)]
pub(crate) struct Hub {
    pair: [Option<InputRef>; 2],
    extras: Vec<InputRef>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a party. The first two join the privileged pair; re-joins are no-ops.
    pub fn join(&mut self, party: InputRef) {
        if self.pair.contains(&Some(party)) || self.extras.contains(&party) {
            return;
        }
        for slot in &mut self.pair {
            if slot.is_none() {
                *slot = Some(party);
                return;
            }
        }
        self.extras.push(party);
    }

    pub fn exit(&mut self, party: InputRef) {
        for slot in &mut self.pair {
            if *slot == Some(party) {
                *slot = None;
                return;
            }
        }
        self.extras.retain(|p| *p != party);
    }

    /// Deliver to every party except the sender. Zero recipients is fine.
    pub fn broadcast(&mut self, event: &Event, from: Option<InputRef>, mut send: impl FnMut(InputRef, Event)) {
        for party in self.pair.iter().flatten().chain(self.extras.iter()) {
            if Some(*party) != from {
                send(*party, event.clone());
            }
        }
    }

    pub fn party_count(&self) -> usize {
        self.pair.iter().filter(|p| p.is_some()).count() + self.extras.len()
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
