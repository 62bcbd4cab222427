// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker timer wheel.
//!
//! Deadlines come from the host's `Clock`; the worker polls `fired` when
//! it wakes up. Wakes address either a filter slot or a registered sink.

use crate::arena::PipelineHandle;
use crate::input::SinkId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Cancellation token returned by [`Scheduler::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Who a timer wakes when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Filter { pipeline: PipelineHandle, filter: u32, tag: u64 },
    Sink { sink: SinkId, tag: u64 },
}

/// Monotonic deadline queue.
#[derive(Default)]
pub(crate) struct Scheduler {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    entries: HashMap<u64, Wake>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer `delay` from `now`.
    pub fn set(&mut self, wake: Wake, delay: Duration, now: Instant) -> TimerToken {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, wake);
        self.heap.push(Reverse((now + delay, id)));
        TimerToken(id)
    }

    /// Disarm; a token that already fired or was cancelled is a no-op.
    pub fn cancel(&mut self, token: TimerToken) {
        self.entries.remove(&token.0);
    }

    /// Pop every wake whose deadline has passed, in deadline order.
    pub fn fired(&mut self, now: Instant) -> Vec<Wake> {
        let mut wakes = Vec::new();
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            // Cancelled entries leave a dead heap node behind; skip them.
            if let Some(wake) = self.entries.remove(&id) {
                wakes.push(wake);
            }
        }
        wakes
    }

    /// Earliest armed deadline, if any timer is live.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap
            .iter()
            .filter(|Reverse((_, id))| self.entries.contains_key(id))
            .map(|Reverse((deadline, _))| *deadline)
            .min()
    }

    pub fn has_timers(&self) -> bool {
        !self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
