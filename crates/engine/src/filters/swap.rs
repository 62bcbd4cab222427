// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swap the stream onto a hub.

use crate::context::Context;
use crate::filter::{Filter, FilterCtx};
use crate::hub::HubId;
use sluice_core::{Event, EventBuffer};
use std::sync::Arc;

/// Where the hub comes from: fixed at design time, or computed from the
/// context on the first event.
#[derive(Clone)]
pub enum HubSource {
    Id(HubId),
    Fn(Arc<dyn Fn(&Context) -> Option<HubId> + Send + Sync>),
}

/// Joins its pipeline's reply channel to the hub on the first event; every
/// event thereafter is broadcast to the other parties. The filter emits to
/// its own successor only what other parties broadcast, plus the terminal
/// `StreamEnd`.
pub struct Swap {
    source: HubSource,
    hub: Option<HubId>,
    started: bool,
    buffer: EventBuffer,
}

impl Swap {
    pub fn new(source: HubSource) -> Self {
        Self { source, hub: None, started: false, buffer: EventBuffer::new() }
    }

    fn broadcast(&mut self, ctx: &mut FilterCtx<'_>, event: &Event) {
        if let Some(hub) = self.hub {
            let from = ctx.reply_ref(0);
            ctx.hub_broadcast(hub, event, Some(from));
        }
    }
}

impl Filter for Swap {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::new(self.source.clone()))
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if !self.started {
            let hub = match &self.source {
                HubSource::Id(hub) => Some(*hub),
                HubSource::Fn(f) => ctx.context().and_then(|context| f(context)),
            };
            if let Some(hub) = hub {
                let party = ctx.reply_ref(0);
                ctx.hub_join(hub, party);
                self.hub = Some(hub);
                self.started = true;
                let mut pending = std::mem::take(&mut self.buffer);
                pending.flush(|event| self.broadcast(ctx, &event));
            }
        }

        if !self.started {
            self.buffer.push(event);
            return;
        }

        let terminal = event.is_stream_end();
        self.broadcast(ctx, &event);
        if terminal {
            ctx.output(event);
        }
    }

    fn on_reply(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64, event: Event) {
        ctx.output(event);
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(hub) = self.hub.take() {
            let party = ctx.reply_ref(0);
            ctx.hub_exit(hub, party);
        }
        self.started = false;
        self.buffer.clear();
    }
}

#[cfg(test)]
#[path = "swap_tests.rs"]
mod tests;
