// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black hole for non-terminal events.

use crate::filter::{Filter, FilterCtx};
use sluice_core::Event;

/// Swallows everything except `StreamEnd`, which still terminates the
/// downstream channel.
#[derive(Default)]
pub struct Dummy;

impl Filter for Dummy {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Dummy)
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if event.is_stream_end() {
            ctx.output(event);
        }
    }
}
