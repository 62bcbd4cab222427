// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pass-through event logger.

use crate::filter::{Filter, FilterCtx};
use smol_str::SmolStr;
use sluice_core::Event;

/// Logs each passing event through `tracing` and forwards it untouched.
pub struct Dump {
    tag: Option<SmolStr>,
}

impl Dump {
    pub fn new(tag: Option<SmolStr>) -> Self {
        Self { tag }
    }
}

impl Filter for Dump {
    fn name(&self) -> &'static str {
        "dump"
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self { tag: self.tag.clone() })
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        let tag = self.tag.as_deref().unwrap_or("");
        match &event {
            Event::Data(data) => {
                tracing::debug!(tag, frame = event.name(), bytes = data.len(), "dump");
            }
            Event::StreamEnd(end) => {
                tracing::debug!(tag, frame = event.name(), error = %end.error(), "dump");
            }
            _ => {
                tracing::debug!(tag, frame = event.name(), "dump");
            }
        }
        ctx.output(event);
    }
}
