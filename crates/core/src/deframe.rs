// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reusable byte-level state machine scaffolding for codec filters.
//!
//! A codec implements [`FrameLogic`]; the [`Deframer`] drives bytes through
//! it one at a time, or in bulk while a `Read`/`Pass` phase is armed.
//! Output is independent of how the input was chunked.

use crate::data::Data;
use crate::event::{ErrorKind, Event};

/// Transition returned by [`FrameLogic`] callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue byte-at-a-time in the given state.
    Goto(u32),
    /// Collect the next `n` bytes, then hand them to `on_read` in `state`.
    Read { n: usize, state: u32 },
    /// Pass the next `n` bytes through `on_pass`, then continue in `state`.
    Pass { n: usize, state: u32 },
    /// Unrecoverable parse failure; the deframer emits
    /// `StreamEnd(ProtocolError)` and halts.
    Invalid,
}

/// Inner transitions of a codec's framing machine.
pub trait FrameLogic {
    /// One-byte transition while no bulk phase is armed.
    fn on_byte(&mut self, state: u32, byte: u8, out: &mut Vec<Event>) -> Step;

    /// A `Read` phase completed with the collected bytes.
    fn on_read(&mut self, state: u32, data: Data, out: &mut Vec<Event>) -> Step;

    /// A span of bytes consumed by a `Pass` phase. Default forwards as `Data`.
    fn on_pass(&mut self, data: Data, out: &mut Vec<Event>) {
        out.push(Event::Data(data));
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    ByteWise,
    Read { remaining: usize },
    Pass { remaining: usize },
}

/// Drives chunked input through a [`FrameLogic`].
pub struct Deframer {
    state: u32,
    mode: Mode,
    collected: Data,
    failed: bool,
}

impl Deframer {
    pub fn new(initial_state: u32) -> Self {
        Self {
            state: initial_state,
            mode: Mode::ByteWise,
            collected: Data::new(),
            failed: false,
        }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// True once a transition reported `Invalid`; further input is ignored.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn reset(&mut self, state: u32) {
        self.state = state;
        self.mode = Mode::ByteWise;
        self.collected.clear();
        self.failed = false;
    }

    /// Drive a chunk of input through the machine.
    pub fn deframe<L: FrameLogic + ?Sized>(
        &mut self,
        logic: &mut L,
        data: &Data,
        out: &mut Vec<Event>,
    ) {
        if self.failed {
            return;
        }
        let mut input = data.clone();
        while !input.is_empty() {
            match self.mode {
                Mode::ByteWise => {
                    let byte_data = input.shift(1);
                    let chunk = byte_data.to_bytes();
                    let step = logic.on_byte(self.state, chunk[0], out);
                    if !self.apply(step, out) {
                        return;
                    }
                }
                Mode::Read { remaining } => {
                    let take = remaining.min(input.len());
                    let span = input.shift(take);
                    self.collected.push_data(&span);
                    let left = remaining - take;
                    if left > 0 {
                        self.mode = Mode::Read { remaining: left };
                    } else {
                        let collected = std::mem::take(&mut self.collected);
                        let step = logic.on_read(self.state, collected, out);
                        self.mode = Mode::ByteWise;
                        if !self.apply(step, out) {
                            return;
                        }
                    }
                }
                Mode::Pass { remaining } => {
                    let take = remaining.min(input.len());
                    let span = input.shift(take);
                    logic.on_pass(span, out);
                    let left = remaining - take;
                    if left > 0 {
                        self.mode = Mode::Pass { remaining: left };
                    } else {
                        self.mode = Mode::ByteWise;
                    }
                }
            }
        }
    }

    fn apply(&mut self, step: Step, out: &mut Vec<Event>) -> bool {
        match step {
            Step::Goto(state) => {
                self.state = state;
            }
            Step::Read { n, state } => {
                self.state = state;
                if n > 0 {
                    self.mode = Mode::Read { remaining: n };
                    self.collected.clear();
                } else {
                    self.mode = Mode::ByteWise;
                }
            }
            Step::Pass { n, state } => {
                self.state = state;
                if n > 0 {
                    self.mode = Mode::Pass { remaining: n };
                } else {
                    self.mode = Mode::ByteWise;
                }
            }
            Step::Invalid => {
                self.failed = true;
                out.push(Event::stream_end(ErrorKind::ProtocolError));
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "deframe_tests.rs"]
mod tests;
