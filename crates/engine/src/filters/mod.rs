// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The filter roster.
//!
//! Joint filters (those owning sub-pipelines) live here alongside the
//! handle/replace observer families and the throttle family. Every filter
//! is appended through the designer; none are constructed directly by
//! hosts.

pub mod branch;
pub mod deframe;
pub mod demux;
pub mod dummy;
pub mod dump;
pub mod fork;
pub mod handle;
pub mod link;
pub mod loop_;
pub mod mux;
pub mod pipe;
pub mod replace;
pub mod replay;
pub mod swap;
pub mod throttle;
pub mod wait;

pub use branch::{Branch, BranchArg, BranchArm, BranchCondFn, BranchMode};
pub use deframe::{Deframe, FrameLogicFactory};
pub use demux::Demux;
pub use dummy::Dummy;
pub use dump::Dump;
pub use fork::{Fork, ForkMode};
pub use handle::{Handle, HandleFn, HookArg, HookPoint};
pub use link::{Link, LinkChoice, LinkFn, LinkTarget};
pub use loop_::Loop;
pub use mux::{Mux, MuxOptions, SessionKeyFn};
pub use pipe::{Pipe, PipeArgs, PipeNext, PipeTarget, SelectFn};
pub use replace::{Replace, ReplaceFn, Replacement};
pub use replay::{Delay, Replay};
pub use swap::{HubSource, Swap};
pub use throttle::{AccountSelector, Throttle, ThrottleKind, ThrottleOptions};
pub use wait::{CondFn, Wait};
