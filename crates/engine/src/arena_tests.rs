// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::input::OutputTarget;
use crate::pipeline::Pipeline;

fn dummy_pipeline() -> Pipeline {
    Pipeline::for_tests(OutputTarget::Discard)
}

#[test]
fn insert_and_get() {
    let mut arena = PipelineArena::new();
    let handle = arena.insert(dummy_pipeline());
    assert!(arena.contains(handle));
    assert_eq!(arena.len(), 1);
}

#[test]
fn remove_makes_handle_stale() {
    let mut arena = PipelineArena::new();
    let handle = arena.insert(dummy_pipeline());
    assert!(arena.remove(handle).is_some());
    assert!(!arena.contains(handle));
    assert!(arena.get(handle).is_none());
    assert!(arena.remove(handle).is_none());
}

#[test]
fn recycled_slot_gets_new_generation() {
    let mut arena = PipelineArena::new();
    let first = arena.insert(dummy_pipeline());
    arena.remove(first);

    let second = arena.insert(dummy_pipeline());
    // Same slot, different generation: the old handle must stay dead.
    assert!(!arena.contains(first));
    assert!(arena.contains(second));
    assert_ne!(first, second);
}

#[test]
fn len_tracks_live_slots() {
    let mut arena = PipelineArena::new();
    let a = arena.insert(dummy_pipeline());
    let _b = arena.insert(dummy_pipeline());
    assert_eq!(arena.len(), 2);
    arena.remove(a);
    assert_eq!(arena.len(), 1);
}
