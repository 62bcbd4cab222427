// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::arena::PipelineArena;
use crate::input::{OutputTarget, Port};
use crate::pipeline::Pipeline;

fn party(arena: &mut PipelineArena, tag: u64) -> InputRef {
    let handle = arena.insert(Pipeline::for_tests(OutputTarget::Discard));
    InputRef::new(handle, Port::Reply { filter: 0, tag })
}

#[test]
fn broadcast_reaches_everyone_but_sender() {
    let mut arena = PipelineArena::new();
    let a = party(&mut arena, 1);
    let b = party(&mut arena, 2);
    let c = party(&mut arena, 3);

    let mut hub = Hub::new();
    hub.join(a);
    hub.join(b);
    hub.join(c);
    assert_eq!(hub.party_count(), 3);

    let mut seen = Vec::new();
    hub.broadcast(&Event::data("ping"), Some(a), |to, _| seen.push(to));
    assert_eq!(seen, vec![b, c]);
}

#[test]
fn double_join_is_a_no_op() {
    let mut arena = PipelineArena::new();
    let a = party(&mut arena, 1);

    let mut hub = Hub::new();
    hub.join(a);
    hub.join(a);
    assert_eq!(hub.party_count(), 1);
}

#[test]
fn exit_removes_pair_and_extras() {
    let mut arena = PipelineArena::new();
    let a = party(&mut arena, 1);
    let b = party(&mut arena, 2);
    let c = party(&mut arena, 3);

    let mut hub = Hub::new();
    hub.join(a);
    hub.join(b);
    hub.join(c);

    hub.exit(a); // privileged slot
    hub.exit(c); // extra
    assert_eq!(hub.party_count(), 1);

    let mut seen = Vec::new();
    hub.broadcast(&Event::data("x"), None, |to, _| seen.push(to));
    assert_eq!(seen, vec![b]);
}

#[test]
fn broadcast_with_no_parties_is_silent() {
    let mut hub = Hub::new();
    let mut count = 0;
    hub.broadcast(&Event::data("x"), None, |_, _| count += 1);
    assert_eq!(count, 0);
}

#[test]
fn third_party_lands_in_extras() {
    let mut arena = PipelineArena::new();
    let a = party(&mut arena, 1);
    let b = party(&mut arena, 2);
    let c = party(&mut arena, 3);

    let mut hub = Hub::new();
    hub.join(a);
    hub.join(b);
    hub.join(c);
    hub.exit(b);

    // c stays an extra; the freed pair slot is refilled by the next join.
    let d = party(&mut arena, 4);
    hub.join(d);
    assert_eq!(hub.party_count(), 3);
}
