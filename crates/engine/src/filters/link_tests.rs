// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::rig_with;
use sluice_core::ErrorKind;

#[test]
fn link_by_name_splices_the_layout_in() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("spliced", |d| {
            d.replace_data(|data| {
                let tagged = format!("[{}]", data.to_string_lossy());
                Ok(crate::filters::replace::Replacement::Event(Event::data(tagged.as_str())))
            });
        });
        builder.pipeline("main", |d| {
            d.link("spliced");
        });
    });
    rig.input(Event::data("x"));
    assert_eq!(rig.text(), "[x]");
}

#[test]
fn link_with_resolves_lazily_from_the_context() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("a", |_| {});
        builder.pipeline("main", |d| {
            d.link_with(|context| match context.get("route") {
                Some(_) => LinkChoice::Layout("a".into()),
                None => LinkChoice::Pending,
            });
        });
    });
    // Undecided: events buffer.
    rig.input(Event::data("early"));
    assert_eq!(rig.text(), "");

    // Decide, then feed another event: the buffer replays first.
    rig.worker.set_var(rig.pipeline, "route", serde_json::json!(true));
    rig.input(Event::data("late"));
    assert_eq!(rig.text(), "earlylate");
}

#[test]
fn unknown_link_name_is_a_runtime_error() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.link_with(|_| LinkChoice::Layout("ghost".into()));
        });
    });
    rig.input(Event::data("x"));
    let events = rig.events();
    match &events[0] {
        Event::StreamEnd(end) => {
            assert_eq!(
                end.error(),
                &ErrorKind::Runtime("unknown pipeline layout name: ghost".into())
            );
        }
        other => panic!("expected StreamEnd, got {}", other.name()),
    }
}
