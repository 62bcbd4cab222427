// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::rig_with;
use sluice_core::ErrorKind;

#[test]
fn fixed_target_is_transparent() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("target", |_| {});
        builder.pipeline("main", |d| {
            d.pipe().to("target");
        });
    });
    rig.input(Event::data("through"));
    assert_eq!(rig.text(), "through");
}

#[test]
fn init_args_thread_through_to_on_start() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("target", |d| {
            d.on_start_fn(|args| {
                let text = args.first().and_then(|v| v.as_str()).unwrap_or("").to_string();
                vec![Event::data(text.as_str())]
            });
        });
        builder.pipeline("main", |d| {
            let mut map = IndexMap::new();
            map.insert(SmolStr::new_static("t"), crate::layout::SubRef::name("target"));
            d.pipe_select(
                |_, _| Some(SmolStr::new_static("t")),
                map,
                PipeArgs::Args(vec![serde_json::json!("seeded:")]),
            );
        });
    });
    rig.input(Event::data("x"));
    assert_eq!(rig.text(), "seeded:x");
}

#[test]
fn select_routes_by_key() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("upper", |d| {
            d.replace_data(|data| {
                let upper = data.to_string_lossy().to_uppercase();
                Ok(crate::filters::replace::Replacement::Event(Event::data(upper.as_str())))
            });
        });
        builder.pipeline("main", |d| {
            let mut map = IndexMap::new();
            map.insert(SmolStr::new_static("u"), crate::layout::SubRef::name("upper"));
            d.pipe_select(|_, _| Some(SmolStr::new_static("u")), map, PipeArgs::None);
        });
    });
    rig.input(Event::data("abc"));
    assert_eq!(rig.text(), "ABC");
}

#[test]
fn unknown_select_key_is_a_runtime_error() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.pipe_select(|_, _| Some(SmolStr::new_static("ghost")), IndexMap::new(), PipeArgs::None);
        });
    });
    rig.input(Event::data("x"));
    let events = rig.events();
    match &events[0] {
        Event::StreamEnd(end) => {
            assert_eq!(end.error(), &ErrorKind::Runtime("pipeline 'ghost' not found".into()));
        }
        other => panic!("expected StreamEnd, got {}", other.name()),
    }
}

#[test]
fn pipe_next_without_a_chain_is_transparent() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.pipe_next();
        });
    });
    rig.input(Event::data("solo"));
    assert_eq!(rig.text(), "solo");
}
