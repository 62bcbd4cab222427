// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_support::rig_with;
use serde_json::json;
use sluice_core::Event;
use std::time::Duration;

#[test]
fn always_true_condition_is_identity() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.wait(|_| true);
        });
    });
    rig.input(Event::data("a"));
    rig.input(Event::data("b"));
    assert_eq!(rig.text(), "ab");
}

#[test]
fn buffered_events_flush_in_arrival_order_on_fulfillment() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.wait(|context| context.get("go").is_some());
        });
    });
    rig.input(Event::data("1"));
    rig.input(Event::data("2"));
    assert_eq!(rig.text(), "");

    rig.worker.set_var(rig.pipeline, "go", json!(true));
    assert_eq!(rig.text(), "12");

    // Once fulfilled the filter is transparent.
    rig.input(Event::data("3"));
    assert_eq!(rig.text(), "123");
}

#[test]
fn timeout_resolves_the_wait_unconditionally() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.wait_timeout(|_| false, Duration::from_millis(100));
        });
    });
    rig.input(Event::data("held"));
    assert_eq!(rig.text(), "");

    rig.advance(Duration::from_millis(50));
    assert_eq!(rig.text(), "");

    rig.advance(Duration::from_millis(60));
    assert_eq!(rig.text(), "held");
}

#[test]
fn zero_timeout_means_disabled() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.wait_timeout(|_| false, Duration::ZERO);
        });
    });
    rig.input(Event::data("stuck"));
    rig.advance(Duration::from_secs(3600));
    assert_eq!(rig.text(), "");
    assert!(!rig.worker.has_timers());
}
