// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::input::{OutputTarget, TapState};
use crate::test_support::{data_text, message_balance, recording, rig_with, Collector};
use crate::worker::Worker;
use sluice_core::{ErrorKind, Event, FakeClock, Message};

#[test]
fn message_rate_delays_the_second_message() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.throttle_message_rate(1.0, AccountSelector::Global);
        });
    });
    rig.input_message(None, "first");
    assert_eq!(message_balance(&rig.events()), (1, 1));

    rig.input_message(None, "second");
    // Bucket is empty: the whole second message queues and the tap closes.
    assert_eq!(message_balance(&rig.events()), (1, 1));
    assert_eq!(rig.worker.tap(rig.pipeline), TapState::Closed);

    rig.advance(Duration::from_secs(1));
    assert_eq!(message_balance(&rig.events()), (2, 2));
    assert_eq!(rig.worker.tap(rig.pipeline), TapState::Open);
    assert_eq!(rig.text(), "firstsecond");
}

#[test]
fn data_rate_splits_chunks_at_the_bucket_boundary() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.throttle_data_rate(4.0, AccountSelector::Global);
        });
    });
    rig.input(Event::data("0123456789"));
    // Four bytes pass immediately; six wait for refills.
    assert_eq!(rig.text(), "0123");

    rig.advance(Duration::from_secs(1));
    assert_eq!(rig.text(), "01234567");

    rig.advance(Duration::from_secs(1));
    assert_eq!(rig.text(), "0123456789");
    assert_eq!(rig.worker.tap(rig.pipeline), TapState::Open);
}

#[test]
fn data_rate_never_exceeds_quota_per_window() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.throttle_data_rate(8.0, AccountSelector::Global);
        });
    });
    let mut last_len = 0;
    for _ in 0..4 {
        rig.input(Event::data("abcdefgh"));
        let now_len = rig.text().len();
        assert!(now_len - last_len <= 8, "emitted {} bytes in one window", now_len - last_len);
        last_len = now_len;
        rig.advance(Duration::from_secs(1));
    }
    rig.advance(Duration::from_secs(5));
    assert_eq!(rig.text().len(), 32);
}

#[test]
fn concurrency_admits_one_stream_at_a_time() {
    let mut builder = crate::designer::ModuleBuilder::new("test");
    builder.pipeline("main", |d| {
        d.throttle_concurrency(1.0, AccountSelector::Key("slot".into()));
    });
    let module = builder.build().unwrap();

    let clock = FakeClock::new();
    let mut worker = Worker::with_clock(clock);
    let out1 = recording();
    let out2 = recording();
    let sink1 = worker.add_sink(Box::new(Collector::new(out1.clone())));
    let sink2 = worker.add_sink(Box::new(Collector::new(out2.clone())));
    let p1 = worker.spawn_named(&module, "main", OutputTarget::Sink(sink1)).unwrap();
    let p2 = worker.spawn_named(&module, "main", OutputTarget::Sink(sink2)).unwrap();
    worker.start(p1, &[]);
    worker.start(p2, &[]);

    worker.input(p1, Event::data("one"));
    worker.input(p2, Event::data("two"));
    // p1 holds the only slot; p2 is parked.
    assert_eq!(data_text(&out1.lock()), "one");
    assert_eq!(data_text(&out2.lock()), "");

    // p1 ends its stream, returning the token; p2 wakes and drains.
    worker.input(p1, Event::stream_end(ErrorKind::NoError));
    assert_eq!(data_text(&out2.lock()), "two");
}

#[test]
fn accounts_are_keyed_independently() {
    let mut builder = crate::designer::ModuleBuilder::new("test");
    builder.pipeline("a", |d| {
        d.throttle_message_rate(1.0, AccountSelector::Key("a".into()));
    });
    builder.pipeline("b", |d| {
        d.throttle_message_rate(1.0, AccountSelector::Key("b".into()));
    });
    let module = builder.build().unwrap();

    let clock = FakeClock::new();
    let mut worker = Worker::with_clock(clock);
    let out = recording();
    let sink = worker.add_sink(Box::new(Collector::new(out.clone())));
    let pa = worker.spawn_named(&module, "a", OutputTarget::Sink(sink)).unwrap();
    let pb = worker.spawn_named(&module, "b", OutputTarget::Sink(sink)).unwrap();
    worker.start(pa, &[]);
    worker.start(pb, &[]);

    for event in Message::new(None, "x").events() {
        worker.input(pa, event);
    }
    for event in Message::new(None, "y").events() {
        worker.input(pb, event);
    }
    // Separate buckets: both messages pass without waiting.
    assert_eq!(message_balance(&out.lock()), (2, 2));
}
