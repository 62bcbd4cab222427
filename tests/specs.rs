// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over the pipeline engine.

use serde_json::json;
use sluice_core::{ErrorKind, Event, Message};
use sluice_engine::filters::{BranchArg, BranchArm, MuxOptions, Replacement};
use sluice_engine::test_support::{data_text, message_balance, recording, rig_with, Collector};
use sluice_engine::{ModuleBuilder, OutputTarget, Worker};
use smol_str::SmolStr;
use std::sync::Arc;
use std::time::Duration;

fn request(path: &str) -> Vec<Event> {
    Message::new(Some(json!({"method": "GET", "path": path})), "").events()
}

/// Scenario 1: request–response demux round-trip. Two back-to-back
/// requests each get their own sub-pipeline; responses come back `ok` in
/// request order.
#[test]
fn demux_round_trip_preserves_request_order() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("serve", |d| {
            d.replace_message(None, |message| {
                let mut response = message.clone();
                response.body = "ok".into();
                Ok(Replacement::Message(response))
            });
        });
        builder.pipeline("main", |d| {
            d.demux().to("serve");
        });
    });

    for event in request("/a") {
        rig.input(event);
    }
    for event in request("/b") {
        rig.input(event);
    }

    let events = rig.events();
    assert_eq!(message_balance(&events), (2, 2));
    assert_eq!(data_text(&events), "okok");
    // Head metadata came back in request order.
    let paths: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::MessageStart(start) => {
                start.head().and_then(|h| h.get("path")).and_then(|p| p.as_str()).map(String::from)
            }
            _ => None,
        })
        .collect();
    assert_eq!(paths, ["/a", "/b"]);
}

/// Scenario 2: fork fan-out. Three branches each observe the cloned
/// event; the main output passes the original through exactly once.
#[test]
fn fork_fan_out_clones_to_each_branch() {
    let seen = recording();
    let seen2 = seen.clone();
    let mut rig = rig_with(move |builder| {
        builder.pipeline("main", move |d| {
            d.fork(vec![json!(1), json!(2), json!(3)]).to_inline(move |sub| {
                sub.probe(seen2.clone());
            });
        });
    });

    rig.input(Event::data("hi"));

    let observed = seen.lock().clone();
    let copies = observed
        .iter()
        .filter(|e| matches!(e, Event::Data(d) if d.to_string_lossy() == "hi"))
        .count();
    assert_eq!(copies, 3);
    assert_eq!(rig.text(), "hi");
}

/// Scenario 3: forkJoin barrier. The main stream is held until every
/// branch has reached `StreamEnd`; with branches gated on a 10ms timeout,
/// the release happens at >= 10ms.
#[test]
fn fork_join_releases_main_only_after_all_branches_end() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.fork_join(vec![json!("a"), json!("b")]).to_inline(|sub| {
                // Each branch parks its clone of the terminal for 10ms
                // before ending.
                sub.wait_timeout(|_| false, Duration::from_millis(10));
                sub.dummy();
            });
        });
    });

    rig.input(Event::data("X"));
    rig.input(Event::stream_end(ErrorKind::NoError));
    assert_eq!(rig.text(), "");

    rig.advance(Duration::from_millis(5));
    assert_eq!(rig.text(), "");

    rig.advance(Duration::from_millis(6));
    let events = rig.events();
    assert_eq!(data_text(&events), "X");
    assert!(events.last().is_some_and(Event::is_stream_end));
}

/// Scenario 4: replay with delay. First attempt asks for a retry; the
/// buffered events are re-delivered verbatim after the 50ms delay and the
/// second attempt succeeds.
#[test]
fn replay_retries_once_after_the_delay() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    let attempts = Arc::new(AtomicUsize::new(0));
    let delivered = recording();
    let (attempts2, delivered2) = (attempts.clone(), delivered.clone());

    let mut rig = rig_with(move |builder| {
        let attempts3 = attempts2.clone();
        let delivered3 = delivered2.clone();
        builder.pipeline("upstream", move |d| {
            let attempts4 = attempts3.clone();
            d.probe(delivered3.clone());
            d.replace_message(None, move |_| {
                if attempts4.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(Replacement::Event(Event::stream_end(ErrorKind::Replay)))
                } else {
                    Ok(Replacement::Message(Message::new(None, "success")))
                }
            });
        });
        builder.pipeline("main", |d| {
            d.replay(Duration::from_millis(50)).to("upstream");
        });
    });

    rig.input_message(Some(json!({"try": 1})), "body");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(rig.text(), "");

    // Elapsed < delay: no retry yet.
    rig.advance(Duration::from_millis(40));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // Delay reached: exactly one replay, verbatim.
    rig.advance(Duration::from_millis(20));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(rig.text(), "success");

    let observed = delivered.lock().clone();
    assert_eq!(message_balance(&observed), (2, 2));
    assert_eq!(data_text(&observed), "bodybody");

    // No further retries are pending.
    rig.advance(Duration::from_millis(200));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// Scenario 5: branch commit. The whole message, body included, routes to
/// the default branch; the non-matching branch sees nothing.
#[test]
fn branch_message_commits_the_whole_message_to_one_arm() {
    let a_seen = recording();
    let b_seen = recording();
    let (a2, b2) = (a_seen.clone(), b_seen.clone());

    let mut rig = rig_with(move |builder| {
        let a3 = a2.clone();
        let b3 = b2.clone();
        builder.pipeline("a", move |d| {
            d.probe(a3.clone());
        });
        builder.pipeline("b", move |d| {
            d.probe(b3.clone());
        });
        builder.pipeline("main", |d| {
            d.branch_message(vec![
                BranchArm::when(
                    |arg| match arg {
                        BranchArg::Message(m) => {
                            m.head.as_ref().and_then(|h| h.get("path")) == Some(&json!("/a"))
                        }
                        _ => false,
                    },
                    "a",
                ),
                BranchArm::otherwise("b"),
            ]);
        });
    });

    rig.input_message(Some(json!({"path": "/b"})), "x");

    assert!(a_seen.lock().is_empty(), "no byte may reach branch a");
    let routed = b_seen.lock().clone();
    assert_eq!(message_balance(&routed), (1, 1));
    assert_eq!(data_text(&routed), "x");
}

/// Scenario 6: swap broadcast between two pipelines on one hub, and a
/// departed party going silent without error.
#[test]
fn swap_broadcast_reaches_peers_but_not_self() {
    let mut worker = Worker::new();
    let hub = worker.new_hub();
    let mut builder = ModuleBuilder::new("specs");
    builder.pipeline("party", move |d| {
        d.swap(hub);
    });
    let module = builder.build().unwrap();

    let mut party = |worker: &mut Worker| {
        let out = recording();
        let sink = worker.add_sink(Box::new(Collector::new(out.clone())));
        let p = worker.spawn_named(&module, "party", OutputTarget::Sink(sink)).unwrap();
        worker.start(p, &[]);
        (p, out)
    };
    let (p1, out1) = party(&mut worker);
    let (p2, out2) = party(&mut worker);

    worker.input(p1, Event::data("ping"));
    assert_eq!(data_text(&out2.lock()), "ping");
    assert_eq!(data_text(&out1.lock()), "");

    // P2 closes; P1's next broadcast reaches nobody and nothing fails.
    worker.release(p2);
    worker.input(p1, Event::data("x"));
    assert_eq!(data_text(&out1.lock()), "");
    assert_eq!(data_text(&out2.lock()), "ping");
}

/// Invariant: `demux ∘ mux` over a single identity session reproduces the
/// message sequence.
#[test]
fn demux_of_mux_is_identity_on_messages() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("origin", |d| {
            // The far end echoes every message verbatim.
            d.replace_message(None, |message| Ok(Replacement::Message(message.clone())));
        });
        builder.pipeline("via-mux", |d| {
            d.mux(|_, _| SmolStr::new_static("origin"), MuxOptions::default()).to("origin");
        });
        builder.pipeline("main", |d| {
            d.demux().to("via-mux");
        });
    });

    rig.input_message(Some(json!({"n": 1})), "first");
    rig.input_message(Some(json!({"n": 2})), "second");

    let events = rig.events();
    assert_eq!(message_balance(&events), (2, 2));
    assert_eq!(data_text(&events), "firstsecond");
}

/// Invariant: `wait(() => true)` is identity on any event stream.
#[test]
fn wait_true_is_identity() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("main", |d| {
            d.wait(|_| true);
        });
    });
    rig.input_message(Some(json!({"any": 1})), "abc");
    rig.input(Event::stream_end(ErrorKind::NoError));

    let events = rig.events();
    assert_eq!(message_balance(&events), (1, 1));
    assert_eq!(data_text(&events), "abc");
    assert!(events.last().is_some_and(Event::is_stream_end));
}

/// Invariant: MessageStart and MessageEnd counts balance at every output
/// boundary of a compound pipeline.
#[test]
fn message_balance_holds_through_compound_pipelines() {
    let mut rig = rig_with(|builder| {
        builder.pipeline("serve", |d| {
            d.replace_message(None, |m| Ok(Replacement::Message(m.clone())));
        });
        builder.pipeline("main", |d| {
            d.handle_message(None, |_| Ok(sluice_engine::Settle::Done));
            d.demux().to("serve");
        });
    });
    for n in 0..5 {
        rig.input_message(Some(json!({"n": n})), "zzz");
    }
    let (starts, ends) = message_balance(&rig.events());
    assert_eq!(starts, 5);
    assert_eq!(ends, 5);
}
