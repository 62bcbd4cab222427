// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use sluice_core::Message;
use sluice_engine::ModuleBuilder;

fn tick_module() -> Arc<Module> {
    let mut builder = ModuleBuilder::new("test");
    builder.pipeline("tick", |d| {
        d.on_start(Message::new(None, "fired").events());
    });
    builder.build().unwrap()
}

fn collecting_output() -> (OutputFn, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let output: OutputFn = Arc::new(move |event| seen2.lock().push(event));
    (output, seen)
}

#[tokio::test]
async fn one_shot_task_fires_once_and_returns() {
    let (output, seen) = collecting_output();
    let runner = TaskRunner::new(tick_module(), "tick", None, output);
    runner.run().await.unwrap();

    let events = seen.lock();
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            Event::Data(d) => Some(d.to_string_lossy()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "fired");
    assert!(events.iter().any(Event::is_stream_end));
}

#[tokio::test]
async fn periodic_task_fires_repeatedly() {
    let (output, seen) = collecting_output();
    let runner =
        TaskRunner::new(tick_module(), "tick", Some(Duration::from_millis(20)), output);
    let task = tokio::spawn(runner.run());
    tokio::time::sleep(Duration::from_millis(130)).await;
    task.abort();

    let fired = seen
        .lock()
        .iter()
        .filter(|e| matches!(e, Event::Data(_)))
        .count();
    assert!(fired >= 3, "expected several firings, saw {fired}");
}

#[tokio::test]
async fn unknown_pipeline_name_fails_fast() {
    let (output, _seen) = collecting_output();
    let runner = TaskRunner::new(tick_module(), "missing", None, output);
    assert!(matches!(runner.run().await, Err(crate::AdapterError::Layout(_))));
}
