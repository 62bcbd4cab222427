// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sluice_core::{Clock, FakeClock};

fn wake(tag: u64) -> Wake {
    Wake::Sink { sink: SinkId(0), tag }
}

#[test]
fn timer_lifecycle() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set(wake(1), Duration::from_secs(10), clock.now());
    assert!(scheduler.has_timers());
    assert!(scheduler.next_deadline().is_some());

    // Timer hasn't fired yet
    clock.advance(Duration::from_secs(5));
    assert!(scheduler.fired(clock.now()).is_empty());
    assert!(scheduler.has_timers());

    // Timer fires
    clock.advance(Duration::from_secs(10));
    let wakes = scheduler.fired(clock.now());
    assert_eq!(wakes, vec![wake(1)]);
    assert!(!scheduler.has_timers());
}

#[test]
fn cancelled_timer_never_fires() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    let token = scheduler.set(wake(1), Duration::from_secs(10), clock.now());
    scheduler.cancel(token);

    clock.advance(Duration::from_secs(15));
    assert!(scheduler.fired(clock.now()).is_empty());
    assert!(!scheduler.has_timers());
}

#[test]
fn fires_in_deadline_order() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set(wake(2), Duration::from_secs(20), clock.now());
    scheduler.set(wake(1), Duration::from_secs(10), clock.now());

    clock.advance(Duration::from_secs(30));
    let wakes = scheduler.fired(clock.now());
    assert_eq!(wakes, vec![wake(1), wake(2)]);
}

#[test]
fn next_deadline_skips_cancelled() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    let near = scheduler.set(wake(1), Duration::from_secs(5), clock.now());
    scheduler.set(wake(2), Duration::from_secs(50), clock.now());
    scheduler.cancel(near);

    let deadline = scheduler.next_deadline().unwrap();
    assert!(deadline >= clock.now() + Duration::from_secs(50));
}
