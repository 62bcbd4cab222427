// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate and concurrency limiting.
//!
//! Three filters share one bucket abstraction with per-account quotas.
//! Accounts are lazily refilled against the clock; an account left full
//! and unwatched long enough is reaped by the sweep.

use crate::arena::PipelineHandle;
use crate::context::Context;
use crate::filter::{Filter, FilterCtx};
use crate::scheduler::TimerToken;
use parking_lot::Mutex;
use smol_str::SmolStr;
use sluice_core::{Event, EventBuffer};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How quota is accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleKind {
    /// One token per `MessageStart`.
    MessageRate,
    /// `len(data)` tokens per `Data` chunk, split at bucket boundaries.
    DataRate,
    /// One token per stream, returned at `StreamEnd`.
    Concurrency,
}

/// Which bucket a stream draws from.
#[derive(Clone)]
pub enum AccountSelector {
    Global,
    Key(SmolStr),
    Fn(Arc<dyn Fn(&Context) -> SmolStr + Send + Sync>),
}

#[derive(Clone)]
pub struct ThrottleOptions {
    /// Tokens supplied per interval (bucket capacity).
    pub quota: f64,
    /// Refill period.
    pub interval: Duration,
    pub account: AccountSelector,
}

impl ThrottleOptions {
    pub fn new(quota: f64) -> Self {
        Self { quota, interval: Duration::from_secs(1), account: AccountSelector::Global }
    }
}

/// Reap accounts idle longer than this with a full bucket and no waiters.
const ACCOUNT_SWEEP_TTL: Duration = Duration::from_secs(60);

struct Account {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
    last_used: Instant,
    waiters: VecDeque<(PipelineHandle, u32)>,
}

impl Account {
    fn new(capacity: f64, now: Instant) -> Self {
        Self { tokens: capacity, capacity, last_refill: now, last_used: now, waiters: VecDeque::new() }
    }

    fn refill(&mut self, rate_per_sec: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * rate_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Seconds until `needed` tokens are available at the given rate.
    fn eta(&self, needed: f64, rate_per_sec: f64) -> Duration {
        let missing = (needed - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / rate_per_sec)
    }
}

struct AccountTable {
    accounts: HashMap<SmolStr, Account>,
    capacity: f64,
}

impl AccountTable {
    fn account(&mut self, key: &SmolStr, now: Instant) -> &mut Account {
        self.sweep(now);
        let capacity = self.capacity;
        let account =
            self.accounts.entry(key.clone()).or_insert_with(|| Account::new(capacity, now));
        account.last_used = now;
        account
    }

    fn sweep(&mut self, now: Instant) {
        self.accounts.retain(|_, a| {
            !a.waiters.is_empty()
                || a.tokens < a.capacity
                || now.saturating_duration_since(a.last_used) < ACCOUNT_SWEEP_TTL
        });
    }
}

/// Shared bucket filter; the kind decides the cost function.
pub struct Throttle {
    kind: ThrottleKind,
    options: ThrottleOptions,
    table: Arc<Mutex<AccountTable>>,
    key: Option<SmolStr>,
    queue: EventBuffer,
    blocked: bool,
    timer: Option<TimerToken>,
    holding: bool,
    enrolled: bool,
}

impl Throttle {
    pub fn new(kind: ThrottleKind, options: ThrottleOptions) -> Self {
        let table = Arc::new(Mutex::new(AccountTable {
            accounts: HashMap::new(),
            capacity: options.quota,
        }));
        Self::with_table(kind, options, table)
    }

    fn with_table(
        kind: ThrottleKind,
        options: ThrottleOptions,
        table: Arc<Mutex<AccountTable>>,
    ) -> Self {
        Self {
            kind,
            options,
            table,
            key: None,
            queue: EventBuffer::new(),
            blocked: false,
            timer: None,
            holding: false,
            enrolled: false,
        }
    }

    fn rate_per_sec(&self) -> f64 {
        self.options.quota / self.options.interval.as_secs_f64().max(f64::EPSILON)
    }

    fn key(&mut self, ctx: &FilterCtx<'_>) -> SmolStr {
        if let Some(key) = &self.key {
            return key.clone();
        }
        let key = match &self.options.account {
            AccountSelector::Global => SmolStr::default(),
            AccountSelector::Key(key) => key.clone(),
            AccountSelector::Fn(f) => match ctx.context() {
                Some(context) => f(context),
                None => SmolStr::default(),
            },
        };
        self.key = Some(key.clone());
        key
    }

    fn block(&mut self, ctx: &mut FilterCtx<'_>, wait: Duration) {
        if !self.blocked {
            self.blocked = true;
            ctx.close_tap();
        }
        if self.timer.is_none() {
            self.timer = Some(ctx.schedule(wait.max(Duration::from_millis(1)), 0));
        }
    }

    /// Try to pass one event. Returns the event back if the bucket ran dry.
    fn emit_one(&mut self, ctx: &mut FilterCtx<'_>, event: Event) -> Option<Event> {
        let key = self.key(ctx);
        let now = ctx.now();
        let rate = self.rate_per_sec();
        match self.kind {
            ThrottleKind::MessageRate => {
                if !matches!(event, Event::MessageStart(_)) {
                    ctx.output(event);
                    return None;
                }
                let wait = {
                    let mut table = self.table.lock();
                    let account = table.account(&key, now);
                    account.refill(rate, now);
                    if account.tokens >= 1.0 {
                        account.tokens -= 1.0;
                        None
                    } else {
                        Some(account.eta(1.0, rate))
                    }
                };
                match wait {
                    None => {
                        ctx.output(event);
                        None
                    }
                    Some(wait) => {
                        self.block(ctx, wait);
                        Some(event)
                    }
                }
            }
            ThrottleKind::DataRate => {
                let Event::Data(data) = event else {
                    ctx.output(event);
                    return None;
                };
                let (passed, rest, wait) = {
                    let mut table = self.table.lock();
                    let account = table.account(&key, now);
                    account.refill(rate, now);
                    let available = account.tokens.floor().max(0.0) as usize;
                    if available >= data.len() {
                        account.tokens -= data.len() as f64;
                        (Some(data), None, None)
                    } else {
                        let mut rest = data;
                        let front = rest.shift(available);
                        account.tokens -= front.len() as f64;
                        let needed = (rest.len() as f64).min(account.capacity);
                        let wait = account.eta(needed.max(1.0), rate);
                        let front = (!front.is_empty()).then_some(front);
                        (front, Some(rest), Some(wait))
                    }
                };
                if let Some(front) = passed {
                    ctx.output(Event::Data(front));
                }
                match rest {
                    None => None,
                    Some(rest) => {
                        self.block(ctx, wait.unwrap_or(self.options.interval));
                        Some(Event::Data(rest))
                    }
                }
            }
            ThrottleKind::Concurrency => {
                if !self.holding {
                    let acquired = {
                        let mut table = self.table.lock();
                        let account = table.account(&key, now);
                        if account.tokens >= 1.0 {
                            account.tokens -= 1.0;
                            true
                        } else {
                            if !self.enrolled {
                                account.waiters.push_back((ctx.pipeline(), ctx.filter_index()));
                                self.enrolled = true;
                            }
                            false
                        }
                    };
                    if !acquired {
                        if !self.blocked {
                            self.blocked = true;
                            ctx.close_tap();
                        }
                        return Some(event);
                    }
                    self.holding = true;
                }
                let terminal = event.is_stream_end();
                ctx.output(event);
                if terminal {
                    self.release_slot(ctx);
                }
                None
            }
        }
    }

    fn release_slot(&mut self, ctx: &mut FilterCtx<'_>) {
        if !self.holding {
            return;
        }
        self.holding = false;
        let Some(key) = self.key.clone() else {
            return;
        };
        let waiter = {
            let mut table = self.table.lock();
            let account = table.account(&key, ctx.now());
            account.tokens = (account.tokens + 1.0).min(account.capacity);
            account.waiters.pop_front()
        };
        if let Some((pipeline, filter)) = waiter {
            ctx.notify_filter(pipeline, filter);
        }
    }

    fn drain(&mut self, ctx: &mut FilterCtx<'_>) {
        while !self.blocked {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            if let Some(unconsumed) = self.emit_one(ctx, event) {
                self.queue.requeue(unconsumed);
                break;
            }
        }
        if self.queue.is_empty() && !self.blocked {
            ctx.open_tap();
        }
    }
}

impl Filter for Throttle {
    fn name(&self) -> &'static str {
        match self.kind {
            ThrottleKind::MessageRate => "throttleMessageRate",
            ThrottleKind::DataRate => "throttleDataRate",
            ThrottleKind::Concurrency => "throttleConcurrency",
        }
    }

    fn clone_filter(&self) -> Box<dyn Filter> {
        Box::new(Self::with_table(self.kind, self.options.clone(), self.table.clone()))
    }

    fn process(&mut self, ctx: &mut FilterCtx<'_>, event: Event) {
        if self.blocked {
            self.queue.push(event);
            return;
        }
        if let Some(unconsumed) = self.emit_one(ctx, event) {
            self.queue.push(unconsumed);
        }
    }

    fn on_timer(&mut self, ctx: &mut FilterCtx<'_>, _tag: u64) {
        self.timer = None;
        self.blocked = false;
        self.drain(ctx);
    }

    fn on_notify(&mut self, ctx: &mut FilterCtx<'_>) {
        // A concurrency slot may have been returned.
        if self.kind == ThrottleKind::Concurrency && self.blocked {
            self.enrolled = false;
            self.blocked = false;
            self.drain(ctx);
        }
    }

    fn reset(&mut self, ctx: &mut FilterCtx<'_>) {
        if let Some(token) = self.timer.take() {
            ctx.cancel_timer(token);
        }
        self.release_slot(ctx);
        if self.enrolled {
            if let Some(key) = self.key.clone() {
                let mut table = self.table.lock();
                let pipeline = ctx.pipeline();
                let account = table.account(&key, ctx.now());
                account.waiters.retain(|(p, _)| *p != pipeline);
            }
            self.enrolled = false;
        }
        self.key = None;
        self.queue.clear();
        self.blocked = false;
    }
}

#[cfg(test)]
#[path = "throttle_tests.rs"]
mod tests;
