// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded tick/deadline polling.
//!
//! Every "wait for something remote to finish" in the orchestrator goes
//! through [`poll_until`]: a check runs once per `interval`, starting one
//! interval after the call, until it reports ready, aborts, or the hard
//! `timeout` deadline passes. Timing is driven by `tokio::time`, so tests run
//! the loop on a paused clock.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Interval and deadline for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Time between checks.
    pub interval: Duration,
    /// Wall-clock deadline measured from the start of the loop.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Create a policy.
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// Finished with a value.
    Ready(T),
    /// Not finished yet; check again on the next tick.
    Pending,
}

/// Why a polling loop ended without a value.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError<E> {
    /// The deadline passed before the check reported ready.
    TimedOut {
        /// Checks that ran.
        attempts: u32,
    },
    /// The check returned a hard error.
    Aborted(E),
}

/// Run `check` once per tick until it is ready, errors, or the deadline passes.
///
/// `check` receives the 1-based attempt number.
pub async fn poll_until<T, E, F, Fut>(policy: PollPolicy, mut check: F) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Poll<T>, E>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0;
    let mut tick = 0;

    loop {
        tick = next_tick_index(start, policy.interval, tick);
        match tick_instant(start, policy.interval, tick) {
            Some(next_tick) if next_tick <= deadline => {
                tokio::time::sleep_until(next_tick).await
            }
            _ => {
                tokio::time::sleep_until(deadline).await;
                return Err(PollError::TimedOut { attempts });
            }
        }

        attempts += 1;
        match check(attempts).await {
            Ok(Poll::Ready(value)) => return Ok(value),
            Ok(Poll::Pending) => {}
            Err(e) => return Err(PollError::Aborted(e)),
        }

        if Instant::now() >= deadline {
            return Err(PollError::TimedOut { attempts });
        }
    }
}

/// Ticks sit on `start + n * interval`. A check that overran one or more
/// ticks resumes on the first tick not already in the past.
fn next_tick_index(start: Instant, interval: Duration, last: u32) -> u32 {
    let following = last.saturating_add(1);
    if interval.is_zero() {
        return following;
    }
    let elapsed = Instant::now().saturating_duration_since(start).as_nanos();
    let due = elapsed.div_ceil(interval.as_nanos());
    u32::try_from(due).unwrap_or(u32::MAX).max(following)
}

fn tick_instant(start: Instant, interval: Duration, tick: u32) -> Option<Instant> {
    start.checked_add(interval.checked_mul(tick)?)
}
