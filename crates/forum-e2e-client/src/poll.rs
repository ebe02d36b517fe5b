// crates/forum-e2e-client/src/poll.rs
// ============================================================================
// Module: Polling Waiter
// Description: Generic bounded-retry loop for eventually-consistent checks.
// Purpose: Wait for async side effects without arbitrary sleeps or busy loops.
// Dependencies: tokio, tracing
// ============================================================================

//! ## Overview
//! Repeatedly invokes an async probe until it produces a match or the attempt
//! budget (`ceil(timeout / interval)`) is exhausted. Each miss suspends only
//! the calling task via [`tokio::time::sleep`]; other drivers in multi-actor
//! scenarios keep running on their own schedules.
//!
//! Invariants:
//! - The probe is never invoked more than the attempt budget.
//! - Probe errors propagate immediately; only a `NotYet` outcome retries.

use std::future::Future;
use std::time::Duration;
use std::time::Instant;

use tokio::time::sleep;
use tracing::warn;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Unsuccessful-polling warning threshold.
const SLOW_POLL_WARN_AFTER: Duration = Duration::from_secs(10);

/// Window before budget exhaustion in which a final warning is emitted.
const ENDGAME_WARN_WINDOW: Duration = Duration::from_secs(3);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Bounds for one polling loop.
///
/// # Invariants
/// - `timeout` and `interval` are both greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total budget for the loop.
    pub timeout: Duration,
    /// Pause between unsuccessful attempts.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_millis(500),
        }
    }
}

impl PollConfig {
    /// Builds a validated poll configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] when either duration is zero.
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self, HarnessError> {
        if timeout.is_zero() {
            return Err(HarnessError::Settings {
                detail: "poll timeout must be greater than zero".to_string(),
            });
        }
        if interval.is_zero() {
            return Err(HarnessError::Settings {
                detail: "poll interval must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            timeout,
            interval,
        })
    }

    /// Returns the attempt budget, `ceil(timeout / interval)`.
    #[must_use]
    pub fn attempt_budget(&self) -> u64 {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX).max(1);
        timeout_ms.div_ceil(interval_ms).max(1)
    }
}

/// Outcome of one probe invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The condition holds; polling stops with this value.
    Match(T),
    /// No match yet; carries a description of what was observed instead.
    NotYet(String),
}

/// Which one-time warning a miss should trigger, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WarnStage {
    /// The loop has been missing for a while.
    Slow,
    /// The budget is nearly exhausted.
    Endgame,
}

/// Decides which warning, if any, this miss should emit. Each stage fires at
/// most once, and either can fire without the other: a short budget reaches
/// the endgame window before the slow threshold.
fn next_warn_stage(
    elapsed: Duration,
    remaining: Duration,
    warned_slow: bool,
    warned_endgame: bool,
) -> Option<WarnStage> {
    if !warned_slow && elapsed >= SLOW_POLL_WARN_AFTER {
        Some(WarnStage::Slow)
    } else if !warned_endgame && remaining <= ENDGAME_WARN_WINDOW {
        Some(WarnStage::Endgame)
    } else {
        None
    }
}

// ============================================================================
// SECTION: Polling Loop
// ============================================================================

/// Polls `probe` until it matches or the attempt budget is exhausted.
///
/// `what` names the awaited condition for logs and the timeout error. After
/// ten seconds of misses a one-time warning describes the latest observation,
/// and one more is emitted shortly before the budget runs out; misses are
/// never logged per attempt.
///
/// # Errors
///
/// Returns [`HarnessError::PollTimeout`] on exhaustion, carrying the attempt
/// count and the last non-matching observation. Probe errors propagate as-is.
pub async fn poll_until<T, F, Fut>(
    config: &PollConfig,
    what: &str,
    mut probe: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, HarnessError>>,
{
    let budget = config.attempt_budget();
    let started = Instant::now();
    let mut last_observation = "nothing observed yet".to_string();
    let mut warned_slow = false;
    let mut warned_endgame = false;
    for attempt in 1..=budget {
        match probe().await? {
            PollStatus::Match(value) => return Ok(value),
            PollStatus::NotYet(observation) => last_observation = observation,
        }
        let elapsed = started.elapsed();
        let remaining = config.timeout.saturating_sub(elapsed);
        match next_warn_stage(elapsed, remaining, warned_slow, warned_endgame) {
            Some(WarnStage::Slow) => {
                warned_slow = true;
                warn!(
                    "still waiting for {what} after {}s; last observation: {last_observation}",
                    elapsed.as_secs()
                );
            }
            Some(WarnStage::Endgame) => {
                warned_endgame = true;
                warn!(
                    "about to time out waiting for {what}; last observation: {last_observation}"
                );
            }
            None => {}
        }
        if attempt < budget {
            sleep(config.interval).await;
        }
    }
    Err(HarnessError::PollTimeout {
        what: what.to_string(),
        attempts: budget,
        last_observation,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
