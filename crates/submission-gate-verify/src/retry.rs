// crates/submission-gate-verify/src/retry.rs
// ============================================================================
// Module: Retry Policy
// Description: Exponential backoff policy and retry classification chain.
// Purpose: Decide whether and when a failed existence check is retried.
// Dependencies: submission-gate-core, serde
// ============================================================================

//! ## Overview
//! Backoff is exponential: the delay before retry `n` (1-based) is
//! `initial_interval_ms * multiplier^(n - 1)`. Classification runs an
//! ordered predicate chain; the first predicate that returns a verdict
//! wins, and a default predicate at the end of the chain retries only
//! unavailability and timeouts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use submission_gate_core::ExistenceError;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Exponential backoff retry policy.
///
/// # Invariants
/// - A policy permits `max_retries + 1` total attempts.
/// - `multiplier` must be at least 1.0; delays never shrink.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// Multiplier applied to the delay for each subsequent retry.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

/// Returns the default retry count.
const fn default_max_retries() -> u32 {
    5
}

/// Returns the default initial retry interval in milliseconds.
const fn default_initial_interval_ms() -> u64 {
    1_000
}

/// Returns the default backoff multiplier.
const fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Returns the total number of attempts this policy permits.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the delay before the given retry (1-based).
    ///
    /// Retry 1 waits the initial interval; each subsequent retry multiplies
    /// the previous delay. Overflowing delays saturate.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Delays are clamped to the u64 millisecond range before casting."
    )]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.multiplier.max(1.0).powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        let millis = (self.initial_interval_ms as f64 * factor).min(u64::MAX as f64);
        Duration::from_millis(millis as u64)
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Verdict from a single retry predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the failed attempt.
    Retry,
    /// Fail fast without further attempts.
    Fail,
}

/// Ordered predicate over existence errors; `None` defers to the next
/// predicate in the chain.
pub type RetryPredicate = fn(&ExistenceError) -> Option<RetryDecision>;

/// Runs the predicate chain over an error; the first verdict wins.
///
/// The default classification at the end of the chain retries
/// [`ExistenceError::Unavailable`] and [`ExistenceError::Timeout`] and fails
/// fast on everything else. Client rejections are never retried, even by
/// custom predicates placed ahead of the default.
#[must_use]
pub fn retry_verdict(chain: &[RetryPredicate], error: &ExistenceError) -> RetryDecision {
    if matches!(error, ExistenceError::Client { .. }) {
        return RetryDecision::Fail;
    }
    for predicate in chain {
        if let Some(decision) = predicate(error) {
            return decision;
        }
    }
    match error {
        ExistenceError::Unavailable { .. } | ExistenceError::Timeout(_) => RetryDecision::Retry,
        ExistenceError::Client { .. }
        | ExistenceError::Transport(_)
        | ExistenceError::Exhausted { .. } => RetryDecision::Fail,
    }
}
