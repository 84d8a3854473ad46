// crates/submission-gate-verify/tests/retry_unit.rs
// ============================================================================
// Module: Retry Policy Unit Tests
// Description: Backoff arithmetic and retry classification tests.
// Purpose: Validate exponential delays, attempt counting, and the ordered
//          predicate chain.
// ============================================================================

//! ## Overview
//! Pure tests over the retry policy: delay growth, total attempt counts,
//! default classification of each error class, and predicate chain
//! precedence.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::time::Duration;

use proptest::prelude::proptest;
use submission_gate_core::ExistenceError;
use submission_gate_verify::RetryDecision;
use submission_gate_verify::RetryPolicy;
use submission_gate_verify::retry_verdict;

/// Verifies the delay doubles for each retry with a 2.0 multiplier.
#[test]
fn delays_grow_exponentially() {
    let policy = RetryPolicy {
        max_retries: 5,
        initial_interval_ms: 1_000,
        multiplier: 2.0,
    };
    assert_eq!(policy.delay_for_retry(1), Duration::from_millis(1_000));
    assert_eq!(policy.delay_for_retry(2), Duration::from_millis(2_000));
    assert_eq!(policy.delay_for_retry(3), Duration::from_millis(4_000));
}

/// Verifies a policy permits one attempt more than its retry count.
#[test]
fn attempt_count_includes_the_initial_attempt() {
    let policy = RetryPolicy {
        max_retries: 5,
        initial_interval_ms: 1_000,
        multiplier: 2.0,
    };
    assert_eq!(policy.total_attempts(), 6);

    let no_retries = RetryPolicy {
        max_retries: 0,
        initial_interval_ms: 1_000,
        multiplier: 2.0,
    };
    assert_eq!(no_retries.total_attempts(), 1);
}

/// Verifies the default classification of each error class.
#[test]
fn default_classification_retries_only_transient_errors() {
    let unavailable = ExistenceError::Unavailable {
        status: 503,
    };
    let timeout = ExistenceError::Timeout("deadline exceeded".to_string());
    let client = ExistenceError::Client {
        status: 404,
    };
    let transport = ExistenceError::Transport("connection refused".to_string());

    assert_eq!(retry_verdict(&[], &unavailable), RetryDecision::Retry);
    assert_eq!(retry_verdict(&[], &timeout), RetryDecision::Retry);
    assert_eq!(retry_verdict(&[], &client), RetryDecision::Fail);
    assert_eq!(retry_verdict(&[], &transport), RetryDecision::Fail);
}

/// Verifies the first predicate verdict wins over later predicates.
#[test]
fn predicate_chain_first_verdict_wins() {
    fn retry_transport(error: &ExistenceError) -> Option<RetryDecision> {
        matches!(error, ExistenceError::Transport(_)).then_some(RetryDecision::Retry)
    }
    fn fail_everything(_: &ExistenceError) -> Option<RetryDecision> {
        Some(RetryDecision::Fail)
    }

    let transport = ExistenceError::Transport("connection reset".to_string());
    assert_eq!(retry_verdict(&[retry_transport, fail_everything], &transport), RetryDecision::Retry);
    assert_eq!(retry_verdict(&[fail_everything, retry_transport], &transport), RetryDecision::Fail);
}

/// Verifies client rejections are never retried, regardless of the chain.
#[test]
fn client_rejections_are_never_retried() {
    fn retry_everything(_: &ExistenceError) -> Option<RetryDecision> {
        Some(RetryDecision::Retry)
    }

    let client = ExistenceError::Client {
        status: 400,
    };
    assert_eq!(retry_verdict(&[retry_everything], &client), RetryDecision::Fail);
}

proptest! {
    /// Delays never shrink as the retry index grows.
    #[test]
    fn delays_are_monotonic(
        initial in 1_u64..10_000,
        multiplier in 1.0_f64..4.0,
        retry in 1_u32..20,
    ) {
        let policy = RetryPolicy {
            max_retries: 20,
            initial_interval_ms: initial,
            multiplier,
        };
        let current = policy.delay_for_retry(retry);
        let next = policy.delay_for_retry(retry + 1);
        assert!(next >= current);
    }
}
