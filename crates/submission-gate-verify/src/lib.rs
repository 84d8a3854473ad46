// crates/submission-gate-verify/src/lib.rs
// ============================================================================
// Module: Submission Gate Verify
// Description: Existence verification against external object storage.
// Purpose: Confirm referenced files exist before publication, with retries.
// Dependencies: submission-gate-core, reqwest
// ============================================================================

//! ## Overview
//! This crate provides the storage existence client used during publication:
//! a blocking HTTP client that asks external object storage whether each
//! referenced object exists, retrying transient failures with exponential
//! backoff and failing fast on client errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod retry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::StorageClientConfig;
pub use client::StorageExistenceClient;
pub use retry::RetryDecision;
pub use retry::RetryPolicy;
pub use retry::RetryPredicate;
pub use retry::retry_verdict;
