// crates/submission-gate-service/src/lib.rs
// ============================================================================
// Module: Submission Gate Service
// Description: Submission ledger, validation pool, lifecycle, and search.
// Purpose: Orchestrate the validation and publication pipeline over the
//          store, registry, and existence verifier.
// Dependencies: submission-gate-core, submission-gate-registry, regex, uuid
// ============================================================================

//! ## Overview
//! This crate wires the pipeline together: the submission ledger accepts
//! payloads and enqueues them on a bounded validation worker pool, the
//! lifecycle service governs publish/unpublish/suppress with existence
//! verification, and the search engine evaluates key-chain regex terms over
//! persisted dynamic JSON. Lifecycle transitions emit `tracing` events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ids;
pub mod ledger;
pub mod lifecycle;
pub mod payload;
pub mod search;
pub mod workers;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ids::UuidIdentifierGenerator;
pub use ledger::SubmissionLedger;
pub use lifecycle::AnalysisLifecycle;
pub use search::SearchEngine;
pub use workers::PoolError;
pub use workers::ValidationJob;
pub use workers::ValidationWorkerPool;
pub use workers::WorkerPoolConfig;
