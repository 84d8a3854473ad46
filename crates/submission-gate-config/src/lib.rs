// crates/submission-gate-config/src/lib.rs
// ============================================================================
// Module: Submission Gate Config
// Description: Configuration loading and validation.
// Purpose: Provide strict, fail-closed TOML config parsing for the
//          registration pipeline.
// Dependencies: submission-gate-service, submission-gate-store-sqlite,
//               submission-gate-verify, serde, toml
// ============================================================================

//! ## Overview
//! One TOML file configures the whole pipeline: the validation worker pool,
//! the external storage client, and the `SQLite` store. Loading fails
//! closed: missing required sections, out-of-range values, and oversized
//! files are all rejected before anything starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::SubmissionGateConfig;
