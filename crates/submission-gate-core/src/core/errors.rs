// crates/submission-gate-core/src/core/errors.rs
// ============================================================================
// Module: Submission Gate Error Taxonomy
// Description: User-visible error classification for pipeline operations.
// Purpose: Provide stable machine-readable codes plus human messages.
// Dependencies: crate::core::{identifiers, model}, thiserror
// ============================================================================

//! ## Overview
//! Every user-visible failure carries a stable machine-readable code and a
//! human message. Validation and precondition failures carry full detail
//! (field paths, offending file ids) so callers can correct and resubmit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::ObjectId;
use crate::core::model::Violation;

// ============================================================================
// SECTION: Service Errors
// ============================================================================

/// User-visible pipeline errors.
///
/// # Invariants
/// - Variants and their [`ServiceError::code`] labels are stable for
///   programmatic handling.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Payload violated its resolved schema; the caller corrects and
    /// resubmits.
    #[error("validation failed with {} violation(s)", .violations.len())]
    Validation {
        /// Every violation found, in schema-evaluation order.
        violations: Vec<Violation>,
    },
    /// Unknown schema, upload, analysis, or file identifier.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind label.
        entity: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },
    /// Illegal lifecycle transition.
    #[error("state conflict: {message}")]
    StateConflict {
        /// Description of the rejected transition.
        message: String,
    },
    /// Publication blocked by missing checksums or unverified files.
    #[error("precondition failed: {message}")]
    Precondition {
        /// Description of the failed precondition.
        message: String,
        /// Offending file object identifiers.
        object_ids: Vec<ObjectId>,
    },
    /// Existence verification exhausted its retries.
    #[error("publish failed: {service} unreachable: {message}")]
    TransientNetwork {
        /// Target service name.
        service: String,
        /// Originating cause after retry exhaustion.
        message: String,
    },
    /// Validation queue is saturated; the caller should retry later.
    #[error("submission queue saturated")]
    Overloaded {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: Option<u64>,
    },
    /// Identifier generation, serialization, or storage failure.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },
}

impl ServiceError {
    /// Returns the stable machine-readable code for the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation {
                ..
            } => "SCHEMA_VIOLATION",
            Self::NotFound {
                ..
            } => "NOT_FOUND",
            Self::StateConflict {
                ..
            } => "STATE_CONFLICT",
            Self::Precondition {
                ..
            } => "PRECONDITION_FAILED",
            Self::TransientNetwork {
                ..
            } => "PUBLISH_FAILED",
            Self::Overloaded {
                ..
            } => "OVERLOADED",
            Self::Internal {
                ..
            } => "INTERNAL_ERROR",
        }
    }

    /// Creates an internal error from any displayable cause.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
