// crates/submission-gate-service/src/ids.rs
// ============================================================================
// Module: UUID Identifier Generator
// Description: Globally unique identifier generation via UUID v4.
// Purpose: Default IdentifierGenerator for uploads and analyses.
// Dependencies: submission-gate-core, uuid
// ============================================================================

//! ## Overview
//! Identifiers are random UUID v4 strings. Generation is infallible in
//! practice; the trait's error channel exists for alternative backends.

// ============================================================================
// SECTION: Imports
// ============================================================================

use submission_gate_core::IdError;
use submission_gate_core::IdentifierGenerator;
use uuid::Uuid;

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Identifier generator backed by random UUID v4 values.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdentifierGenerator;

impl IdentifierGenerator for UuidIdentifierGenerator {
    fn new_id(&self) -> Result<String, IdError> {
        Ok(Uuid::new_v4().to_string())
    }
}
