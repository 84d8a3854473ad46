// crates/submission-gate-registry/src/validate.rs
// ============================================================================
// Module: Payload Validation
// Description: JSON Schema compilation and full-violation evaluation.
// Purpose: Report every violation with its instance path, fail closed on
//          uncompilable schemas.
// Dependencies: submission-gate-core, jsonschema, serde_json
// ============================================================================

//! ## Overview
//! Validation is a pure function over a schema document and a payload. The
//! outcome lists every violation (JSON Pointer path plus message); an empty
//! list means the payload satisfies the schema. Schemas are interpreted as
//! Draft 2020-12.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use submission_gate_core::Violation;

use crate::registry::RegistryError;

// ============================================================================
// SECTION: Validation Outcome
// ============================================================================

/// Result of validating a payload against a schema.
///
/// # Invariants
/// - `violations` is non-empty iff the payload is invalid, and lists every
///   violation in schema-evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Every violation found.
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    /// Returns true when the payload satisfied every rule in the schema.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// SECTION: Validation Functions
// ============================================================================

/// Compiles a JSON Schema document for validation.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidSchema`] when the document does not
/// compile as Draft 2020-12.
pub fn compile_schema(schema: &Value) -> Result<Validator, RegistryError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| RegistryError::InvalidSchema(format!("invalid schema: {err}")))
}

/// Validates a payload against a schema document, enumerating every
/// violation.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidSchema`] when the schema does not
/// compile; payload violations are reported in the outcome, not as errors.
pub fn validate_payload(
    schema: &Value,
    payload: &Value,
) -> Result<ValidationOutcome, RegistryError> {
    let validator = compile_schema(schema)?;
    let violations = validator
        .iter_errors(payload)
        .map(|err| Violation::at(err.instance_path().to_string(), err.to_string()))
        .collect::<Vec<Violation>>();
    Ok(ValidationOutcome {
        violations,
    })
}
