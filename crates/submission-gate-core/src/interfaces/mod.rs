// crates/submission-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Submission Gate Interfaces
// Description: Backend-agnostic interfaces for identifiers, storage, and
//              existence verification.
// Purpose: Define the contract surfaces used by the registration pipeline.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with external systems
//! without embedding backend-specific details. Implementations must fail
//! closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::AnalysisId;
use crate::core::identifiers::ObjectId;
use crate::core::identifiers::SchemaName;
use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::UploadId;
use crate::core::model::Analysis;
use crate::core::model::AnalysisState;
use crate::core::model::AnalysisTypeRef;
use crate::core::model::AnalysisTypeSchema;
use crate::core::model::FileEntity;
use crate::core::model::FileUpdateRequest;
use crate::core::model::Upload;
use crate::core::model::UploadState;
use crate::core::model::Violation;

// ============================================================================
// SECTION: Identifier Generator
// ============================================================================

/// Identifier generation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum IdError {
    /// Identifier generation failed.
    #[error("identifier generation failed: {0}")]
    Generation(String),
}

/// Issues globally unique identifiers for new entities.
pub trait IdentifierGenerator {
    /// Returns a new, globally unique identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] when an identifier cannot be produced.
    fn new_id(&self) -> Result<String, IdError>;
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Persistent store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is invalid or failed to (de)serialize.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Uniqueness or integrity constraint violated.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Store engine reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Schema Store
// ============================================================================

/// Persistence for named, versioned analysis type schemas.
pub trait SchemaStore {
    /// Stores a schema under the next version for `name` and returns the
    /// assigned version. Version assignment and insertion are atomic.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema cannot be stored.
    fn register_schema(
        &self,
        name: &SchemaName,
        schema: &Value,
    ) -> Result<SchemaVersion, StoreError>;

    /// Loads a schema by name and version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when lookup fails.
    fn get_schema(
        &self,
        name: &SchemaName,
        version: SchemaVersion,
    ) -> Result<Option<AnalysisTypeSchema>, StoreError>;

    /// Loads the latest version of a schema by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when lookup fails.
    fn latest_schema(&self, name: &SchemaName) -> Result<Option<AnalysisTypeSchema>, StoreError>;

    /// Loads every registered schema, for startup cache construction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_all_schemas(&self) -> Result<Vec<AnalysisTypeSchema>, StoreError>;
}

// ============================================================================
// SECTION: Upload Store
// ============================================================================

/// Persistence for in-flight submissions.
pub trait UploadStore {
    /// Inserts a new upload record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when insertion fails.
    fn insert_upload(&self, upload: &Upload) -> Result<(), StoreError>;

    /// Loads an upload by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when lookup fails.
    fn get_upload(&self, upload_id: &UploadId) -> Result<Option<Upload>, StoreError>;

    /// Records a validation outcome: sets the state, appends errors, and
    /// stores the schema version the payload was validated against (present
    /// only for successful validations).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn record_validation(
        &self,
        upload_id: &UploadId,
        state: UploadState,
        errors: &[Violation],
        validated_type: Option<&AnalysisTypeRef>,
    ) -> Result<(), StoreError>;

    /// Resets an upload for resubmission: replaces the payload, clears
    /// errors and the validated type, and returns the state to `Created`,
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn reset_for_resubmission(
        &self,
        upload_id: &UploadId,
        payload: &Value,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Analysis Store
// ============================================================================

/// Persistence for analyses and their linked entities.
pub trait AnalysisStore {
    /// Persists an analysis aggregate (header, dynamic data, files, and
    /// sample links) and marks the originating upload `Saved`, all within
    /// one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any part of the transaction fails.
    fn persist_analysis(&self, upload_id: &UploadId, analysis: &Analysis)
    -> Result<(), StoreError>;

    /// Loads an analysis aggregate (including files and samples).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when lookup fails.
    fn get_analysis(&self, analysis_id: &AnalysisId) -> Result<Option<Analysis>, StoreError>;

    /// Transitions an analysis from an expected state to a new state.
    /// Returns false when the row was not in the expected state, which
    /// serializes concurrent transitions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn transition_analysis(
        &self,
        analysis_id: &AnalysisId,
        from: AnalysisState,
        to: AnalysisState,
    ) -> Result<bool, StoreError>;

    /// Marks an analysis suppressed regardless of its current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn mark_suppressed(&self, analysis_id: &AnalysisId) -> Result<(), StoreError>;

    /// Loads a file by object identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when lookup fails.
    fn get_file(&self, object_id: &ObjectId) -> Result<Option<FileEntity>, StoreError>;

    /// Applies the present fields of a file update request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_file(
        &self,
        object_id: &ObjectId,
        request: &FileUpdateRequest,
    ) -> Result<(), StoreError>;

    /// Returns every analysis identifier with its dynamic data, for the
    /// search engine.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_analysis_data(&self) -> Result<Vec<(AnalysisId, Value)>, StoreError>;
}

// ============================================================================
// SECTION: Existence Check
// ============================================================================

/// Existence verification errors.
///
/// # Invariants
/// - Variants are stable for retry classification: `Client` is never
///   retried, `Unavailable` and `Timeout` are retried, anything else fails
///   fast.
#[derive(Debug, Error, Clone)]
pub enum ExistenceError {
    /// The endpoint rejected the request (4xx).
    #[error("existence check rejected: status {status}")]
    Client {
        /// HTTP status code.
        status: u16,
    },
    /// The endpoint is temporarily unavailable (503).
    #[error("existence service unavailable: status {status}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
    },
    /// The request timed out before a response arrived.
    #[error("existence check timed out: {0}")]
    Timeout(String),
    /// Transport-level failure (connection refused, TLS, malformed body).
    #[error("existence check transport failure: {0}")]
    Transport(String),
    /// Retries were exhausted; carries the last error observed.
    #[error("existence check against {service} exhausted {attempts} attempt(s): {message}")]
    Exhausted {
        /// Target service name.
        service: String,
        /// Total attempts performed.
        attempts: u32,
        /// Message of the last error observed.
        message: String,
    },
}

/// Confirms that referenced files exist in external storage.
pub trait ExistenceCheck {
    /// Returns true when the object exists in external storage.
    ///
    /// # Errors
    ///
    /// Returns [`ExistenceError`] when the check cannot be completed.
    fn exists(&self, token: &str, object_id: &ObjectId) -> Result<bool, ExistenceError>;
}
