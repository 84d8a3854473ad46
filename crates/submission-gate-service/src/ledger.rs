// crates/submission-gate-service/src/ledger.rs
// ============================================================================
// Module: Submission Ledger
// Description: Upload lifecycle from receipt through validation to save.
// Purpose: Accept payloads, enqueue validation, and convert validated
//          uploads into persisted analyses.
// Dependencies: submission-gate-core, tracing
// ============================================================================

//! ## Overview
//! The ledger owns the write path for uploads. `create` persists a
//! `Created` record and enqueues validation; `resubmit` resets a failed
//! upload for another pass; `save` converts a validated payload into the
//! analysis aggregate inside one store transaction, labeled with the schema
//! version recorded at validation time. Saving is idempotent: an
//! already-saved upload returns its existing analysis identifier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use submission_gate_core::AnalysisId;
use submission_gate_core::AnalysisStore;
use submission_gate_core::IdentifierGenerator;
use submission_gate_core::ServiceError;
use submission_gate_core::StoreError;
use submission_gate_core::StudyId;
use submission_gate_core::Upload;
use submission_gate_core::UploadId;
use submission_gate_core::UploadState;
use submission_gate_core::UploadStore;
use tracing::info;

use crate::payload;
use crate::workers::ValidationJob;
use crate::workers::ValidationWorkerPool;

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Submission ledger over an upload store and an analysis store.
///
/// # Invariants
/// - Uploads are never deleted; every submission leaves an audit record.
/// - `save` persists the upload flip and the analysis aggregate atomically.
/// - Saved analyses carry the schema version recorded at validation time,
///   never a version resolved later.
pub struct SubmissionLedger<U, A, G> {
    /// Upload persistence.
    uploads: Arc<U>,
    /// Analysis persistence used by `save`.
    analyses: Arc<A>,
    /// Identifier generator for uploads and analyses.
    ids: Arc<G>,
    /// Bounded validation pool fed by `create` and `resubmit`.
    pool: Arc<ValidationWorkerPool>,
}

impl<U, A, G> SubmissionLedger<U, A, G>
where
    U: UploadStore,
    A: AnalysisStore,
    G: IdentifierGenerator,
{
    /// Creates a ledger over the given stores and pool.
    pub const fn new(
        uploads: Arc<U>,
        analyses: Arc<A>,
        ids: Arc<G>,
        pool: Arc<ValidationWorkerPool>,
    ) -> Self {
        Self {
            uploads,
            analyses,
            ids,
            pool,
        }
    }

    /// Accepts a submission: persists a `Created` upload and enqueues
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Overloaded`] when the validation queue is
    /// saturated; the upload record remains in `Created` and can be
    /// re-enqueued with [`Self::resubmit`].
    pub fn create(&self, study_id: &StudyId, payload: Value) -> Result<UploadId, ServiceError> {
        let upload_id = UploadId::new(
            self.ids.new_id().map_err(|err| ServiceError::internal(err.to_string()))?,
        );
        let now = unix_millis();
        let upload = Upload {
            upload_id: upload_id.clone(),
            study_id: study_id.clone(),
            analysis_id: None,
            state: UploadState::Created,
            validated_type: None,
            payload: payload.clone(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.uploads.insert_upload(&upload).map_err(store_error)?;
        self.pool.submit(ValidationJob {
            upload_id: upload_id.clone(),
            payload,
        })?;
        info!(upload_id = upload_id.as_str(), study_id = study_id.as_str(), "upload created");
        Ok(upload_id)
    }

    /// Returns the current upload record.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown identifier.
    pub fn get_status(&self, upload_id: &UploadId) -> Result<Upload, ServiceError> {
        self.uploads
            .get_upload(upload_id)
            .map_err(store_error)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "upload",
                id: upload_id.to_string(),
            })
    }

    /// Replaces an upload's payload and re-enqueues validation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::StateConflict`] unless the upload is in
    /// `ValidationError` state or still `Created` (its earlier enqueue was
    /// rejected by a saturated queue).
    pub fn resubmit(&self, upload_id: &UploadId, payload: Value) -> Result<(), ServiceError> {
        let upload = self.get_status(upload_id)?;
        if !upload.state.can_resubmit() {
            return Err(ServiceError::StateConflict {
                message: format!(
                    "upload {upload_id} cannot be resubmitted from state {}",
                    upload.state.as_str()
                ),
            });
        }
        self.uploads.reset_for_resubmission(upload_id, &payload).map_err(store_error)?;
        self.pool.submit(ValidationJob {
            upload_id: upload_id.clone(),
            payload,
        })?;
        info!(upload_id = upload_id.as_str(), "upload resubmitted");
        Ok(())
    }

    /// Converts a validated upload into a persisted analysis, labeled with
    /// the schema version its payload was validated against.
    ///
    /// Idempotent once saved: repeated calls return the existing analysis
    /// identifier without creating a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::StateConflict`] unless the upload is
    /// `Validated` or already `Saved`.
    pub fn save(&self, upload_id: &UploadId) -> Result<AnalysisId, ServiceError> {
        let upload = self.get_status(upload_id)?;
        if upload.state == UploadState::Saved {
            return upload
                .analysis_id
                .ok_or_else(|| ServiceError::internal("saved upload has no analysis id"));
        }
        if !upload.state.can_save() {
            return Err(ServiceError::StateConflict {
                message: format!(
                    "upload {upload_id} cannot be saved from state {}",
                    upload.state.as_str()
                ),
            });
        }
        let analysis_type = upload.validated_type.clone().ok_or_else(|| {
            ServiceError::internal(format!("validated upload {upload_id} has no recorded schema"))
        })?;
        let analysis_id = AnalysisId::new(
            self.ids.new_id().map_err(|err| ServiceError::internal(err.to_string()))?,
        );
        let analysis = payload::build_analysis(
            analysis_id.clone(),
            upload.study_id.clone(),
            analysis_type,
            &upload.payload,
        )
        .map_err(|err| ServiceError::internal(err.to_string()))?;
        match self.analyses.persist_analysis(upload_id, &analysis) {
            Ok(()) => {
                info!(
                    upload_id = upload_id.as_str(),
                    analysis_id = analysis_id.as_str(),
                    "upload saved"
                );
                Ok(analysis_id)
            }
            // A concurrent save won the transaction; surface its result.
            Err(StoreError::Conflict(_)) => {
                let current = self.get_status(upload_id)?;
                if current.state == UploadState::Saved
                    && let Some(existing) = current.analysis_id
                {
                    return Ok(existing);
                }
                Err(ServiceError::StateConflict {
                    message: format!("upload {upload_id} changed state during save"),
                })
            }
            Err(error) => Err(store_error(error)),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps store failures into the internal error class.
fn store_error(error: StoreError) -> ServiceError {
    ServiceError::internal(error.to_string())
}

/// Returns the current unix timestamp in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
