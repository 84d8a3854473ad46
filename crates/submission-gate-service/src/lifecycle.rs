// crates/submission-gate-service/src/lifecycle.rs
// ============================================================================
// Module: Analysis Lifecycle
// Description: Publication state machine over persisted analyses.
// Purpose: Govern publish, unpublish, suppress, and file updates with
//          existence verification at the publish gate.
// Dependencies: submission-gate-core, tracing
// ============================================================================

//! ## Overview
//! Publication is the only gate with external effects: every referenced
//! file must carry an MD5 checksum (unless explicitly bypassed) and must be
//! confirmed to exist in external storage before the analysis flips to
//! `Published`. Transitions use guarded compare-and-set updates; a lost
//! race that left the analysis in the requested state counts as success.
//! `Suppressed` is terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use submission_gate_core::Analysis;
use submission_gate_core::AnalysisId;
use submission_gate_core::AnalysisState;
use submission_gate_core::AnalysisStore;
use submission_gate_core::ExistenceCheck;
use submission_gate_core::ExistenceError;
use submission_gate_core::FileUpdateKind;
use submission_gate_core::FileUpdateRequest;
use submission_gate_core::ObjectId;
use submission_gate_core::ServiceError;
use submission_gate_core::StoreError;
use tracing::info;

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

/// Publication lifecycle service over an analysis store and an existence
/// verifier.
///
/// # Invariants
/// - An analysis is never `Published` without every referenced file having
///   been confirmed to exist during that publish call.
/// - `suppress` is permanent; suppressed analyses reject publish and
///   unpublish.
pub struct AnalysisLifecycle<A, E> {
    /// Analysis persistence.
    store: Arc<A>,
    /// External storage existence verifier.
    verifier: Arc<E>,
}

impl<A, E> AnalysisLifecycle<A, E>
where
    A: AnalysisStore,
    E: ExistenceCheck,
{
    /// Creates a lifecycle service over the given store and verifier.
    pub const fn new(store: Arc<A>, verifier: Arc<E>) -> Self {
        Self {
            store,
            verifier,
        }
    }

    /// Loads an analysis aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown identifier.
    pub fn get(&self, analysis_id: &AnalysisId) -> Result<Analysis, ServiceError> {
        self.store
            .get_analysis(analysis_id)
            .map_err(store_error)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "analysis",
                id: analysis_id.to_string(),
            })
    }

    /// Publishes an analysis after verifying its files.
    ///
    /// Idempotent: publishing an already-published analysis succeeds
    /// without re-verification. When `ignore_undefined_md5` is set, files
    /// without a checksum skip the checksum precondition but are still
    /// verified to exist.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Precondition`] when checksums are missing or
    /// files are absent from storage, [`ServiceError::TransientNetwork`]
    /// when verification exhausts its retries, and
    /// [`ServiceError::StateConflict`] for suppressed analyses.
    pub fn publish(
        &self,
        token: &str,
        analysis_id: &AnalysisId,
        ignore_undefined_md5: bool,
    ) -> Result<(), ServiceError> {
        let analysis = self.get(analysis_id)?;
        match analysis.state {
            AnalysisState::Published => return Ok(()),
            AnalysisState::Suppressed => {
                return Err(ServiceError::StateConflict {
                    message: format!("analysis {analysis_id} is suppressed"),
                });
            }
            AnalysisState::Unpublished => {}
        }
        if !ignore_undefined_md5 {
            let missing: Vec<ObjectId> = analysis
                .files
                .iter()
                .filter(|file| file.file_md5sum.is_none())
                .map(|file| file.object_id.clone())
                .collect();
            if !missing.is_empty() {
                return Err(ServiceError::Precondition {
                    message: format!("{} file(s) have no md5 checksum", missing.len()),
                    object_ids: missing,
                });
            }
        }
        let mut absent = Vec::new();
        for file in &analysis.files {
            let exists =
                self.verifier.exists(token, &file.object_id).map_err(verification_error)?;
            if !exists {
                absent.push(file.object_id.clone());
            }
        }
        if !absent.is_empty() {
            return Err(ServiceError::Precondition {
                message: format!("{} file(s) are absent from storage", absent.len()),
                object_ids: absent,
            });
        }
        self.transition(analysis_id, AnalysisState::Unpublished, AnalysisState::Published)?;
        info!(analysis_id = analysis_id.as_str(), "analysis published");
        Ok(())
    }

    /// Withdraws a published analysis back to `Unpublished`.
    ///
    /// Idempotent: unpublishing an unpublished analysis succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::StateConflict`] for suppressed analyses.
    pub fn unpublish(&self, analysis_id: &AnalysisId) -> Result<(), ServiceError> {
        let analysis = self.get(analysis_id)?;
        match analysis.state {
            AnalysisState::Unpublished => return Ok(()),
            AnalysisState::Suppressed => {
                return Err(ServiceError::StateConflict {
                    message: format!("analysis {analysis_id} is suppressed"),
                });
            }
            AnalysisState::Published => {}
        }
        self.transition(analysis_id, AnalysisState::Published, AnalysisState::Unpublished)?;
        info!(analysis_id = analysis_id.as_str(), "analysis unpublished");
        Ok(())
    }

    /// Permanently withdraws an analysis.
    ///
    /// Idempotent: suppressing a suppressed analysis succeeds. The data is
    /// retained; only the state becomes terminal.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown identifier.
    pub fn suppress(&self, analysis_id: &AnalysisId) -> Result<(), ServiceError> {
        let analysis = self.get(analysis_id)?;
        if analysis.state == AnalysisState::Suppressed {
            return Ok(());
        }
        self.store.mark_suppressed(analysis_id).map_err(store_error)?;
        info!(analysis_id = analysis_id.as_str(), "analysis suppressed");
        Ok(())
    }

    /// Applies a partial file update and reports its classification.
    ///
    /// A request whose present fields all match the stored values is
    /// classified [`FileUpdateKind::NoUpdate`] and persists nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown object identifier.
    pub fn update_file(
        &self,
        object_id: &ObjectId,
        request: &FileUpdateRequest,
    ) -> Result<FileUpdateKind, ServiceError> {
        let stored = self
            .store
            .get_file(object_id)
            .map_err(store_error)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "file",
                id: object_id.to_string(),
            })?;
        let kind = request.classify(&stored);
        if kind == FileUpdateKind::NoUpdate {
            return Ok(kind);
        }
        self.store.update_file(object_id, request).map_err(store_error)?;
        info!(object_id = object_id.as_str(), kind = kind.as_str(), "file updated");
        Ok(kind)
    }

    /// Performs a guarded state transition, treating a lost race that
    /// reached `to` anyway as success.
    fn transition(
        &self,
        analysis_id: &AnalysisId,
        from: AnalysisState,
        to: AnalysisState,
    ) -> Result<(), ServiceError> {
        let changed = self.store.transition_analysis(analysis_id, from, to).map_err(store_error)?;
        if changed {
            return Ok(());
        }
        let current = self.get(analysis_id)?;
        if current.state == to {
            return Ok(());
        }
        Err(ServiceError::StateConflict {
            message: format!(
                "analysis {analysis_id} is {}, expected {}",
                current.state.as_str(),
                from.as_str()
            ),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps store failures into the internal error class.
fn store_error(error: StoreError) -> ServiceError {
    ServiceError::internal(error.to_string())
}

/// Maps existence verification failures into the publish error class.
fn verification_error(error: ExistenceError) -> ServiceError {
    ServiceError::TransientNetwork {
        service: "storage".to_owned(),
        message: error.to_string(),
    }
}
