// crates/submission-gate-core/src/core/mod.rs
// ============================================================================
// Module: Submission Gate Core Types
// Description: Canonical submission, analysis, and lifecycle structures.
// Purpose: Provide stable, serializable types for the registration pipeline.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Core types define uploads, analyses, files, schema records, and search
//! terms. These types are the canonical source of truth for any derived API
//! surfaces (HTTP or otherwise).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod errors;
pub mod identifiers;
pub mod model;
pub mod search;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use errors::ServiceError;
pub use identifiers::AnalysisId;
pub use identifiers::ObjectId;
pub use identifiers::SampleId;
pub use identifiers::SchemaName;
pub use identifiers::SchemaVersion;
pub use identifiers::StudyId;
pub use identifiers::UploadId;
pub use model::Analysis;
pub use model::AnalysisState;
pub use model::AnalysisTypeRef;
pub use model::AnalysisTypeSchema;
pub use model::FileAccess;
pub use model::FileEntity;
pub use model::FileUpdateKind;
pub use model::FileUpdateRequest;
pub use model::SampleRef;
pub use model::Upload;
pub use model::UploadState;
pub use model::Violation;
pub use search::SearchHit;
pub use search::SearchTerm;
pub use search::SearchTermError;
