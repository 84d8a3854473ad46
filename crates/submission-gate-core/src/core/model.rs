// crates/submission-gate-core/src/core/model.rs
// ============================================================================
// Module: Submission Gate Data Model
// Description: Uploads, analyses, files, and their lifecycle states.
// Purpose: Provide the canonical aggregates moved through the pipeline.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! Uploads track a submission from receipt through validation; analyses are
//! the persisted, schema-validated result with their own publication
//! lifecycle. Dynamic JSON (`payload`, `data`, `info`) stays opaque to core
//! logic; only the registered schema constrains its shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AnalysisId;
use crate::core::identifiers::ObjectId;
use crate::core::identifiers::SampleId;
use crate::core::identifiers::SchemaName;
use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::UploadId;

// ============================================================================
// SECTION: Schema Records
// ============================================================================

/// Registered analysis type schema record.
///
/// # Invariants
/// - `(name, version)` is unique; records are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTypeSchema {
    /// Schema name.
    pub name: SchemaName,
    /// Schema version (1-based, append-only per name).
    pub version: SchemaVersion,
    /// JSON Schema document.
    pub schema: Value,
    /// Creation timestamp in unix milliseconds.
    pub created_at: i64,
}

/// Reference to a registered analysis type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTypeRef {
    /// Schema name.
    pub name: SchemaName,
    /// Schema version.
    pub version: SchemaVersion,
}

// ============================================================================
// SECTION: Upload Lifecycle
// ============================================================================

/// Upload lifecycle states.
///
/// # Invariants
/// - States only move forward, except that a resubmission returns
///   `Created` and `ValidationError` uploads to `Created` for
///   re-validation.
/// - `Uploaded` and `Updated` are retained for storage and importer
///   compatibility; the core pipeline never transitions into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadState {
    /// Submission received; validation pending.
    Created,
    /// Payload satisfied its resolved schema.
    Validated,
    /// Payload violated its resolved schema (or validation itself failed).
    ValidationError,
    /// Reserved importer state: payload uploaded out of band.
    Uploaded,
    /// Reserved importer state: payload replaced out of band.
    Updated,
    /// Converted into a persisted analysis.
    Saved,
}

impl UploadState {
    /// Returns the stable storage label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Validated => "VALIDATED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Uploaded => "UPLOADED",
            Self::Updated => "UPDATED",
            Self::Saved => "SAVED",
        }
    }

    /// Parses a storage label back into a state.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "CREATED" => Some(Self::Created),
            "VALIDATED" => Some(Self::Validated),
            "VALIDATION_ERROR" => Some(Self::ValidationError),
            "UPLOADED" => Some(Self::Uploaded),
            "UPDATED" => Some(Self::Updated),
            "SAVED" => Some(Self::Saved),
            _ => None,
        }
    }

    /// Returns true when the upload may be converted into an analysis.
    #[must_use]
    pub const fn can_save(self) -> bool {
        matches!(self, Self::Validated)
    }

    /// Returns true when the upload may be resubmitted for re-validation.
    ///
    /// `Created` is resubmittable so an upload whose validation enqueue was
    /// rejected by a saturated queue can be re-enqueued.
    #[must_use]
    pub const fn can_resubmit(self) -> bool {
        matches!(self, Self::Created | Self::ValidationError)
    }
}

/// A single validation or processing error recorded on an upload.
///
/// # Invariants
/// - `path` is a JSON Pointer into the payload, or empty when the error is
///   not tied to a payload location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON Pointer to the offending payload location.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl Violation {
    /// Creates a violation tied to a payload location.
    #[must_use]
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a violation not tied to a payload location.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            message: message.into(),
        }
    }
}

/// An in-flight submission tracked from receipt through validation.
///
/// # Invariants
/// - Uploads are never deleted; they form an audit trail.
/// - `analysis_id` is set exactly once, when the upload is saved.
/// - `errors` is ordered; entries are appended, never reordered.
/// - `validated_type` is present iff the upload is `Validated` or `Saved`,
///   and names the exact schema version the payload satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Upload identifier.
    pub upload_id: UploadId,
    /// Owning study identifier.
    pub study_id: StudyId,
    /// Analysis created from this upload, once saved.
    pub analysis_id: Option<AnalysisId>,
    /// Current lifecycle state.
    pub state: UploadState,
    /// Schema version the payload was validated against, recorded when
    /// validation succeeds and cleared on resubmission.
    pub validated_type: Option<AnalysisTypeRef>,
    /// Raw submission payload.
    pub payload: Value,
    /// Ordered validation and processing errors.
    pub errors: Vec<Violation>,
    /// Creation timestamp in unix milliseconds.
    pub created_at: i64,
    /// Last mutation timestamp in unix milliseconds.
    pub updated_at: i64,
}

// ============================================================================
// SECTION: Analysis Lifecycle
// ============================================================================

/// Analysis publication lifecycle states.
///
/// # Invariants
/// - `Suppressed` is terminal; no further transitions are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    /// Persisted but not yet visible for consumption.
    Unpublished,
    /// Published after successful existence verification.
    Published,
    /// Withdrawn permanently.
    Suppressed,
}

impl AnalysisState {
    /// Returns the stable storage label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpublished => "UNPUBLISHED",
            Self::Published => "PUBLISHED",
            Self::Suppressed => "SUPPRESSED",
        }
    }

    /// Parses a storage label back into a state.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "UNPUBLISHED" => Some(Self::Unpublished),
            "PUBLISHED" => Some(Self::Published),
            "SUPPRESSED" => Some(Self::Suppressed),
            _ => None,
        }
    }

    /// Returns true when no further transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Suppressed)
    }
}

/// Sample reference linked to an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRef {
    /// Referenced sample identifier.
    pub sample_id: SampleId,
}

/// A persisted, schema-validated submission.
///
/// # Invariants
/// - Mutated only through publish/unpublish/suppress; never hard-deleted.
/// - `data` conforms to the schema named by `analysis_type` at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Analysis identifier.
    pub analysis_id: AnalysisId,
    /// Owning study identifier.
    pub study_id: StudyId,
    /// Analysis type this submission was validated against.
    pub analysis_type: AnalysisTypeRef,
    /// Current publication state.
    pub state: AnalysisState,
    /// Dynamic submission data.
    pub data: Value,
    /// Referenced samples.
    pub samples: Vec<SampleRef>,
    /// Referenced files.
    pub files: Vec<FileEntity>,
}

// ============================================================================
// SECTION: Files
// ============================================================================

/// File access classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAccess {
    /// Openly accessible.
    Open,
    /// Access requires authorization.
    Controlled,
}

impl FileAccess {
    /// Returns the stable storage label for the access class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Controlled => "controlled",
        }
    }

    /// Parses a storage label back into an access class.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "open" => Some(Self::Open),
            "controlled" => Some(Self::Controlled),
            _ => None,
        }
    }
}

/// A file referenced by an analysis.
///
/// # Invariants
/// - `file_md5sum` may be absent until the checksum is known; publication
///   requires it unless explicitly bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntity {
    /// Object identifier in external storage.
    pub object_id: ObjectId,
    /// File name.
    pub file_name: String,
    /// File type label (e.g. BAM, VCF).
    pub file_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MD5 checksum, when known.
    pub file_md5sum: Option<String>,
    /// Access classification.
    pub file_access: FileAccess,
    /// Dynamic file metadata.
    pub info: Value,
}

/// Classification of a file update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileUpdateKind {
    /// Every present field matches the stored value.
    NoUpdate,
    /// Checksum or size changed.
    ContentUpdate,
    /// Access or dynamic metadata changed.
    MetadataUpdate,
}

impl FileUpdateKind {
    /// Returns the stable storage label for the classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoUpdate => "NO_UPDATE",
            Self::ContentUpdate => "CONTENT_UPDATE",
            Self::MetadataUpdate => "METADATA_UPDATE",
        }
    }
}

/// Partial file update request.
///
/// # Invariants
/// - Absent fields mean "unchanged"; classification compares only the
///   fields present in the request against stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdateRequest {
    /// New file size, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    /// New MD5 checksum, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_md5sum: Option<String>,
    /// New access classification, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_access: Option<FileAccess>,
    /// New dynamic metadata, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

impl FileUpdateRequest {
    /// Classifies this request against a stored file.
    ///
    /// A content change (checksum or size) dominates a metadata change when
    /// a request touches both.
    #[must_use]
    pub fn classify(&self, stored: &FileEntity) -> FileUpdateKind {
        let content_changed = self
            .file_md5sum
            .as_ref()
            .is_some_and(|md5| stored.file_md5sum.as_ref() != Some(md5))
            || self.file_size.is_some_and(|size| size != stored.file_size);
        if content_changed {
            return FileUpdateKind::ContentUpdate;
        }
        let metadata_changed = self.file_access.is_some_and(|access| access != stored.file_access)
            || self.info.as_ref().is_some_and(|info| *info != stored.info);
        if metadata_changed {
            return FileUpdateKind::MetadataUpdate;
        }
        FileUpdateKind::NoUpdate
    }
}
