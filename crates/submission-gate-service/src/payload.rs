// crates/submission-gate-service/src/payload.rs
// ============================================================================
// Module: Payload Extraction
// Description: Structured views over raw submission payloads.
// Purpose: Extract the analysis type reference, files, and samples from a
//          validated payload when converting it into an analysis.
// Dependencies: submission-gate-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Payloads stay opaque JSON through validation; only three locations have
//! pipeline meaning: `analysisType {name, version?}` selects the schema,
//! `files[]` carries the referenced file entities, and `samples[]` carries
//! sample links. Everything else rides along as `Analysis.data` untouched.
//! Wire keys are camelCase.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;
use submission_gate_core::Analysis;
use submission_gate_core::AnalysisId;
use submission_gate_core::AnalysisState;
use submission_gate_core::AnalysisTypeRef;
use submission_gate_core::FileAccess;
use submission_gate_core::FileEntity;
use submission_gate_core::ObjectId;
use submission_gate_core::SampleRef;
use submission_gate_core::SchemaName;
use submission_gate_core::SchemaVersion;
use submission_gate_core::StudyId;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Payload shape errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload has no usable `analysisType` object.
    #[error("payload requires an analysisType object with a name")]
    MissingAnalysisType,
    /// A pipeline-meaningful section failed to parse.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Wire shape of a file entry inside a payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePayload {
    /// Object identifier in external storage.
    object_id: String,
    /// File name.
    file_name: String,
    /// File type label.
    file_type: String,
    /// File size in bytes.
    file_size: i64,
    /// MD5 checksum, when known.
    #[serde(default)]
    file_md5sum: Option<String>,
    /// Access classification.
    file_access: FileAccess,
    /// Dynamic file metadata.
    #[serde(default)]
    info: Value,
}

impl From<FilePayload> for FileEntity {
    fn from(file: FilePayload) -> Self {
        Self {
            object_id: ObjectId::new(file.object_id),
            file_name: file.file_name,
            file_type: file.file_type,
            file_size: file.file_size,
            file_md5sum: file.file_md5sum,
            file_access: file.file_access,
            info: file.info,
        }
    }
}

/// Wire shape of a sample entry inside a payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SamplePayload {
    /// Referenced sample identifier.
    sample_id: String,
}

impl From<SamplePayload> for SampleRef {
    fn from(sample: SamplePayload) -> Self {
        Self {
            sample_id: sample.sample_id.into(),
        }
    }
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts the schema name and optional version selected by the payload.
///
/// # Errors
///
/// Returns [`PayloadError`] when `analysisType` is missing, its name is not
/// a non-empty string, or its version is not a positive integer.
pub fn analysis_type_of(
    payload: &Value,
) -> Result<(SchemaName, Option<SchemaVersion>), PayloadError> {
    let Some(Value::Object(analysis_type)) = payload.get("analysisType") else {
        return Err(PayloadError::MissingAnalysisType);
    };
    let Some(Value::String(name)) = analysis_type.get("name") else {
        return Err(PayloadError::MissingAnalysisType);
    };
    if name.trim().is_empty() {
        return Err(PayloadError::MissingAnalysisType);
    }
    let version = match analysis_type.get("version") {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => {
            let raw = number
                .as_u64()
                .and_then(|value| u32::try_from(value).ok())
                .and_then(SchemaVersion::from_raw)
                .ok_or_else(|| {
                    PayloadError::Malformed(format!("analysisType.version invalid: {number}"))
                })?;
            Some(raw)
        }
        Some(other) => {
            return Err(PayloadError::Malformed(format!(
                "analysisType.version must be a positive integer, got {other}"
            )));
        }
    };
    Ok((SchemaName::new(name.clone()), version))
}

/// Extracts the file entities referenced by the payload.
///
/// # Errors
///
/// Returns [`PayloadError::Malformed`] when `files` is present but does not
/// parse as a file list.
pub fn extract_files(payload: &Value) -> Result<Vec<FileEntity>, PayloadError> {
    let Some(files) = payload.get("files") else {
        return Ok(Vec::new());
    };
    let files: Vec<FilePayload> = serde_json::from_value(files.clone())
        .map_err(|err| PayloadError::Malformed(format!("files: {err}")))?;
    Ok(files.into_iter().map(FileEntity::from).collect())
}

/// Extracts the sample links referenced by the payload.
///
/// # Errors
///
/// Returns [`PayloadError::Malformed`] when `samples` is present but does
/// not parse as a sample list.
pub fn extract_samples(payload: &Value) -> Result<Vec<SampleRef>, PayloadError> {
    let Some(samples) = payload.get("samples") else {
        return Ok(Vec::new());
    };
    let samples: Vec<SamplePayload> = serde_json::from_value(samples.clone())
        .map_err(|err| PayloadError::Malformed(format!("samples: {err}")))?;
    Ok(samples.into_iter().map(SampleRef::from).collect())
}

/// Builds the analysis aggregate for a validated payload.
///
/// The full payload is retained as `Analysis.data`; files and samples are
/// additionally lifted into their own entities.
///
/// # Errors
///
/// Returns [`PayloadError`] when the file or sample sections are malformed.
pub fn build_analysis(
    analysis_id: AnalysisId,
    study_id: StudyId,
    analysis_type: AnalysisTypeRef,
    payload: &Value,
) -> Result<Analysis, PayloadError> {
    let files = extract_files(payload)?;
    let samples = extract_samples(payload)?;
    Ok(Analysis {
        analysis_id,
        study_id,
        analysis_type,
        state: AnalysisState::Unpublished,
        data: payload.clone(),
        samples,
        files,
    })
}
