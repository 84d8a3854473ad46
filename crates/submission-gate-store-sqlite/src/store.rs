// crates/submission-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Submission Store
// Description: Durable SchemaStore, UploadStore, and AnalysisStore on SQLite.
// Purpose: Persist schemas, uploads, and analysis aggregates with WAL and
//          guarded state transitions.
// Dependencies: submission-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One store owns all durable state. A single writer connection guarded by a
//! mutex serializes mutations; a round-robin pool of read connections keeps
//! reads off the writer under WAL. Schema version assignment, analysis
//! persistence, and publication transitions each run inside one transaction
//! so concurrent callers observe consistent state. Loads fail closed on
//! unparseable rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde_json::Value;
use submission_gate_core::Analysis;
use submission_gate_core::AnalysisId;
use submission_gate_core::AnalysisState;
use submission_gate_core::AnalysisStore;
use submission_gate_core::AnalysisTypeRef;
use submission_gate_core::AnalysisTypeSchema;
use submission_gate_core::FileAccess;
use submission_gate_core::FileEntity;
use submission_gate_core::FileUpdateRequest;
use submission_gate_core::ObjectId;
use submission_gate_core::SampleRef;
use submission_gate_core::SchemaName;
use submission_gate_core::SchemaStore;
use submission_gate_core::SchemaVersion;
use submission_gate_core::StoreError;
use submission_gate_core::StudyId;
use submission_gate_core::Upload;
use submission_gate_core::UploadId;
use submission_gate_core::UploadState;
use submission_gate_core::UploadStore;
use submission_gate_core::Violation;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` submission store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    4
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw submission payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Uniqueness or integrity constraint violated.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Store(message)
            }
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a `rusqlite` error, classifying constraint violations as conflicts.
fn map_db_error(error: &rusqlite::Error) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error
        && failure.code == ErrorCode::ConstraintViolation
    {
        return SqliteStoreError::Conflict(error.to_string());
    }
    SqliteStoreError::Db(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed submission store with WAL support.
///
/// # Invariants
/// - Mutations are serialized through the writer connection mutex.
/// - Reads round-robin over the read pool and never touch the writer.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteStore {
    /// Opens an `SQLite`-backed submission store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_connection(config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(config)?));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Verifies the store can execute a simple SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if a mutex is poisoned or the query
    /// fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        let guard = self
            .read_connection()
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
        guard.execute("SELECT 1", []).map_err(|err| map_db_error(&err))?;
        drop(guard);
        let guard = self
            .write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite write mutex poisoned".to_string()))?;
        guard.execute("SELECT 1", []).map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }

    /// Locks the read connection for the current operation.
    fn read_guard(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.read_connection()
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))
    }

    /// Locks the writer connection for the current operation.
    fn write_guard(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite write mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Schema Store
// ============================================================================

impl SchemaStore for SqliteStore {
    fn register_schema(
        &self,
        name: &SchemaName,
        schema: &Value,
    ) -> Result<SchemaVersion, StoreError> {
        let schema_json =
            serde_json::to_string(schema).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let mut guard = self.write_guard()?;
        let tx = guard.transaction().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        // Version assignment and insertion share the transaction, so two
        // concurrent registrations cannot claim the same version.
        let current: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM analysis_type_schema WHERE name = ?1",
                params![name.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let next = current.saturating_add(1);
        let raw = u32::try_from(next)
            .map_err(|_| StoreError::Invalid(format!("schema version overflow for {name}")))?;
        let version = SchemaVersion::from_raw(raw)
            .ok_or_else(|| StoreError::Invalid(format!("schema version overflow for {name}")))?;
        tx.execute(
            "INSERT INTO analysis_type_schema (name, version, schema_json, created_at) VALUES \
             (?1, ?2, ?3, ?4)",
            params![name.as_str(), next, schema_json, unix_millis()],
        )
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
        tx.commit().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        Ok(version)
    }

    fn get_schema(
        &self,
        name: &SchemaName,
        version: SchemaVersion,
    ) -> Result<Option<AnalysisTypeSchema>, StoreError> {
        let guard = self.read_guard()?;
        let row = guard
            .query_row(
                "SELECT name, version, schema_json, created_at FROM analysis_type_schema WHERE \
                 name = ?1 AND version = ?2",
                params![name.as_str(), i64::from(version.get())],
                map_schema_row,
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        row.map(build_schema_record).transpose()
    }

    fn latest_schema(&self, name: &SchemaName) -> Result<Option<AnalysisTypeSchema>, StoreError> {
        let guard = self.read_guard()?;
        let row = guard
            .query_row(
                "SELECT name, version, schema_json, created_at FROM analysis_type_schema WHERE \
                 name = ?1 ORDER BY version DESC LIMIT 1",
                params![name.as_str()],
                map_schema_row,
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        row.map(build_schema_record).transpose()
    }

    fn load_all_schemas(&self) -> Result<Vec<AnalysisTypeSchema>, StoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT name, version, schema_json, created_at FROM analysis_type_schema ORDER \
                 BY name, version",
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], map_schema_row)
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
            records.push(build_schema_record(row)?);
        }
        Ok(records)
    }
}

/// Raw schema row as read from the database.
type SchemaRow = (String, i64, String, i64);

/// Maps a schema row into raw columns.
fn map_schema_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SchemaRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Builds a schema record from raw columns, failing closed on bad data.
fn build_schema_record(row: SchemaRow) -> Result<AnalysisTypeSchema, StoreError> {
    let (name, version, schema_json, created_at) = row;
    let raw = u32::try_from(version)
        .map_err(|_| StoreError::Invalid(format!("stored schema version out of range: {version}")))?;
    let version = SchemaVersion::from_raw(raw)
        .ok_or_else(|| StoreError::Invalid("stored schema version must be >= 1".to_string()))?;
    let schema: Value = serde_json::from_str(&schema_json)
        .map_err(|err| StoreError::Invalid(format!("stored schema unparseable: {err}")))?;
    Ok(AnalysisTypeSchema {
        name: SchemaName::new(name),
        version,
        schema,
        created_at,
    })
}

// ============================================================================
// SECTION: Upload Store
// ============================================================================

impl UploadStore for SqliteStore {
    fn insert_upload(&self, upload: &Upload) -> Result<(), StoreError> {
        let payload_json = serde_json::to_string(&upload.payload)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let errors_json = serde_json::to_string(&upload.errors)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let guard = self.write_guard()?;
        guard
            .execute(
                "INSERT INTO upload (upload_id, study_id, analysis_id, state, \
                 validated_type_name, validated_type_version, payload_json, errors_json, \
                 created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    upload.upload_id.as_str(),
                    upload.study_id.as_str(),
                    upload.analysis_id.as_ref().map(AnalysisId::as_str),
                    upload.state.as_str(),
                    upload.validated_type.as_ref().map(|pinned| pinned.name.as_str()),
                    upload.validated_type.as_ref().map(|pinned| i64::from(pinned.version.get())),
                    payload_json,
                    errors_json,
                    upload.created_at,
                    upload.updated_at,
                ],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn get_upload(&self, upload_id: &UploadId) -> Result<Option<Upload>, StoreError> {
        let guard = self.read_guard()?;
        let row = guard
            .query_row(
                "SELECT upload_id, study_id, analysis_id, state, validated_type_name, \
                 validated_type_version, payload_json, errors_json, created_at, updated_at FROM \
                 upload WHERE upload_id = ?1",
                params![upload_id.as_str()],
                map_upload_row,
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        row.map(build_upload_record).transpose()
    }

    fn record_validation(
        &self,
        upload_id: &UploadId,
        state: UploadState,
        errors: &[Violation],
        validated_type: Option<&AnalysisTypeRef>,
    ) -> Result<(), StoreError> {
        let mut guard = self.write_guard()?;
        let tx = guard.transaction().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT errors_json FROM upload WHERE upload_id = ?1",
                params![upload_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let Some(existing) = existing else {
            return Err(StoreError::Invalid(format!("upload not found: {upload_id}")));
        };
        let mut all: Vec<Violation> = serde_json::from_str(&existing)
            .map_err(|err| StoreError::Invalid(format!("stored errors unparseable: {err}")))?;
        all.extend_from_slice(errors);
        let errors_json =
            serde_json::to_string(&all).map_err(|err| StoreError::Invalid(err.to_string()))?;
        tx.execute(
            "UPDATE upload SET state = ?1, errors_json = ?2, validated_type_name = ?3, \
             validated_type_version = ?4, updated_at = ?5 WHERE upload_id = ?6",
            params![
                state.as_str(),
                errors_json,
                validated_type.map(|pinned| pinned.name.as_str()),
                validated_type.map(|pinned| i64::from(pinned.version.get())),
                unix_millis(),
                upload_id.as_str(),
            ],
        )
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
        tx.commit().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        Ok(())
    }

    fn reset_for_resubmission(
        &self,
        upload_id: &UploadId,
        payload: &Value,
    ) -> Result<(), StoreError> {
        let payload_json =
            serde_json::to_string(payload).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let guard = self.write_guard()?;
        let changed = guard
            .execute(
                "UPDATE upload SET payload_json = ?1, errors_json = '[]', state = ?2, \
                 validated_type_name = NULL, validated_type_version = NULL, updated_at = ?3 \
                 WHERE upload_id = ?4",
                params![
                    payload_json,
                    UploadState::Created.as_str(),
                    unix_millis(),
                    upload_id.as_str(),
                ],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        if changed == 0 {
            return Err(StoreError::Invalid(format!("upload not found: {upload_id}")));
        }
        Ok(())
    }
}

/// Raw upload row as read from the database.
type UploadRow =
    (String, String, Option<String>, String, Option<String>, Option<i64>, String, String, i64, i64);

/// Maps an upload row into raw columns.
fn map_upload_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

/// Builds an upload record from raw columns, failing closed on bad data.
fn build_upload_record(row: UploadRow) -> Result<Upload, StoreError> {
    let (
        upload_id,
        study_id,
        analysis_id,
        state,
        validated_type_name,
        validated_type_version,
        payload_json,
        errors_json,
        created_at,
        updated_at,
    ) = row;
    let state = UploadState::from_label(&state)
        .ok_or_else(|| StoreError::Invalid(format!("unknown upload state: {state}")))?;
    let validated_type = build_validated_type(validated_type_name, validated_type_version)?;
    let payload: Value = serde_json::from_str(&payload_json)
        .map_err(|err| StoreError::Invalid(format!("stored payload unparseable: {err}")))?;
    let errors: Vec<Violation> = serde_json::from_str(&errors_json)
        .map_err(|err| StoreError::Invalid(format!("stored errors unparseable: {err}")))?;
    Ok(Upload {
        upload_id: UploadId::new(upload_id),
        study_id: StudyId::new(study_id),
        analysis_id: analysis_id.map(AnalysisId::new),
        state,
        validated_type,
        payload,
        errors,
        created_at,
        updated_at,
    })
}

/// Builds the pinned analysis type from its columns; both must be present
/// or both absent.
fn build_validated_type(
    name: Option<String>,
    version: Option<i64>,
) -> Result<Option<AnalysisTypeRef>, StoreError> {
    match (name, version) {
        (None, None) => Ok(None),
        (Some(name), Some(version)) => {
            let raw = u32::try_from(version).map_err(|_| {
                StoreError::Invalid(format!("stored validated type version out of range: {version}"))
            })?;
            let version = SchemaVersion::from_raw(raw).ok_or_else(|| {
                StoreError::Invalid("stored validated type version must be >= 1".to_string())
            })?;
            Ok(Some(AnalysisTypeRef {
                name: SchemaName::new(name),
                version,
            }))
        }
        _ => Err(StoreError::Invalid(
            "stored validated type must carry both name and version".to_string(),
        )),
    }
}

// ============================================================================
// SECTION: Analysis Store
// ============================================================================

impl AnalysisStore for SqliteStore {
    fn persist_analysis(
        &self,
        upload_id: &UploadId,
        analysis: &Analysis,
    ) -> Result<(), StoreError> {
        let data_json = serde_json::to_string(&analysis.data)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let mut guard = self.write_guard()?;
        let tx = guard.transaction().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        tx.execute(
            "INSERT INTO analysis (analysis_id, study_id, type_name, type_version, state, \
             data_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                analysis.analysis_id.as_str(),
                analysis.study_id.as_str(),
                analysis.analysis_type.name.as_str(),
                i64::from(analysis.analysis_type.version.get()),
                analysis.state.as_str(),
                data_json,
            ],
        )
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
        for sample in &analysis.samples {
            tx.execute(
                "INSERT INTO analysis_sample (analysis_id, sample_id) VALUES (?1, ?2)",
                params![analysis.analysis_id.as_str(), sample.sample_id.as_str()],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        }
        for file in &analysis.files {
            let info_json = serde_json::to_string(&file.info)
                .map_err(|err| StoreError::Invalid(err.to_string()))?;
            tx.execute(
                "INSERT INTO analysis_file (object_id, analysis_id, file_name, file_type, \
                 file_size, file_md5sum, file_access, info_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, \
                 ?7, ?8)",
                params![
                    file.object_id.as_str(),
                    analysis.analysis_id.as_str(),
                    file.file_name,
                    file.file_type,
                    file.file_size,
                    file.file_md5sum,
                    file.file_access.as_str(),
                    info_json,
                ],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        }
        // The originating upload flips to SAVED in the same transaction; a
        // missing or already-saved upload rolls the whole aggregate back.
        let changed = tx
            .execute(
                "UPDATE upload SET state = ?1, analysis_id = ?2, updated_at = ?3 WHERE upload_id \
                 = ?4 AND state = ?5",
                params![
                    UploadState::Saved.as_str(),
                    analysis.analysis_id.as_str(),
                    unix_millis(),
                    upload_id.as_str(),
                    UploadState::Validated.as_str(),
                ],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        if changed == 0 {
            return Err(StoreError::Conflict(format!(
                "upload {upload_id} is not in a saveable state"
            )));
        }
        tx.commit().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        Ok(())
    }

    fn get_analysis(&self, analysis_id: &AnalysisId) -> Result<Option<Analysis>, StoreError> {
        let guard = self.read_guard()?;
        let header = guard
            .query_row(
                "SELECT analysis_id, study_id, type_name, type_version, state, data_json FROM \
                 analysis WHERE analysis_id = ?1",
                params![analysis_id.as_str()],
                map_analysis_row,
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let Some(header) = header else {
            return Ok(None);
        };
        let samples = load_samples(&guard, analysis_id)?;
        let files = load_files(&guard, analysis_id)?;
        drop(guard);
        let mut analysis = build_analysis_record(header)?;
        analysis.samples = samples;
        analysis.files = files;
        Ok(Some(analysis))
    }

    fn transition_analysis(
        &self,
        analysis_id: &AnalysisId,
        from: AnalysisState,
        to: AnalysisState,
    ) -> Result<bool, StoreError> {
        let guard = self.write_guard()?;
        // The state guard in the WHERE clause serializes racing transitions:
        // only one caller observes an affected row.
        let changed = guard
            .execute(
                "UPDATE analysis SET state = ?1 WHERE analysis_id = ?2 AND state = ?3",
                params![to.as_str(), analysis_id.as_str(), from.as_str()],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        Ok(changed > 0)
    }

    fn mark_suppressed(&self, analysis_id: &AnalysisId) -> Result<(), StoreError> {
        let guard = self.write_guard()?;
        let changed = guard
            .execute(
                "UPDATE analysis SET state = ?1 WHERE analysis_id = ?2",
                params![AnalysisState::Suppressed.as_str(), analysis_id.as_str()],
            )
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        if changed == 0 {
            return Err(StoreError::Invalid(format!("analysis not found: {analysis_id}")));
        }
        Ok(())
    }

    fn get_file(&self, object_id: &ObjectId) -> Result<Option<FileEntity>, StoreError> {
        let guard = self.read_guard()?;
        let row = guard
            .query_row(
                "SELECT object_id, file_name, file_type, file_size, file_md5sum, file_access, \
                 info_json FROM analysis_file WHERE object_id = ?1",
                params![object_id.as_str()],
                map_file_row,
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        row.map(build_file_record).transpose()
    }

    fn update_file(
        &self,
        object_id: &ObjectId,
        request: &FileUpdateRequest,
    ) -> Result<(), StoreError> {
        let mut guard = self.write_guard()?;
        let tx = guard.transaction().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        let row = tx
            .query_row(
                "SELECT object_id, file_name, file_type, file_size, file_md5sum, file_access, \
                 info_json FROM analysis_file WHERE object_id = ?1",
                params![object_id.as_str()],
                map_file_row,
            )
            .optional()
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let Some(row) = row else {
            return Err(StoreError::Invalid(format!("file not found: {object_id}")));
        };
        let stored = build_file_record(row)?;
        let file_size = request.file_size.unwrap_or(stored.file_size);
        let file_md5sum = request.file_md5sum.clone().or(stored.file_md5sum);
        let file_access = request.file_access.unwrap_or(stored.file_access);
        let info = request.info.clone().unwrap_or(stored.info);
        let info_json =
            serde_json::to_string(&info).map_err(|err| StoreError::Invalid(err.to_string()))?;
        tx.execute(
            "UPDATE analysis_file SET file_size = ?1, file_md5sum = ?2, file_access = ?3, \
             info_json = ?4 WHERE object_id = ?5",
            params![file_size, file_md5sum, file_access.as_str(), info_json, object_id.as_str()],
        )
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
        tx.commit().map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        Ok(())
    }

    fn list_analysis_data(&self) -> Result<Vec<(AnalysisId, Value)>, StoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare("SELECT analysis_id, data_json FROM analysis ORDER BY analysis_id")
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| {
                let analysis_id: String = row.get(0)?;
                let data_json: String = row.get(1)?;
                Ok((analysis_id, data_json))
            })
            .map_err(|err| map_db_error(&err))
            .map_err(StoreError::from)?;
        let mut results = Vec::new();
        for row in rows {
            let (analysis_id, data_json) =
                row.map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
            let data: Value = serde_json::from_str(&data_json)
                .map_err(|err| StoreError::Invalid(format!("stored data unparseable: {err}")))?;
            results.push((AnalysisId::new(analysis_id), data));
        }
        Ok(results)
    }
}

/// Raw analysis header row as read from the database.
type AnalysisRow = (String, String, String, i64, String, String);

/// Maps an analysis header row into raw columns.
fn map_analysis_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

/// Builds an analysis header (samples and files attached by the caller).
fn build_analysis_record(row: AnalysisRow) -> Result<Analysis, StoreError> {
    let (analysis_id, study_id, type_name, type_version, state, data_json) = row;
    let raw = u32::try_from(type_version).map_err(|_| {
        StoreError::Invalid(format!("stored analysis type version out of range: {type_version}"))
    })?;
    let version = SchemaVersion::from_raw(raw)
        .ok_or_else(|| StoreError::Invalid("stored analysis type version must be >= 1".to_string()))?;
    let state = AnalysisState::from_label(&state)
        .ok_or_else(|| StoreError::Invalid(format!("unknown analysis state: {state}")))?;
    let data: Value = serde_json::from_str(&data_json)
        .map_err(|err| StoreError::Invalid(format!("stored data unparseable: {err}")))?;
    Ok(Analysis {
        analysis_id: AnalysisId::new(analysis_id),
        study_id: StudyId::new(study_id),
        analysis_type: AnalysisTypeRef {
            name: SchemaName::new(type_name),
            version,
        },
        state,
        data,
        samples: Vec::new(),
        files: Vec::new(),
    })
}

/// Loads sample links for an analysis.
fn load_samples(
    connection: &Connection,
    analysis_id: &AnalysisId,
) -> Result<Vec<SampleRef>, StoreError> {
    let mut stmt = connection
        .prepare("SELECT sample_id FROM analysis_sample WHERE analysis_id = ?1 ORDER BY sample_id")
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map(params![analysis_id.as_str()], |row| row.get::<_, String>(0))
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
    let mut samples = Vec::new();
    for row in rows {
        let sample_id = row.map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        samples.push(SampleRef {
            sample_id: sample_id.into(),
        });
    }
    Ok(samples)
}

/// Loads file entities for an analysis.
fn load_files(
    connection: &Connection,
    analysis_id: &AnalysisId,
) -> Result<Vec<FileEntity>, StoreError> {
    let mut stmt = connection
        .prepare(
            "SELECT object_id, file_name, file_type, file_size, file_md5sum, file_access, \
             info_json FROM analysis_file WHERE analysis_id = ?1 ORDER BY object_id",
        )
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map(params![analysis_id.as_str()], map_file_row)
        .map_err(|err| map_db_error(&err))
        .map_err(StoreError::from)?;
    let mut files = Vec::new();
    for row in rows {
        let row = row.map_err(|err| map_db_error(&err)).map_err(StoreError::from)?;
        files.push(build_file_record(row)?);
    }
    Ok(files)
}

/// Raw file row as read from the database.
type FileRow = (String, String, String, i64, Option<String>, String, String);

/// Maps a file row into raw columns.
fn map_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Builds a file entity from raw columns, failing closed on bad data.
fn build_file_record(row: FileRow) -> Result<FileEntity, StoreError> {
    let (object_id, file_name, file_type, file_size, file_md5sum, file_access, info_json) = row;
    let file_access = FileAccess::from_label(&file_access)
        .ok_or_else(|| StoreError::Invalid(format!("unknown file access: {file_access}")))?;
    let info: Value = serde_json::from_str(&info_json)
        .map_err(|err| StoreError::Invalid(format!("stored file info unparseable: {err}")))?;
    Ok(FileEntity {
        object_id: ObjectId::new(object_id),
        file_name,
        file_type,
        file_size,
        file_md5sum,
        file_access,
        info,
    })
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Ensures the parent directory for the store path exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| map_db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| map_db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| map_db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| map_db_error(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| map_db_error(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| map_db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| map_db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| map_db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| map_db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS analysis_type_schema (
                    name TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    schema_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (name, version)
                );
                CREATE TABLE IF NOT EXISTS upload (
                    upload_id TEXT NOT NULL PRIMARY KEY,
                    study_id TEXT NOT NULL,
                    analysis_id TEXT,
                    state TEXT NOT NULL,
                    validated_type_name TEXT,
                    validated_type_version INTEGER,
                    payload_json TEXT NOT NULL,
                    errors_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_upload_study
                    ON upload (study_id);
                CREATE TABLE IF NOT EXISTS analysis (
                    analysis_id TEXT NOT NULL PRIMARY KEY,
                    study_id TEXT NOT NULL,
                    type_name TEXT NOT NULL,
                    type_version INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    data_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_analysis_study
                    ON analysis (study_id);
                CREATE TABLE IF NOT EXISTS analysis_sample (
                    analysis_id TEXT NOT NULL,
                    sample_id TEXT NOT NULL,
                    PRIMARY KEY (analysis_id, sample_id),
                    FOREIGN KEY (analysis_id)
                        REFERENCES analysis(analysis_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS analysis_file (
                    object_id TEXT NOT NULL PRIMARY KEY,
                    analysis_id TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    file_type TEXT NOT NULL,
                    file_size INTEGER NOT NULL,
                    file_md5sum TEXT,
                    file_access TEXT NOT NULL,
                    info_json TEXT NOT NULL,
                    FOREIGN KEY (analysis_id)
                        REFERENCES analysis(analysis_id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_analysis_file_analysis
                    ON analysis_file (analysis_id);",
            )
            .map_err(|err| map_db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| map_db_error(&err))?;
    Ok(())
}

/// Returns the current unix timestamp in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
