// crates/submission-gate-service/tests/lifecycle.rs
// ============================================================================
// Module: Analysis Lifecycle Tests
// Description: Publish, unpublish, suppress, and file update tests.
// Purpose: Validate the publication gate (checksum and existence
//          preconditions), terminal suppression, and update classification.
// ============================================================================

//! ## Overview
//! Lifecycle tests over the `SQLite` store with a scripted existence
//! verifier:
//! - Checksum precondition and the explicit bypass
//! - Existence verification with bearer token propagation
//! - Publish idempotency and transient failure mapping
//! - Terminal suppression
//! - Partial file update classification

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use serde_json::json;
use submission_gate_core::Analysis;
use submission_gate_core::AnalysisId;
use submission_gate_core::AnalysisState;
use submission_gate_core::AnalysisStore;
use submission_gate_core::AnalysisTypeRef;
use submission_gate_core::ExistenceCheck;
use submission_gate_core::ExistenceError;
use submission_gate_core::FileAccess;
use submission_gate_core::FileEntity;
use submission_gate_core::FileUpdateKind;
use submission_gate_core::FileUpdateRequest;
use submission_gate_core::ObjectId;
use submission_gate_core::SampleRef;
use submission_gate_core::SchemaName;
use submission_gate_core::SchemaVersion;
use submission_gate_core::ServiceError;
use submission_gate_core::StudyId;
use submission_gate_core::Upload;
use submission_gate_core::UploadId;
use submission_gate_core::UploadState;
use submission_gate_core::UploadStore;
use submission_gate_service::AnalysisLifecycle;
use submission_gate_store_sqlite::SqliteJournalMode;
use submission_gate_store_sqlite::SqliteStore;
use submission_gate_store_sqlite::SqliteStoreConfig;
use submission_gate_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Scripted Verifier
// ============================================================================

/// Existence verifier scripted with a set of known objects.
struct ScriptedVerifier {
    /// Object ids reported as existing.
    existing: BTreeSet<String>,
    /// When set, every check fails with an exhaustion error.
    exhausted: bool,
    /// Number of checks performed.
    calls: AtomicUsize,
    /// Last bearer token observed.
    last_token: Mutex<Option<String>>,
}

impl ScriptedVerifier {
    fn with_objects(object_ids: &[&str]) -> Self {
        Self {
            existing: object_ids.iter().map(|id| (*id).to_string()).collect(),
            exhausted: false,
            calls: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        }
    }

    fn failing() -> Self {
        Self {
            existing: BTreeSet::new(),
            exhausted: true,
            calls: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExistenceCheck for ScriptedVerifier {
    fn exists(&self, token: &str, object_id: &ObjectId) -> Result<bool, ExistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_token.lock() {
            *guard = Some(token.to_string());
        }
        if self.exhausted {
            return Err(ExistenceError::Exhausted {
                service: "storage".to_string(),
                attempts: 6,
                message: "existence service unavailable: status 503".to_string(),
            });
        }
        Ok(self.existing.contains(object_id.as_str()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(dir: &TempDir) -> Arc<SqliteStore> {
    let config = SqliteStoreConfig {
        path: dir.path().join("store.db"),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteJournalMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        read_pool_size: 2,
    };
    Arc::new(SqliteStore::new(&config).expect("open store"))
}

fn file_with_md5(object_id: &str, md5: Option<&str>) -> FileEntity {
    FileEntity {
        object_id: ObjectId::new(object_id),
        file_name: format!("{object_id}.bam"),
        file_type: "BAM".to_string(),
        file_size: 1_024,
        file_md5sum: md5.map(str::to_string),
        file_access: FileAccess::Controlled,
        info: json!({}),
    }
}

/// Persists an analysis with the given files, via a validated upload.
fn seed_analysis(store: &SqliteStore, analysis_id: &str, files: Vec<FileEntity>) -> AnalysisId {
    let upload_id = UploadId::new(format!("upload-{analysis_id}"));
    store
        .insert_upload(&Upload {
            upload_id: upload_id.clone(),
            study_id: StudyId::new("study-1"),
            analysis_id: None,
            state: UploadState::Created,
            validated_type: None,
            payload: json!({"analysisType": {"name": "sequencingRead"}}),
            errors: Vec::new(),
            created_at: 1,
            updated_at: 1,
        })
        .expect("insert upload");
    let pinned = AnalysisTypeRef {
        name: SchemaName::new("sequencingRead"),
        version: SchemaVersion::FIRST,
    };
    store
        .record_validation(&upload_id, UploadState::Validated, &[], Some(&pinned))
        .expect("record validation");
    let analysis_id = AnalysisId::new(analysis_id);
    store
        .persist_analysis(
            &upload_id,
            &Analysis {
                analysis_id: analysis_id.clone(),
                study_id: StudyId::new("study-1"),
                analysis_type: AnalysisTypeRef {
                    name: SchemaName::new("sequencingRead"),
                    version: SchemaVersion::FIRST,
                },
                state: AnalysisState::Unpublished,
                data: json!({"libraryStrategy": "WGS"}),
                samples: vec![SampleRef {
                    sample_id: "sample-1".into(),
                }],
                files,
            },
        )
        .expect("persist analysis");
    analysis_id
}

fn state_of(store: &SqliteStore, analysis_id: &AnalysisId) -> AnalysisState {
    store.get_analysis(analysis_id).expect("get analysis").expect("analysis present").state
}

// ============================================================================
// SECTION: Publish Tests
// ============================================================================

/// Verifies publication is blocked while a file has no checksum, naming the
/// offending object.
#[test]
fn publish_requires_file_checksums() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![
            file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e")),
            file_with_md5("obj-2", None),
        ],
    );
    let verifier = Arc::new(ScriptedVerifier::with_objects(&["obj-1", "obj-2"]));
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), Arc::clone(&verifier));

    let error = lifecycle.publish("token-1", &analysis_id, false).expect_err("must be blocked");
    assert_eq!(error.code(), "PRECONDITION_FAILED");
    let ServiceError::Precondition {
        object_ids, ..
    } = error
    else {
        panic!("expected a precondition failure");
    };
    assert_eq!(object_ids, vec![ObjectId::new("obj-2")]);
    // The checksum gate fires before any existence check.
    assert_eq!(verifier.call_count(), 0);
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Unpublished);
}

/// Verifies the checksum bypass still verifies existence and publishes.
#[test]
fn publish_with_checksum_bypass_still_verifies_existence() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![
            file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e")),
            file_with_md5("obj-2", None),
        ],
    );
    let verifier = Arc::new(ScriptedVerifier::with_objects(&["obj-1", "obj-2"]));
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), Arc::clone(&verifier));

    lifecycle.publish("token-1", &analysis_id, true).expect("publish");
    assert_eq!(verifier.call_count(), 2);
    assert_eq!(
        verifier.last_token.lock().expect("token").as_deref(),
        Some("token-1")
    );
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Published);
}

/// Verifies publication is blocked when a file is absent from storage.
#[test]
fn publish_rejects_objects_absent_from_storage() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![
            file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e")),
            file_with_md5("obj-2", Some("d41d8cd98f00b204e9800998ecf8427e")),
        ],
    );
    let verifier = Arc::new(ScriptedVerifier::with_objects(&["obj-1"]));
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), verifier);

    let error = lifecycle.publish("token-1", &analysis_id, false).expect_err("must be blocked");
    let ServiceError::Precondition {
        object_ids, ..
    } = error
    else {
        panic!("expected a precondition failure");
    };
    assert_eq!(object_ids, vec![ObjectId::new("obj-2")]);
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Unpublished);
}

/// Verifies re-publishing an already published analysis succeeds without
/// re-verification.
#[test]
fn publish_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e"))],
    );
    let verifier = Arc::new(ScriptedVerifier::with_objects(&["obj-1"]));
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), Arc::clone(&verifier));

    lifecycle.publish("token-1", &analysis_id, false).expect("first publish");
    assert_eq!(verifier.call_count(), 1);
    lifecycle.publish("token-1", &analysis_id, false).expect("second publish");
    assert_eq!(verifier.call_count(), 1);
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Published);
}

/// Verifies exhausted verification maps to the transient publish failure
/// class and leaves the analysis unpublished.
#[test]
fn exhausted_verification_is_a_transient_failure() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e"))],
    );
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), Arc::new(ScriptedVerifier::failing()));

    let error = lifecycle.publish("token-1", &analysis_id, false).expect_err("must fail");
    assert_eq!(error.code(), "PUBLISH_FAILED");
    assert!(matches!(error, ServiceError::TransientNetwork { ref service, .. } if service == "storage"));
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Unpublished);
}

/// Verifies publishing an unknown analysis maps to not-found.
#[test]
fn publish_of_unknown_analysis_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let lifecycle =
        AnalysisLifecycle::new(Arc::clone(&store), Arc::new(ScriptedVerifier::with_objects(&[])));

    let error = lifecycle
        .publish("token-1", &AnalysisId::new("missing"), false)
        .expect_err("must fail");
    assert_eq!(error.code(), "NOT_FOUND");
}

// ============================================================================
// SECTION: Unpublish and Suppress Tests
// ============================================================================

/// Verifies unpublish returns a published analysis to unpublished and is
/// idempotent.
#[test]
fn unpublish_withdraws_a_published_analysis() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e"))],
    );
    let verifier = Arc::new(ScriptedVerifier::with_objects(&["obj-1"]));
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), verifier);

    lifecycle.publish("token-1", &analysis_id, false).expect("publish");
    lifecycle.unpublish(&analysis_id).expect("unpublish");
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Unpublished);
    lifecycle.unpublish(&analysis_id).expect("idempotent unpublish");
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Unpublished);
}

/// Verifies suppression is terminal: publish and unpublish are rejected and
/// the state never changes.
#[test]
fn suppression_is_terminal() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let analysis_id = seed_analysis(
        &store,
        "an-1",
        vec![file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e"))],
    );
    let verifier = Arc::new(ScriptedVerifier::with_objects(&["obj-1"]));
    let lifecycle = AnalysisLifecycle::new(Arc::clone(&store), verifier);

    lifecycle.suppress(&analysis_id).expect("suppress");
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Suppressed);

    let error = lifecycle.publish("token-1", &analysis_id, false).expect_err("must be rejected");
    assert_eq!(error.code(), "STATE_CONFLICT");
    let error = lifecycle.unpublish(&analysis_id).expect_err("must be rejected");
    assert_eq!(error.code(), "STATE_CONFLICT");
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Suppressed);

    lifecycle.suppress(&analysis_id).expect("idempotent suppress");
    assert_eq!(state_of(&store, &analysis_id), AnalysisState::Suppressed);

    // The data is retained; only the state is terminal.
    let analysis = store.get_analysis(&analysis_id).expect("get").expect("present");
    assert_eq!(analysis.data, json!({"libraryStrategy": "WGS"}));
}

// ============================================================================
// SECTION: File Update Tests
// ============================================================================

/// Verifies update classification: identical fields persist nothing, content
/// changes dominate, metadata changes persist.
#[test]
fn file_updates_are_classified_and_applied() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    seed_analysis(
        &store,
        "an-1",
        vec![file_with_md5("obj-1", Some("d41d8cd98f00b204e9800998ecf8427e"))],
    );
    let lifecycle =
        AnalysisLifecycle::new(Arc::clone(&store), Arc::new(ScriptedVerifier::with_objects(&[])));
    let object_id = ObjectId::new("obj-1");

    // Identical checksum: no update, nothing persisted.
    let kind = lifecycle
        .update_file(
            &object_id,
            &FileUpdateRequest {
                file_md5sum: Some("d41d8cd98f00b204e9800998ecf8427e".to_string()),
                ..FileUpdateRequest::default()
            },
        )
        .expect("classify");
    assert_eq!(kind, FileUpdateKind::NoUpdate);
    let stored = store.get_file(&object_id).expect("get file").expect("file present");
    assert_eq!(stored.file_md5sum.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));

    // Metadata change.
    let kind = lifecycle
        .update_file(
            &object_id,
            &FileUpdateRequest {
                info: Some(json!({"aligner": "bwa"})),
                ..FileUpdateRequest::default()
            },
        )
        .expect("metadata update");
    assert_eq!(kind, FileUpdateKind::MetadataUpdate);
    let stored = store.get_file(&object_id).expect("get file").expect("file present");
    assert_eq!(stored.info, json!({"aligner": "bwa"}));

    // Content change dominates a simultaneous metadata change.
    let kind = lifecycle
        .update_file(
            &object_id,
            &FileUpdateRequest {
                file_md5sum: Some("900150983cd24fb0d6963f7d28e17f72".to_string()),
                info: Some(json!({"aligner": "minimap2"})),
                ..FileUpdateRequest::default()
            },
        )
        .expect("content update");
    assert_eq!(kind, FileUpdateKind::ContentUpdate);
    let stored = store.get_file(&object_id).expect("get file").expect("file present");
    assert_eq!(stored.file_md5sum.as_deref(), Some("900150983cd24fb0d6963f7d28e17f72"));
    assert_eq!(stored.info, json!({"aligner": "minimap2"}));

    // Unknown objects map to not-found.
    let error = lifecycle
        .update_file(&ObjectId::new("missing"), &FileUpdateRequest::default())
        .expect_err("must fail");
    assert_eq!(error.code(), "NOT_FOUND");
}
