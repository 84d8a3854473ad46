// crates/submission-gate-registry/tests/registry.rs
// ============================================================================
// Module: Schema Registry Tests
// Description: Registration, resolution, and cache fallback behavior.
// Purpose: Ensure versions are append-only and resolution fails closed.
// Dependencies: submission-gate-registry, submission-gate-core, serde_json
// ============================================================================
//! ## Overview
//! Exercises the registry against an in-memory schema store: monotonic
//! version assignment, latest/exact resolution, rejection of uncompilable
//! documents, and store fallback for post-startup registrations.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use submission_gate_core::AnalysisTypeSchema;
use submission_gate_core::SchemaName;
use submission_gate_core::SchemaStore;
use submission_gate_core::SchemaVersion;
use submission_gate_core::StoreError;
use submission_gate_registry::RegistryError;
use submission_gate_registry::SchemaRegistry;

/// In-memory schema store used to isolate registry behavior.
#[derive(Default)]
struct MemorySchemaStore {
    records: Mutex<BTreeMap<(String, u32), AnalysisTypeSchema>>,
}

impl SchemaStore for MemorySchemaStore {
    fn register_schema(
        &self,
        name: &SchemaName,
        schema: &Value,
    ) -> Result<SchemaVersion, StoreError> {
        let mut records = self.records.lock().expect("store mutex");
        let next = records
            .keys()
            .filter(|(stored_name, _)| stored_name == name.as_str())
            .map(|(_, version)| *version)
            .max()
            .unwrap_or(0)
            + 1;
        let version = SchemaVersion::from_raw(next)
            .ok_or_else(|| StoreError::Invalid("version overflow".to_string()))?;
        records.insert(
            (name.as_str().to_string(), next),
            AnalysisTypeSchema {
                name: name.clone(),
                version,
                schema: schema.clone(),
                created_at: 0,
            },
        );
        Ok(version)
    }

    fn get_schema(
        &self,
        name: &SchemaName,
        version: SchemaVersion,
    ) -> Result<Option<AnalysisTypeSchema>, StoreError> {
        let records = self.records.lock().expect("store mutex");
        Ok(records.get(&(name.as_str().to_string(), version.get())).cloned())
    }

    fn latest_schema(&self, name: &SchemaName) -> Result<Option<AnalysisTypeSchema>, StoreError> {
        let records = self.records.lock().expect("store mutex");
        Ok(records
            .iter()
            .filter(|((stored_name, _), _)| stored_name == name.as_str())
            .max_by_key(|((_, version), _)| *version)
            .map(|(_, record)| record.clone()))
    }

    fn load_all_schemas(&self) -> Result<Vec<AnalysisTypeSchema>, StoreError> {
        let records = self.records.lock().expect("store mutex");
        Ok(records.values().cloned().collect())
    }
}

fn sequencing_read_schema() -> Value {
    json!({
        "type": "object",
        "required": ["libraryStrategy"],
        "properties": {
            "libraryStrategy": {"type": "string"}
        }
    })
}

/// Verifies version assignment starts at one and counts upward per name.
#[test]
fn registration_assigns_monotonic_versions_per_name() {
    let store = Arc::new(MemorySchemaStore::default());
    let registry = SchemaRegistry::load(Arc::clone(&store)).expect("load registry");
    let name = SchemaName::new("sequencingRead");

    let v1 = registry.register(&name, &sequencing_read_schema()).expect("register v1");
    let v2 = registry.register(&name, &sequencing_read_schema()).expect("register v2");
    assert_eq!(v1.get(), 1);
    assert_eq!(v2.get(), 2);

    let other = SchemaName::new("variantCall");
    let other_v1 = registry.register(&other, &json!({"type": "object"})).expect("register");
    assert_eq!(other_v1.get(), 1);
}

/// Verifies exact and latest resolution, including post-startup fallback.
#[test]
fn resolution_returns_exact_and_latest_versions() {
    let store = Arc::new(MemorySchemaStore::default());
    let name = SchemaName::new("sequencingRead");
    store.register_schema(&name, &sequencing_read_schema()).expect("seed v1");

    // Cache sees v1; v2 arrives after startup and resolves via the store.
    let registry = SchemaRegistry::load(Arc::clone(&store)).expect("load registry");
    let v2 = registry.register(&name, &json!({"type": "object"})).expect("register v2");

    let exact = registry
        .resolve(&name, SchemaVersion::from_raw(1))
        .expect("resolve v1");
    assert_eq!(exact.version.get(), 1);

    let fallback = registry.resolve(&name, Some(v2)).expect("resolve v2 via store");
    assert_eq!(fallback.version.get(), 2);

    let latest = registry.resolve(&name, None).expect("resolve latest");
    assert_eq!(latest.version.get(), 2);
}

/// Verifies unknown names and versions fail with a not-found error.
#[test]
fn unknown_schemas_fail_closed() {
    let store = Arc::new(MemorySchemaStore::default());
    let registry = SchemaRegistry::load(store).expect("load registry");

    let missing = registry.resolve(&SchemaName::new("unknown"), None);
    assert!(matches!(missing, Err(RegistryError::NotFound { .. })));

    let missing_version =
        registry.resolve(&SchemaName::new("unknown"), SchemaVersion::from_raw(3));
    assert!(matches!(missing_version, Err(RegistryError::NotFound { .. })));
}

/// Verifies an uncompilable document is rejected before a version exists.
#[test]
fn uncompilable_schemas_are_rejected_without_a_version() {
    let store = Arc::new(MemorySchemaStore::default());
    let registry = SchemaRegistry::load(Arc::clone(&store)).expect("load registry");
    let name = SchemaName::new("broken");

    let result = registry.register(&name, &json!({"type": "not-a-type"}));
    assert!(matches!(result, Err(RegistryError::InvalidSchema(_))));
    assert!(store.latest_schema(&name).expect("lookup").is_none());
}
