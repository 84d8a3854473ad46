// crates/submission-gate-registry/src/registry.rs
// ============================================================================
// Module: Schema Registry
// Description: Versioned schema registration and resolution.
// Purpose: Resolve (name, version) pairs through an immutable startup cache
//          with store fallback; register new versions append-only.
// Dependencies: submission-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The registry fronts a [`SchemaStore`]. A read-only cache is built once
//! during the init phase, before the pipeline accepts traffic, so concurrent
//! reads need no locking. Schemas registered after startup resolve through
//! the store fallback path. Registration compiles the candidate document
//! first; an uncompilable schema is rejected before any version is assigned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use submission_gate_core::AnalysisTypeSchema;
use submission_gate_core::SchemaName;
use submission_gate_core::SchemaStore;
use submission_gate_core::SchemaVersion;
use submission_gate_core::StoreError;
use thiserror::Error;

use crate::validate::compile_schema;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested schema name or version is unknown.
    #[error("schema not found: {name} version {version}")]
    NotFound {
        /// Requested schema name.
        name: String,
        /// Requested version, or "latest" when omitted.
        version: String,
    },
    /// The schema document does not compile.
    #[error("{0}")]
    InvalidSchema(String),
    /// The backing store reported an error.
    #[error("schema store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Schema Cache
// ============================================================================

/// Immutable (name, version) → schema cache built at startup.
#[derive(Debug, Default)]
struct SchemaCache {
    /// Cached schema records keyed by name and raw version.
    records: BTreeMap<(SchemaName, u32), AnalysisTypeSchema>,
}

impl SchemaCache {
    /// Builds the cache from every stored schema record.
    fn build(records: Vec<AnalysisTypeSchema>) -> Self {
        let records = records
            .into_iter()
            .map(|record| ((record.name.clone(), record.version.get()), record))
            .collect();
        Self {
            records,
        }
    }

    /// Returns the cached record for an exact (name, version) pair.
    fn get(&self, name: &SchemaName, version: SchemaVersion) -> Option<&AnalysisTypeSchema> {
        self.records.get(&(name.clone(), version.get()))
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Versioned schema registry with an immutable startup cache.
///
/// # Invariants
/// - The cache is read-only after construction; registrations made after
///   startup resolve through the store fallback path.
/// - Versions are append-only; the store assigns `max + 1` atomically.
pub struct SchemaRegistry<S> {
    /// Backing schema store.
    store: Arc<S>,
    /// Read-only cache populated during init.
    cache: SchemaCache,
}

impl<S: SchemaStore> SchemaRegistry<S> {
    /// Loads the registry, building the startup cache from the store.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the stored schemas cannot be loaded.
    pub fn load(store: Arc<S>) -> Result<Self, RegistryError> {
        let cache = SchemaCache::build(store.load_all_schemas()?);
        Ok(Self {
            store,
            cache,
        })
    }

    /// Registers a schema document under the next version for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidSchema`] when the document does not
    /// compile, or a store error when persistence fails.
    pub fn register(
        &self,
        name: &SchemaName,
        schema: &Value,
    ) -> Result<SchemaVersion, RegistryError> {
        compile_schema(schema)?;
        Ok(self.store.register_schema(name, schema)?)
    }

    /// Resolves a schema by name and optional version; an omitted version
    /// resolves to the latest.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the name or version is
    /// unknown, or a store error when lookup fails.
    pub fn resolve(
        &self,
        name: &SchemaName,
        version: Option<SchemaVersion>,
    ) -> Result<AnalysisTypeSchema, RegistryError> {
        match version {
            Some(version) => {
                if let Some(record) = self.cache.get(name, version) {
                    return Ok(record.clone());
                }
                self.store.get_schema(name, version)?.ok_or_else(|| RegistryError::NotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                })
            }
            // Latest must reflect registrations made after startup, so it
            // always consults the store.
            None => {
                self.store.latest_schema(name)?.ok_or_else(|| RegistryError::NotFound {
                    name: name.to_string(),
                    version: "latest".to_string(),
                })
            }
        }
    }
}
