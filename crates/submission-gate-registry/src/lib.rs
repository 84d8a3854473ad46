// crates/submission-gate-registry/src/lib.rs
// ============================================================================
// Module: Submission Gate Schema Registry
// Description: Named, versioned JSON Schemas with full-violation validation.
// Purpose: Resolve (name, version) pairs and validate payloads against them.
// Dependencies: submission-gate-core, jsonschema
// ============================================================================

//! ## Overview
//! This crate provides the schema registry: dynamic registration of named,
//! versioned analysis type schemas, resolution through an immutable startup
//! cache with store fallback, and payload validation that enumerates every
//! violation rather than stopping at the first.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod registry;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use registry::RegistryError;
pub use registry::SchemaRegistry;
pub use validate::ValidationOutcome;
pub use validate::compile_schema;
pub use validate::validate_payload;
