// crates/submission-gate-core/src/lib.rs
// ============================================================================
// Module: Submission Gate Core Library
// Description: Public API surface for the Submission Gate core.
// Purpose: Expose core types, interfaces, and the error taxonomy.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Submission Gate core defines the canonical data model for schema-validated
//! scientific submissions: uploads moving through validation, analyses moving
//! through a publication lifecycle, and the file and sample references they
//! carry. It is backend-agnostic and integrates through explicit interfaces
//! rather than embedding a storage engine or transport.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AnalysisStore;
pub use interfaces::ExistenceCheck;
pub use interfaces::ExistenceError;
pub use interfaces::IdError;
pub use interfaces::IdentifierGenerator;
pub use interfaces::SchemaStore;
pub use interfaces::StoreError;
pub use interfaces::UploadStore;
