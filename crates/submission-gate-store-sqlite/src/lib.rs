// crates/submission-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Submission Gate SQLite Store
// Description: Durable persistence for schemas, uploads, and analyses.
// Purpose: Implement the core store interfaces on SQLite with WAL.
// Dependencies: submission-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides the single durable backend for the registration
//! pipeline: the schema registry table, the append-only upload ledger, and
//! the analysis aggregate with its files and sample links. Writes are
//! serialized through one connection; reads go through a small round-robin
//! pool of additional connections for WAL read isolation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
