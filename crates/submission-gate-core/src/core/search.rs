// crates/submission-gate-core/src/core/search.rs
// ============================================================================
// Module: Submission Gate Search Terms
// Description: Validated key-chain/regex terms for dynamic JSON search.
// Purpose: Provide the structured query unit consumed by the search engine.
// Dependencies: crate::core::identifiers, serde, thiserror
// ============================================================================

//! ## Overview
//! A search term drills into persisted dynamic JSON via an ordered key chain
//! and matches the leaf value against a regular expression. Terms are
//! validated at construction; the search engine ANDs them together.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::AnalysisId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Search term construction errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchTermError {
    /// Key chain contained no keys.
    #[error("search term requires at least one key")]
    EmptyKeyChain,
    /// A key contained no non-whitespace character.
    #[error("search term key must contain a non-whitespace character")]
    BlankKey,
}

// ============================================================================
// SECTION: Search Term
// ============================================================================

/// A single search conjunct: key chain plus regex pattern.
///
/// # Invariants
/// - `key_chain` is non-empty and every key contains a non-whitespace
///   character.
/// - `value` is an uncompiled regex pattern; compilation happens in the
///   search engine so pattern errors surface per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    /// Ordered keys drilling into the dynamic JSON.
    key_chain: Vec<String>,
    /// Regex pattern applied to the leaf value.
    value: String,
}

impl SearchTerm {
    /// Creates a search term from an explicit key chain.
    ///
    /// # Errors
    ///
    /// Returns [`SearchTermError`] when the chain is empty or a key is blank.
    pub fn new(
        key_chain: Vec<String>,
        value: impl Into<String>,
    ) -> Result<Self, SearchTermError> {
        if key_chain.is_empty() {
            return Err(SearchTermError::EmptyKeyChain);
        }
        if key_chain.iter().any(|key| key.trim().is_empty()) {
            return Err(SearchTermError::BlankKey);
        }
        Ok(Self {
            key_chain,
            value: value.into(),
        })
    }

    /// Creates a search term from a dotted key (`donor.gender`).
    ///
    /// # Errors
    ///
    /// Returns [`SearchTermError`] when the dotted key yields no keys or a
    /// blank key.
    pub fn parse(dotted_key: &str, value: impl Into<String>) -> Result<Self, SearchTermError> {
        let keys = dotted_key.split('.').map(str::to_string).collect::<Vec<String>>();
        Self::new(keys, value)
    }

    /// Returns the ordered key chain.
    #[must_use]
    pub fn key_chain(&self) -> &[String] {
        &self.key_chain
    }

    /// Returns the regex pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.value
    }
}

// ============================================================================
// SECTION: Search Results
// ============================================================================

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matched analysis identifier.
    pub analysis_id: AnalysisId,
    /// Dynamic data for the analysis, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}
