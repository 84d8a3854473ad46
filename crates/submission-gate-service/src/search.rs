// crates/submission-gate-service/src/search.rs
// ============================================================================
// Module: Search Engine
// Description: Key-chain regex search over persisted dynamic JSON.
// Purpose: Evaluate conjunctive search terms against every analysis's
//          dynamic data.
// Dependencies: submission-gate-core, regex
// ============================================================================

//! ## Overview
//! Each term drills into the dynamic JSON along its key chain and matches
//! the leaf against a full-span regex (the pattern is anchored as
//! `\A(?:pat)\z`, so `male` does not match `female`). String leaves match
//! as-is; numbers and booleans match their canonical text; null, arrays,
//! and objects never match. Terms are ANDed; a query with no terms returns
//! every analysis.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use submission_gate_core::AnalysisStore;
use submission_gate_core::SearchHit;
use submission_gate_core::SearchTerm;
use submission_gate_core::ServiceError;
use submission_gate_core::Violation;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Search engine over the analysis store's dynamic data.
pub struct SearchEngine<A> {
    /// Analysis persistence.
    store: Arc<A>,
}

impl<A> SearchEngine<A>
where
    A: AnalysisStore,
{
    /// Creates a search engine over the given store.
    pub const fn new(store: Arc<A>) -> Self {
        Self {
            store,
        }
    }

    /// Evaluates the conjunction of `terms` over every analysis.
    ///
    /// When `include_info` is set, each hit carries the analysis's dynamic
    /// data.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] when a term's pattern is not a
    /// valid regular expression.
    pub fn search(
        &self,
        include_info: bool,
        terms: &[SearchTerm],
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let compiled = compile_terms(terms)?;
        let rows = self
            .store
            .list_analysis_data()
            .map_err(|err| ServiceError::internal(err.to_string()))?;
        let mut hits = Vec::new();
        for (analysis_id, data) in rows {
            if compiled.iter().all(|term| term.matches(&data)) {
                hits.push(SearchHit {
                    analysis_id,
                    info: include_info.then(|| data.clone()),
                });
            }
        }
        Ok(hits)
    }
}

// ============================================================================
// SECTION: Compiled Terms
// ============================================================================

/// A term with its pattern compiled for full-span matching.
struct CompiledTerm<'a> {
    /// Ordered keys drilling into the dynamic JSON.
    key_chain: &'a [String],
    /// Anchored regex.
    regex: Regex,
}

impl CompiledTerm<'_> {
    /// Returns true when the leaf under the key chain matches the pattern.
    fn matches(&self, data: &Value) -> bool {
        let mut cursor = data;
        for key in self.key_chain {
            let Some(next) = cursor.as_object().and_then(|object| object.get(key)) else {
                return false;
            };
            cursor = next;
        }
        match cursor {
            Value::String(text) => self.regex.is_match(text),
            Value::Number(number) => self.regex.is_match(&number.to_string()),
            Value::Bool(flag) => self.regex.is_match(&flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        }
    }
}

/// Compiles every term's pattern, anchored to span the whole leaf.
fn compile_terms(terms: &[SearchTerm]) -> Result<Vec<CompiledTerm<'_>>, ServiceError> {
    let mut compiled = Vec::with_capacity(terms.len());
    for term in terms {
        let anchored = format!(r"\A(?:{})\z", term.pattern());
        let regex = Regex::new(&anchored).map_err(|err| ServiceError::Validation {
            violations: vec![Violation::message(format!(
                "invalid search pattern {:?}: {err}",
                term.pattern()
            ))],
        })?;
        compiled.push(CompiledTerm {
            key_chain: term.key_chain(),
            regex,
        });
    }
    Ok(compiled)
}
