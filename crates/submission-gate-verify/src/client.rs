// crates/submission-gate-verify/src/client.rs
// ============================================================================
// Module: Storage Existence Client
// Description: Blocking HTTP client for object existence checks.
// Purpose: Ask external object storage whether a referenced object exists,
//          retrying transient failures per the configured policy.
// Dependencies: submission-gate-core, reqwest, tracing
// ============================================================================

//! ## Overview
//! The client issues `GET {endpoint}/object/{object_id}/exists` with a
//! bearer token and expects a JSON boolean body on 200. Responses classify
//! into the retry taxonomy: 4xx rejections fail fast, 503 and timeouts
//! retry with exponential backoff, anything else fails fast. When retries
//! run out the last error is reported with the attempt count.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use submission_gate_core::ExistenceCheck;
use submission_gate_core::ExistenceError;
use submission_gate_core::ObjectId;
use tracing::warn;

use crate::retry::RetryDecision;
use crate::retry::RetryPolicy;
use crate::retry::RetryPredicate;
use crate::retry::retry_verdict;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the storage existence client.
///
/// # Invariants
/// - `endpoint` is the storage service base URL without a trailing slash.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageClientConfig {
    /// Storage service base URL.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Returns the default request timeout in milliseconds.
const fn default_timeout_ms() -> u64 {
    10_000
}

/// Returns the default user agent string.
fn default_user_agent() -> String {
    "submission-gate/0.1".to_string()
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking existence client for external object storage.
///
/// # Invariants
/// - Redirects are not followed.
/// - Client rejections (4xx) are never retried.
pub struct StorageExistenceClient {
    /// Client configuration, including the retry policy.
    config: StorageClientConfig,
    /// HTTP client used for outbound requests.
    client: Client,
    /// Ordered retry predicates consulted before the default classification.
    retry_chain: Vec<RetryPredicate>,
}

impl StorageExistenceClient {
    /// Creates a new storage existence client.
    ///
    /// # Errors
    ///
    /// Returns [`ExistenceError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(config: StorageClientConfig) -> Result<Self, ExistenceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| ExistenceError::Transport(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            client,
            retry_chain: Vec::new(),
        })
    }

    /// Creates a client with custom retry predicates ahead of the default
    /// classification.
    ///
    /// # Errors
    ///
    /// Returns [`ExistenceError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn with_retry_chain(
        config: StorageClientConfig,
        retry_chain: Vec<RetryPredicate>,
    ) -> Result<Self, ExistenceError> {
        let mut client = Self::new(config)?;
        client.retry_chain = retry_chain;
        Ok(client)
    }

    /// Performs one existence request without retrying.
    fn check_once(&self, token: &str, object_id: &ObjectId) -> Result<bool, ExistenceError> {
        let url = format!(
            "{}/object/{}/exists",
            self.config.endpoint.trim_end_matches('/'),
            object_id.as_str()
        );
        let response = self.client.get(&url).bearer_auth(token).send().map_err(|err| {
            if err.is_timeout() {
                ExistenceError::Timeout(err.to_string())
            } else {
                ExistenceError::Transport(err.to_string())
            }
        })?;
        let status = response.status();
        if status == StatusCode::OK {
            let body: serde_json::Value = response
                .json()
                .map_err(|err| ExistenceError::Transport(format!("malformed body: {err}")))?;
            return body.as_bool().ok_or_else(|| {
                ExistenceError::Transport("existence body is not a boolean".to_string())
            });
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ExistenceError::Unavailable {
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            return Err(ExistenceError::Client {
                status: status.as_u16(),
            });
        }
        Err(ExistenceError::Transport(format!("unexpected status: {status}")))
    }
}

impl ExistenceCheck for StorageExistenceClient {
    fn exists(&self, token: &str, object_id: &ObjectId) -> Result<bool, ExistenceError> {
        let total = self.config.retry.total_attempts();
        let mut last_error: Option<ExistenceError> = None;
        for attempt in 1 ..= total {
            match self.check_once(token, object_id) {
                Ok(found) => return Ok(found),
                Err(error) => {
                    let verdict = retry_verdict(&self.retry_chain, &error);
                    if verdict == RetryDecision::Fail {
                        return Err(error);
                    }
                    if attempt < total {
                        let delay = self.config.retry.delay_for_retry(attempt);
                        warn!(
                            object_id = object_id.as_str(),
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %error,
                            "existence check failed, retrying"
                        );
                        thread::sleep(delay);
                    }
                    last_error = Some(error);
                }
            }
        }
        let message = last_error.map_or_else(String::new, |error| error.to_string());
        Err(ExistenceError::Exhausted {
            service: "storage".to_string(),
            attempts: total,
            message,
        })
    }
}
