// crates/submission-gate-config/src/config.rs
// ============================================================================
// Module: Submission Gate Configuration
// Description: Configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: submission-gate-service, submission-gate-store-sqlite,
//               submission-gate-verify, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed: the pipeline
//! never starts with an out-of-range pool, retry policy, or store setting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use submission_gate_service::WorkerPoolConfig;
use submission_gate_store_sqlite::SqliteStoreConfig;
use submission_gate_verify::StorageClientConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "submission-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "SUBMISSION_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum validation worker threads.
pub(crate) const MAX_POOL_WORKERS: usize = 64;
/// Maximum validation queue capacity.
pub(crate) const MAX_POOL_QUEUE_CAPACITY: usize = 65_536;
/// Maximum saturation retry delay in milliseconds.
pub(crate) const MAX_POOL_RETRY_AFTER_MS: u64 = 60_000;
/// Minimum storage client request timeout in milliseconds.
pub(crate) const MIN_STORAGE_TIMEOUT_MS: u64 = 100;
/// Maximum storage client request timeout in milliseconds.
pub(crate) const MAX_STORAGE_TIMEOUT_MS: u64 = 60_000;
/// Maximum retries after the initial existence check attempt.
pub(crate) const MAX_STORAGE_RETRIES: u32 = 16;
/// Maximum initial backoff interval in milliseconds.
pub(crate) const MAX_STORAGE_INITIAL_INTERVAL_MS: u64 = 60_000;
/// Maximum backoff multiplier.
pub(crate) const MAX_STORAGE_MULTIPLIER: f64 = 10.0;
/// Maximum store busy timeout in milliseconds.
pub(crate) const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum store read connection pool size.
pub(crate) const MAX_STORE_READ_POOL_SIZE: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Submission Gate pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionGateConfig {
    /// Validation worker pool configuration.
    #[serde(default)]
    pub pool: WorkerPoolConfig,
    /// External storage existence client configuration.
    pub storage: StorageClientConfig,
    /// `SQLite` store configuration.
    pub store: SqliteStoreConfig,
}

impl SubmissionGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pool(&self.pool)?;
        validate_storage(&self.storage)?;
        validate_store(&self.store)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Section Validation
// ============================================================================

/// Validates the worker pool section.
fn validate_pool(pool: &WorkerPoolConfig) -> Result<(), ConfigError> {
    if pool.workers == 0 || pool.workers > MAX_POOL_WORKERS {
        return Err(ConfigError::Invalid(format!(
            "pool.workers must be in 1..={MAX_POOL_WORKERS}"
        )));
    }
    if pool.queue_capacity == 0 || pool.queue_capacity > MAX_POOL_QUEUE_CAPACITY {
        return Err(ConfigError::Invalid(format!(
            "pool.queue_capacity must be in 1..={MAX_POOL_QUEUE_CAPACITY}"
        )));
    }
    if pool.retry_after_ms == 0 || pool.retry_after_ms > MAX_POOL_RETRY_AFTER_MS {
        return Err(ConfigError::Invalid(format!(
            "pool.retry_after_ms must be in 1..={MAX_POOL_RETRY_AFTER_MS}"
        )));
    }
    Ok(())
}

/// Validates the storage client section.
fn validate_storage(storage: &StorageClientConfig) -> Result<(), ConfigError> {
    let endpoint = storage.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Invalid("storage.endpoint must be non-empty".to_string()));
    }
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Invalid(
            "storage.endpoint must be an http or https url".to_string(),
        ));
    }
    if storage.timeout_ms < MIN_STORAGE_TIMEOUT_MS || storage.timeout_ms > MAX_STORAGE_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "storage.timeout_ms must be in {MIN_STORAGE_TIMEOUT_MS}..={MAX_STORAGE_TIMEOUT_MS}"
        )));
    }
    if storage.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.user_agent must be non-empty".to_string()));
    }
    let retry = &storage.retry;
    if retry.max_retries > MAX_STORAGE_RETRIES {
        return Err(ConfigError::Invalid(format!(
            "storage.retry.max_retries must be at most {MAX_STORAGE_RETRIES}"
        )));
    }
    if retry.initial_interval_ms == 0 || retry.initial_interval_ms > MAX_STORAGE_INITIAL_INTERVAL_MS
    {
        return Err(ConfigError::Invalid(format!(
            "storage.retry.initial_interval_ms must be in 1..={MAX_STORAGE_INITIAL_INTERVAL_MS}"
        )));
    }
    if !retry.multiplier.is_finite()
        || retry.multiplier < 1.0
        || retry.multiplier > MAX_STORAGE_MULTIPLIER
    {
        return Err(ConfigError::Invalid(format!(
            "storage.retry.multiplier must be in 1.0..={MAX_STORAGE_MULTIPLIER}"
        )));
    }
    Ok(())
}

/// Validates the store section.
fn validate_store(store: &SqliteStoreConfig) -> Result<(), ConfigError> {
    validate_path_string("store.path", &store.path.to_string_lossy())?;
    if store.busy_timeout_ms == 0 || store.busy_timeout_ms > MAX_STORE_BUSY_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "store.busy_timeout_ms must be in 1..={MAX_STORE_BUSY_TIMEOUT_MS}"
        )));
    }
    if store.read_pool_size == 0 || store.read_pool_size > MAX_STORE_READ_POOL_SIZE {
        return Err(ConfigError::Invalid(format!(
            "store.read_pool_size must be in 1..={MAX_STORE_READ_POOL_SIZE}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
