// crates/submission-gate-service/src/workers.rs
// ============================================================================
// Module: Validation Worker Pool
// Description: Bounded asynchronous validation of submitted payloads.
// Purpose: Run schema validation on a fixed thread pool fed by a bounded
//          queue, rejecting new work when saturated.
// Dependencies: submission-gate-core, submission-gate-registry, serde,
//               thiserror, tracing
// ============================================================================

//! ## Overview
//! A fixed set of named worker threads shares one bounded `sync_channel`.
//! `submit` never blocks: a full queue is reported as saturation with a
//! suggested retry delay. Workers resolve the schema named by the payload's
//! `analysisType` and record the outcome on the upload, pinning the exact
//! resolved version on success; every failure mode (unknown type, malformed
//! payload, store error) becomes a recorded validation error, never a
//! worker crash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::TrySendError;
use std::thread;
use std::thread::JoinHandle;

use serde::Deserialize;
use serde_json::Value;
use submission_gate_core::AnalysisTypeRef;
use submission_gate_core::SchemaStore;
use submission_gate_core::ServiceError;
use submission_gate_core::UploadId;
use submission_gate_core::UploadState;
use submission_gate_core::UploadStore;
use submission_gate_core::Violation;
use submission_gate_registry::SchemaRegistry;
use submission_gate_registry::validate_payload;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::payload;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the validation worker pool.
///
/// # Invariants
/// - `workers` and `queue_capacity` must be greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of validation worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Suggested retry delay returned on saturation, in milliseconds.
    #[serde(default = "default_retry_after_ms")]
    pub retry_after_ms: u64,
}

/// Returns the default worker thread count.
const fn default_workers() -> usize {
    4
}

/// Returns the default bounded queue capacity.
const fn default_queue_capacity() -> usize {
    256
}

/// Returns the default saturation retry delay in milliseconds.
const fn default_retry_after_ms() -> u64 {
    100
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            retry_after_ms: default_retry_after_ms(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Worker pool submission errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The bounded queue is full; the caller should retry later.
    #[error("validation queue saturated")]
    Saturated {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
    },
    /// The pool has been shut down.
    #[error("validation pool stopped")]
    Stopped,
}

impl From<PoolError> for ServiceError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Saturated {
                retry_after_ms,
            } => Self::Overloaded {
                retry_after_ms: Some(retry_after_ms),
            },
            PoolError::Stopped => Self::internal("validation pool stopped"),
        }
    }
}

// ============================================================================
// SECTION: Jobs
// ============================================================================

/// A queued validation job.
#[derive(Debug)]
pub struct ValidationJob {
    /// Upload awaiting validation.
    pub upload_id: UploadId,
    /// Raw payload to validate.
    pub payload: Value,
}

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Bounded validation worker pool.
///
/// # Invariants
/// - `submit` never blocks; a full queue is reported as saturation.
/// - Workers exit when the sender side is dropped during shutdown.
pub struct ValidationWorkerPool {
    /// Sender into the bounded queue; `None` once shut down.
    sender: Mutex<Option<SyncSender<ValidationJob>>>,
    /// Worker thread handles, drained by shutdown.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Suggested retry delay returned on saturation.
    retry_after_ms: u64,
}

impl ValidationWorkerPool {
    /// Starts the pool with the given registry and upload store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the configuration is out of range or a
    /// worker thread cannot be spawned.
    pub fn start<S, U>(
        config: &WorkerPoolConfig,
        registry: Arc<SchemaRegistry<S>>,
        uploads: Arc<U>,
    ) -> Result<Self, ServiceError>
    where
        S: SchemaStore + Send + Sync + 'static,
        U: UploadStore + Send + Sync + 'static,
    {
        if config.workers == 0 {
            return Err(ServiceError::internal("workers must be greater than zero"));
        }
        if config.queue_capacity == 0 {
            return Err(ServiceError::internal("queue_capacity must be greater than zero"));
        }
        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(config.workers);
        for index in 0 .. config.workers {
            let receiver = Arc::clone(&receiver);
            let registry = Arc::clone(&registry);
            let uploads = Arc::clone(&uploads);
            let handle = thread::Builder::new()
                .name(format!("validation-{index}"))
                .spawn(move || worker_loop(&receiver, registry.as_ref(), uploads.as_ref()))
                .map_err(|err| ServiceError::internal(format!("worker spawn failed: {err}")))?;
            workers.push(handle);
        }
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            retry_after_ms: config.retry_after_ms,
        })
    }

    /// Enqueues a validation job without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Saturated`] when the queue is full and
    /// [`PoolError::Stopped`] when the pool has shut down.
    pub fn submit(&self, job: ValidationJob) -> Result<(), PoolError> {
        let guard = self.sender.lock().map_err(|_| PoolError::Stopped)?;
        let Some(sender) = guard.as_ref() else {
            return Err(PoolError::Stopped);
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PoolError::Saturated {
                retry_after_ms: self.retry_after_ms,
            }),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Stopped),
        }
    }

    /// Drains the queue and joins every worker.
    ///
    /// Queued jobs are still processed; only new submissions are refused.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        if let Ok(mut workers) = self.workers.lock() {
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    warn!("validation worker panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for ValidationWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// SECTION: Worker Loop
// ============================================================================

/// Receives jobs until the channel closes.
fn worker_loop<S, U>(
    receiver: &Arc<Mutex<Receiver<ValidationJob>>>,
    registry: &SchemaRegistry<S>,
    uploads: &U,
) where
    S: SchemaStore,
    U: UploadStore,
{
    loop {
        let job = {
            let Ok(guard) = receiver.lock() else {
                return;
            };
            guard.recv()
        };
        let Ok(job) = job else {
            return;
        };
        process_job(registry, uploads, &job);
    }
}

/// Validates one job and records the outcome on the upload.
fn process_job<S, U>(registry: &SchemaRegistry<S>, uploads: &U, job: &ValidationJob)
where
    S: SchemaStore,
    U: UploadStore,
{
    let outcome = validate_job(registry, &job.payload);
    let result = match outcome {
        Ok((resolved, violations)) if violations.is_empty() => {
            info!(
                upload_id = job.upload_id.as_str(),
                schema = resolved.name.as_str(),
                version = resolved.version.get(),
                "upload validated"
            );
            uploads.record_validation(
                &job.upload_id,
                UploadState::Validated,
                &[],
                Some(&resolved),
            )
        }
        Ok((_, violations)) => {
            info!(
                upload_id = job.upload_id.as_str(),
                violations = violations.len(),
                "upload failed validation"
            );
            uploads.record_validation(
                &job.upload_id,
                UploadState::ValidationError,
                &violations,
                None,
            )
        }
        Err(message) => {
            warn!(upload_id = job.upload_id.as_str(), error = %message, "validation errored");
            uploads.record_validation(
                &job.upload_id,
                UploadState::ValidationError,
                &[Violation::message(message)],
                None,
            )
        }
    };
    if let Err(error) = result {
        warn!(
            upload_id = job.upload_id.as_str(),
            error = %error,
            "failed to record validation outcome"
        );
    }
}

/// Resolves the payload's schema and validates against it, returning the
/// resolved type alongside the violations so successful validations can be
/// pinned to the exact version they satisfied.
///
/// Any failure along the way (missing type, unknown schema, store error)
/// collapses into a single error message recorded on the upload.
fn validate_job<S>(
    registry: &SchemaRegistry<S>,
    payload: &Value,
) -> Result<(AnalysisTypeRef, Vec<Violation>), String>
where
    S: SchemaStore,
{
    let (name, version) = payload::analysis_type_of(payload).map_err(|err| err.to_string())?;
    let record = registry.resolve(&name, version).map_err(|err| err.to_string())?;
    let outcome = validate_payload(&record.schema, payload).map_err(|err| err.to_string())?;
    let resolved = AnalysisTypeRef {
        name: record.name,
        version: record.version,
    };
    Ok((resolved, outcome.violations))
}
