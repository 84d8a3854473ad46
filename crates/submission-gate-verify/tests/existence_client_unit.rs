// crates/submission-gate-verify/tests/existence_client_unit.rs
// ============================================================================
// Module: Existence Client Unit Tests
// Description: HTTP behavior tests for the storage existence client.
// Purpose: Validate status classification, bearer auth, retry exhaustion,
//          and recovery after transient failures.
// ============================================================================

//! ## Overview
//! Exercises the client against a local HTTP server: boolean bodies parse
//! into existence results, 4xx rejections fail fast without retrying, 503
//! responses retry until the policy is exhausted, and a transient failure
//! followed by success recovers.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;

use submission_gate_core::ExistenceCheck;
use submission_gate_core::ExistenceError;
use submission_gate_core::ObjectId;
use submission_gate_verify::RetryPolicy;
use submission_gate_verify::StorageClientConfig;
use submission_gate_verify::StorageExistenceClient;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serves a fixed script of `(status, body)` responses, one per request,
/// recording the request count and the last Authorization header seen.
fn spawn_script_server(
    script: Vec<(u16, String)>,
) -> (String, Arc<AtomicUsize>, Arc<std::sync::Mutex<Option<String>>>, JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}");
    let count = Arc::new(AtomicUsize::new(0));
    let auth = Arc::new(std::sync::Mutex::new(None));
    let thread_count = Arc::clone(&count);
    let thread_auth = Arc::clone(&auth);
    let handle = thread::spawn(move || {
        for (status, body) in script {
            let Ok(request) = server.recv() else {
                return;
            };
            thread_count.fetch_add(1, Ordering::SeqCst);
            let header = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            *thread_auth.lock().unwrap() = header;
            let response = Response::from_string(body).with_status_code(status);
            let _ = request.respond(response);
        }
    });
    (url, count, auth, handle)
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_interval_ms: 1,
        multiplier: 2.0,
    }
}

fn client_for(endpoint: &str, max_retries: u32) -> StorageExistenceClient {
    StorageExistenceClient::new(StorageClientConfig {
        endpoint: endpoint.to_string(),
        timeout_ms: 2_000,
        user_agent: "submission-gate-test".to_string(),
        retry: fast_policy(max_retries),
    })
    .expect("build client")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies a 200 `true` body reports existence and carries the token.
#[test]
fn existing_object_reports_true_with_bearer_auth() {
    let (url, count, auth, handle) =
        spawn_script_server(vec![(200, "true".to_string())]);
    let client = client_for(&url, 0);

    let found = client.exists("token-1", &ObjectId::new("obj-1")).expect("exists");
    handle.join().expect("server thread");

    assert!(found);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(auth.lock().unwrap().as_deref(), Some("Bearer token-1"));
}

/// Verifies a 200 `false` body reports absence, not an error.
#[test]
fn missing_object_reports_false() {
    let (url, count, _auth, handle) =
        spawn_script_server(vec![(200, "false".to_string())]);
    let client = client_for(&url, 0);

    let found = client.exists("token-1", &ObjectId::new("obj-1")).expect("exists");
    handle.join().expect("server thread");

    assert!(!found);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Verifies a 4xx rejection fails fast without retrying.
#[test]
fn client_rejection_fails_without_retry() {
    let (url, count, _auth, handle) =
        spawn_script_server(vec![(404, String::new())]);
    let client = client_for(&url, 5);

    let result = client.exists("token-1", &ObjectId::new("obj-1"));
    handle.join().expect("server thread");

    assert!(matches!(result, Err(ExistenceError::Client { status: 404 })));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Verifies 503 responses retry until the policy is exhausted.
#[test]
fn unavailable_retries_until_exhausted() {
    let script = vec![(503, String::new()); 3];
    let (url, count, _auth, handle) = spawn_script_server(script);
    let client = client_for(&url, 2);

    let result = client.exists("token-1", &ObjectId::new("obj-1"));
    handle.join().expect("server thread");

    assert_eq!(count.load(Ordering::SeqCst), 3);
    match result {
        Err(ExistenceError::Exhausted {
            attempts, ..
        }) => assert_eq!(attempts, 3),
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

/// Verifies a transient failure followed by success recovers.
#[test]
fn transient_failure_recovers_on_retry() {
    let script = vec![(503, String::new()), (200, "true".to_string())];
    let (url, count, _auth, handle) = spawn_script_server(script);
    let client = client_for(&url, 2);

    let found = client.exists("token-1", &ObjectId::new("obj-1")).expect("exists");
    handle.join().expect("server thread");

    assert!(found);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Verifies a non-boolean 200 body is a transport error.
#[test]
fn malformed_body_is_a_transport_error() {
    let (url, _count, _auth, handle) =
        spawn_script_server(vec![(200, "{\"exists\": true}".to_string())]);
    let client = client_for(&url, 0);

    let result = client.exists("token-1", &ObjectId::new("obj-1"));
    handle.join().expect("server thread");

    assert!(matches!(result, Err(ExistenceError::Transport(_))));
}
