//! Integration tests for the HTTP lesson backend client.

mod common;

use lesson_orchestrator::{
    CheckRequest, ExecutionStatus, HttpBackend, LessonBackend, LessonId, OrchestratorError,
    RunRequest,
};
use serde_json::json;

fn id(raw: &str) -> LessonId {
    LessonId::parse(raw).expect("valid lesson id")
}

// ============================================================================
// Lesson RPC
// ============================================================================

/// Tests that a lesson payload is decoded.
#[tokio::test]
async fn test_fetch_lesson() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("02", "# Two", "print(2)");
    let client = HttpBackend::new(&backend.url).expect("client");

    let payload = client.fetch_lesson(&id("02")).await.expect("lesson");

    assert_eq!(payload.problem_statement, "# Two");
    assert_eq!(payload.starter_code, "print(2)");
    assert!(!payload.is_error());
}

/// Tests that a 404 maps to a missing lesson rather than a transport error.
#[tokio::test]
async fn test_missing_lesson_is_not_found() {
    let backend = common::spawn_backend().await;
    let client = HttpBackend::new(format!("{}/", backend.url)).expect("client");

    let error = client.fetch_lesson(&id("05")).await.unwrap_err();

    assert!(matches!(error, OrchestratorError::LessonNotFound { .. }));
    assert!(!error.is_transport());
}

// ============================================================================
// Execution and check RPCs
// ============================================================================

/// Tests that an error payload is returned as data, not as an `Err`.
#[tokio::test]
async fn test_run_error_payload_is_data() {
    let backend = common::spawn_backend().await;
    backend.state.push_run(json!({
        "status": "error",
        "error_type": "runtime_error",
        "message": "division by zero",
        "error_output": "ZeroDivisionError: division by zero",
        "error_line": 3,
    }));
    let client = HttpBackend::new(&backend.url).expect("client");

    let response = client
        .run_code(&RunRequest::new("print(1/0)", Vec::new()))
        .await
        .expect("structured response");

    assert_eq!(response.status, ExecutionStatus::Error);
    assert_eq!(response.error_type.as_deref(), Some("runtime_error"));
    assert_eq!(response.error_line, Some(3));
    let bodies = backend.state.run_bodies();
    assert_eq!(bodies[0], json!({"code": "print(1/0)", "action": "run"}));
}

/// Tests that the check request carries the code and hits the lesson's URL.
#[tokio::test]
async fn test_check_answer() {
    let backend = common::spawn_backend().await;
    backend.state.push_check(json!({
        "status": "success",
        "correct": true,
        "message": "Nice",
        "hints": ["one"],
    }));
    let client = HttpBackend::new(&backend.url).expect("client");

    let response = client
        .check_answer(
            &id("03"),
            &CheckRequest {
                code: "print(3)".to_string(),
            },
        )
        .await
        .expect("check response");

    assert!(response.correct);
    assert_eq!(response.hints, vec!["one".to_string()]);
    assert_eq!(backend.state.check_bodies()[0].0, "03");
}

// ============================================================================
// Health and transport
// ============================================================================

/// Tests that health extras are kept.
#[tokio::test]
async fn test_health() {
    let backend = common::spawn_backend().await;
    let client = HttpBackend::new(&backend.url).expect("client");

    let health = client.health().await.expect("healthy");

    assert_eq!(health.status, "healthy");
    assert_eq!(health.service.as_deref(), Some("mock-lessons"));
    assert_eq!(health.extra.get("step"), Some(&json!(2)));
}

/// Tests that a refused connection is a transport error.
#[tokio::test]
async fn test_unreachable_backend() {
    let client = HttpBackend::new("http://127.0.0.1:9").expect("client");

    let error = client.health().await.unwrap_err();

    assert!(error.is_transport());
    assert!(matches!(error, OrchestratorError::Network { .. }));
}
