//! End-to-end tests for a lesson session.
//!
//! Each test stands up a mock lesson backend and drives a real session
//! (HTTP client, file-backed progress store) through it.

mod common;

use std::sync::Arc;

use lesson_orchestrator::events::drain;
use lesson_orchestrator::{
    detect_prompts, CheckOutcome, CodeEditor, FileStore, LessonId, LessonProgress, LessonStatus,
    NavigationOutcome, PersistentStore, PresetCollector, RunOutcome, UiEvent,
    PROGRESS_STORAGE_KEY,
};
use serde_json::json;

fn id(raw: &str) -> LessonId {
    LessonId::parse(raw).expect("valid lesson id")
}

fn stored_progress(dir: &std::path::Path) -> LessonProgress {
    PersistentStore::new(FileStore::new(dir))
        .load(PROGRESS_STORAGE_KEY)
        .expect("readable store")
        .expect("progress was saved")
}

// ============================================================================
// Input prompts (scenario A)
// ============================================================================

/// Tests that a single prompt is detected and its answer reaches the backend.
#[tokio::test]
async fn test_single_prompt_answer_is_sent() {
    let prompts = detect_prompts("input(\"Name: \")");
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].prompt_text, "Name: ");
    assert_eq!(prompts[0].source_line, 1);

    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "name = input(\"Name: \")\nprint(name)");
    backend.state.push_run(json!({
        "status": "success",
        "output": "Ada\n",
        "execution_time": "0.002s",
        "simulated_input": ["Ada"],
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::new(["Ada"])),
    );
    session.start().await;

    let RunOutcome::Success { rendered, .. } = session.orchestrator.run().await else {
        panic!("expected a successful run");
    };

    assert!(rendered.starts_with("Ada\n"));
    assert!(rendered.contains("Server time: 0.002s"));
    let bodies = backend.state.run_bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["action"], "run");
    assert_eq!(bodies[0]["user_inputs"], json!(["Ada"]));
}

// ============================================================================
// Restore (scenario B)
// ============================================================================

/// Tests that an unknown restored lesson is corrected to "01" and re-persisted.
#[tokio::test]
async fn test_unknown_restored_lesson_is_corrected() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print(1)");
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join(format!("{PROGRESS_STORAGE_KEY}.json")),
        r#"{"currentLesson":"99","completedLessons":[],"lessonStatuses":{}}"#,
    )
    .expect("seed progress");

    let (session, editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    let outcome = session.start().await;

    assert!(outcome.is_navigated());
    assert_eq!(editor.text(), "print(1)");
    assert_eq!(stored_progress(dir.path()).current_lesson, id("01"));
}

/// Tests that a partly unreadable save keeps its valid entries and is rewritten.
#[tokio::test]
async fn test_partly_unreadable_progress_is_repaired() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print(1)");
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join(format!("{PROGRESS_STORAGE_KEY}.json")),
        r#"{"currentLesson":"7","completedLessons":["01","02","2"],"lessonStatuses":{"01":"completed","02":"completed","03":"reviewed"}}"#,
    )
    .expect("seed progress");

    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;

    let stored = stored_progress(dir.path());
    assert_eq!(stored.current_lesson, id("01"));
    assert_eq!(stored.completed_lessons.len(), 2);
    assert_eq!(stored.status_of(&id("02")), LessonStatus::Completed);
    assert_eq!(stored.status_of(&id("03")), LessonStatus::NotStarted);
    assert_eq!(session.progress_summary().await.completed, 2);
}

/// Tests that progress written by one session is restored by the next.
#[tokio::test]
async fn test_progress_survives_restart() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print(1)");
    backend.state.add_lesson("02", "# Two", "print(2)");
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let (session, _editor) = common::session(
            &backend.url,
            dir.path(),
            Arc::new(PresetCollector::cancelling()),
        );
        session.start().await;
        assert!(session.navigation.go_next().await.is_navigated());
    }

    let (session, editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;

    assert_eq!(editor.text(), "print(2)");
    let progress = session.progress.lock().await.progress().clone();
    assert_eq!(progress.current_lesson, id("02"));
    assert_eq!(progress.status_of(&id("01")), LessonStatus::InProgress);
    assert_eq!(progress.status_of(&id("02")), LessonStatus::InProgress);
}

// ============================================================================
// Execution errors (scenario C)
// ============================================================================

/// Tests that a timeout is rendered with loop tips and leaves progress alone.
#[tokio::test]
async fn test_timeout_is_rendered_with_tips() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "while True:\n    pass\n");
    backend.state.push_run(json!({
        "status": "error",
        "error_type": "timeout_error",
        "message": "Code execution timed out",
        "timeout": 5,
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;
    let mut events = session.events.subscribe();

    let RunOutcome::ExecutionError(classified) = session.orchestrator.run().await else {
        panic!("expected an execution error");
    };

    assert!(classified.message.contains("5 seconds"));
    assert!(classified.message.contains("loop"));
    assert!(stored_progress(dir.path()).completed_lessons.is_empty());
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        UiEvent::Output(panel) if panel.text.contains("5 seconds")
    )));
}

/// Tests that an unreachable backend is reported as a transport failure.
#[tokio::test]
async fn test_unreachable_backend_is_transport_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (offline, editor) = common::session(
        "http://127.0.0.1:9",
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    offline.start().await;
    editor.set_text("print('hello')");

    let RunOutcome::TransportError { rendered } = offline.orchestrator.run().await else {
        panic!("expected a transport failure");
    };

    assert!(rendered.starts_with("Failed to execute code"));
    assert!(rendered.contains("Try again in a moment"));
    assert_eq!(offline.progress.lock().await.current_lesson(), &id("01"));
}

// ============================================================================
// Checking answers (scenario D)
// ============================================================================

/// Tests that a correct answer completes the lesson on disk.
#[tokio::test]
async fn test_correct_answer_completes_lesson() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print('hello')");
    backend.state.push_check(json!({
        "status": "success",
        "correct": true,
        "message": "Well done!",
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;

    let outcome = session.orchestrator.check().await;

    assert!(matches!(outcome, CheckOutcome::Correct { .. }));
    let stored = stored_progress(dir.path());
    assert_eq!(stored.status_of(&id("01")), LessonStatus::Completed);
    assert!(stored.completed_lessons.contains(&id("01")));
    assert_eq!(session.progress_summary().await.label(), "17% Complete (1/6 lessons)");

    let checks = backend.state.check_bodies();
    assert_eq!(checks[0].0, "01");
    assert_eq!(checks[0].1["code"], "print('hello')");
}

/// Tests that an incorrect answer renders hints and completes nothing.
#[tokio::test]
async fn test_incorrect_answer_shows_hints() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print('hello')");
    backend.state.push_check(json!({
        "status": "success",
        "correct": false,
        "message": "Close, but not quite.",
        "expected_output": "Hello, World!",
        "student_output": "hello",
        "hints": ["Check capitalisation", "Add the comma"],
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;

    let CheckOutcome::Incorrect { rendered } = session.orchestrator.check().await else {
        panic!("expected an incorrect answer");
    };

    assert!(rendered.contains("Hello, World!"));
    assert!(rendered.contains("1. Check capitalisation"));
    assert!(rendered.contains("2. Add the comma"));
    assert!(stored_progress(dir.path()).completed_lessons.is_empty());
}

// ============================================================================
// Cancellation (scenario E)
// ============================================================================

/// Tests that cancelling input collection never calls the backend.
#[tokio::test]
async fn test_cancelled_input_skips_backend() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "name = input(\"Name: \")");
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;
    let mut events = session.events.subscribe();

    assert_eq!(session.orchestrator.run().await, RunOutcome::Cancelled);

    assert!(backend.state.run_bodies().is_empty());
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        UiEvent::Output(panel) if panel.text.contains("cancelled")
    )));
}

// ============================================================================
// Navigation
// ============================================================================

/// Tests that a lesson missing on the backend never becomes current.
#[tokio::test]
async fn test_missing_lesson_is_never_committed() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print(1)");
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;

    let outcome = session.navigation.go_next().await;

    assert_eq!(outcome, NavigationOutcome::ComingSoon { requested: id("02") });
    assert_eq!(session.progress.lock().await.current_lesson(), &id("01"));
    assert_eq!(stored_progress(dir.path()).current_lesson, id("01"));
    assert!(editor.text().starts_with('#'));
}

/// Tests that resetting progress clears completions on disk.
#[tokio::test]
async fn test_reset_clears_completions() {
    let backend = common::spawn_backend().await;
    backend.state.add_lesson("01", "# One", "print(1)");
    backend.state.push_check(json!({"status": "success", "correct": true, "message": "Yes"}));
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _editor) = common::session(
        &backend.url,
        dir.path(),
        Arc::new(PresetCollector::cancelling()),
    );
    session.start().await;
    session.orchestrator.check().await;

    session.reset_progress().await;

    let stored = stored_progress(dir.path());
    assert!(stored.completed_lessons.is_empty());
    assert_eq!(stored.current_lesson, id("01"));
    assert_eq!(session.progress_summary().await.completed, 0);
}
