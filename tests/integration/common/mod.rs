//! Mock lesson backend and session helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lesson_orchestrator::{
    BufferEditor, CodeEditor, Config, FileStore, HostSeams, HttpBackend, InputCollector,
    PersistentStore, Session,
};
use serde_json::{json, Value};

/// Scripted responses and recorded requests of the mock server.
#[derive(Default)]
pub struct MockState {
    lessons: Mutex<HashMap<String, Value>>,
    runs: Mutex<VecDeque<Value>>,
    checks: Mutex<VecDeque<Value>>,
    run_bodies: Mutex<Vec<Value>>,
    check_bodies: Mutex<Vec<(String, Value)>>,
}

impl MockState {
    pub fn add_lesson(&self, lesson_id: &str, markdown: &str, starter_code: &str) {
        self.lessons.lock().expect("lock").insert(
            lesson_id.to_string(),
            json!({
                "lesson_id": lesson_id,
                "problem_statement": markdown,
                "starter_code": starter_code,
            }),
        );
    }

    pub fn push_run(&self, response: Value) {
        self.runs.lock().expect("lock").push_back(response);
    }

    pub fn push_check(&self, response: Value) {
        self.checks.lock().expect("lock").push_back(response);
    }

    pub fn run_bodies(&self) -> Vec<Value> {
        self.run_bodies.lock().expect("lock").clone()
    }

    pub fn check_bodies(&self) -> Vec<(String, Value)> {
        self.check_bodies.lock().expect("lock").clone()
    }
}

/// A running mock backend.
pub struct MockBackend {
    pub url: String,
    pub state: Arc<MockState>,
    _handle: tokio::task::JoinHandle<()>,
}

async fn lesson(State(state): State<Arc<MockState>>, UrlPath(id): UrlPath<String>) -> Response {
    match state.lessons.lock().expect("lock").get(&id) {
        Some(payload) => Json(payload.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Lesson {id} not found")})),
        )
            .into_response(),
    }
}

async fn run_code(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.run_bodies.lock().expect("lock").push(body);
    let response = state.runs.lock().expect("lock").pop_front();
    Json(response.unwrap_or_else(|| {
        json!({"status": "success", "output": "", "execution_time": "0.001s"})
    }))
}

async fn check(
    State(state): State<Arc<MockState>>,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.check_bodies.lock().expect("lock").push((id, body));
    let response = state.checks.lock().expect("lock").pop_front();
    Json(response.unwrap_or_else(|| {
        json!({"status": "success", "correct": false, "message": "Keep trying"})
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "mock-lessons", "step": 2}))
}

/// Starts a mock backend on an ephemeral port.
pub async fn spawn_backend() -> MockBackend {
    let state = Arc::new(MockState::default());
    let router = Router::new()
        .route("/lesson/:id", get(lesson))
        .route("/lesson/:id/check", post(check))
        .route("/api/run-code", post(run_code))
        .route("/health", get(health))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    MockBackend {
        url: format!("http://{addr}"),
        state,
        _handle: handle,
    }
}

/// Builds a session over the mock backend with progress stored in `state_dir`.
pub fn session(
    url: &str,
    state_dir: &Path,
    collector: Arc<dyn InputCollector>,
) -> (Session, Arc<BufferEditor>) {
    let config = Config {
        api_base_url: url.to_string(),
        state_dir: state_dir.display().to_string(),
        syntax_warning_delay_ms: 0,
        ..Config::default()
    };
    config.validate().expect("valid config");

    let editor = Arc::new(BufferEditor::default());
    let session = Session::new(
        config,
        HostSeams {
            backend: Arc::new(HttpBackend::new(url).expect("client")),
            store: PersistentStore::new(FileStore::new(state_dir)),
            editor: Arc::clone(&editor) as Arc<dyn CodeEditor>,
            collector,
        },
    );
    (session, editor)
}
