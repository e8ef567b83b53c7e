//! Test doubles shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend::{
    CheckRequest, CheckResponse, ExecutionResponse, HealthStatus, LessonBackend, LessonPayload,
    RunRequest,
};
use crate::config::Config;
use crate::editor::BufferEditor;
use crate::error::{OrchestratorError, Result};
use crate::input::{Collection, InputCollector, InputPrompt};
use crate::lesson_id::LessonId;
use crate::session::{HostSeams, Session};
use crate::store::{MemoryStore, PersistentStore};

/// Parses a lesson id known to be valid.
pub fn id(raw: &str) -> LessonId {
    LessonId::parse(raw).unwrap()
}

// ============================================================================
// FakeBackend
// ============================================================================

#[derive(Default)]
struct Recorded {
    runs: VecDeque<Result<ExecutionResponse>>,
    checks: VecDeque<Result<CheckResponse>>,
    run_requests: Vec<RunRequest>,
    check_calls: Vec<(LessonId, CheckRequest)>,
    lesson_requests: Vec<LessonId>,
    gate: Option<Arc<Notify>>,
}

/// Scripted backend. Unscripted runs succeed with no output and unscripted
/// checks return the default (incorrect) response.
#[derive(Default)]
pub struct FakeBackend {
    lessons: HashMap<LessonId, LessonPayload>,
    lesson_failure: Option<u16>,
    recorded: Mutex<Recorded>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lesson(mut self, lesson_id: &str, markdown: &str, starter_code: &str) -> Self {
        self.lessons.insert(
            id(lesson_id),
            LessonPayload {
                lesson_id: Some(lesson_id.to_string()),
                problem_statement: markdown.to_string(),
                starter_code: starter_code.to_string(),
                ..LessonPayload::default()
            },
        );
        self
    }

    pub fn with_error_lesson(mut self, lesson_id: &str, message: &str) -> Self {
        self.lessons.insert(
            id(lesson_id),
            LessonPayload {
                status: Some("error".to_string()),
                message: Some(message.to_string()),
                ..LessonPayload::default()
            },
        );
        self
    }

    /// Every lesson fetch answers with HTTP `status`.
    pub fn failing_lessons(mut self, status: u16) -> Self {
        self.lesson_failure = Some(status);
        self
    }

    pub fn push_run(&self, response: Result<ExecutionResponse>) {
        self.recorded().runs.push_back(response);
    }

    pub fn push_check(&self, response: Result<CheckResponse>) {
        self.recorded().checks.push_back(response);
    }

    /// Holds every later run until the returned `Notify` fires.
    pub fn gate_runs(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.recorded().gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn run_requests(&self) -> Vec<RunRequest> {
        self.recorded().run_requests.clone()
    }

    pub fn check_calls(&self) -> Vec<(LessonId, CheckRequest)> {
        self.recorded().check_calls.clone()
    }

    pub fn lesson_requests(&self) -> Vec<LessonId> {
        self.recorded().lesson_requests.clone()
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

#[async_trait]
impl LessonBackend for FakeBackend {
    async fn fetch_lesson(&self, lesson_id: &LessonId) -> Result<LessonPayload> {
        self.recorded().lesson_requests.push(lesson_id.clone());
        if let Some(status) = self.lesson_failure {
            return Err(OrchestratorError::http_status(
                format!("http://fake/api/lesson/{lesson_id}"),
                status,
            ));
        }
        self.lessons
            .get(lesson_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::lesson_not_found(lesson_id))
    }

    async fn run_code(&self, request: &RunRequest) -> Result<ExecutionResponse> {
        let gate = {
            let mut recorded = self.recorded();
            recorded.run_requests.push(request.clone());
            recorded.gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.recorded()
            .runs
            .pop_front()
            .unwrap_or_else(|| Ok(ExecutionResponse::success("")))
    }

    async fn check_answer(
        &self,
        lesson_id: &LessonId,
        request: &CheckRequest,
    ) -> Result<CheckResponse> {
        let mut recorded = self.recorded();
        recorded
            .check_calls
            .push((lesson_id.clone(), request.clone()));
        recorded
            .checks
            .pop_front()
            .unwrap_or_else(|| Ok(CheckResponse::default()))
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            service: Some("fake".to_string()),
            extra: serde_json::Map::new(),
        })
    }
}

// ============================================================================
// ScriptedCollector
// ============================================================================

/// Answers prompt sets from a queue; an empty queue cancels.
#[derive(Default)]
pub struct ScriptedCollector {
    answers: Mutex<VecDeque<Collection>>,
    asked: Mutex<Vec<Vec<InputPrompt>>>,
}

impl ScriptedCollector {
    pub fn push(&self, collection: Collection) {
        self.answers.lock().unwrap().push_back(collection);
    }

    pub fn asked(&self) -> Vec<Vec<InputPrompt>> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl InputCollector for ScriptedCollector {
    async fn collect(&self, prompts: &[InputPrompt]) -> Collection {
        self.asked.lock().unwrap().push(prompts.to_vec());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Collection::Cancelled)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A session over fakes, with handles to each fake.
pub struct Harness {
    pub session: Session,
    pub backend: Arc<FakeBackend>,
    pub editor: Arc<BufferEditor>,
    pub collector: Arc<ScriptedCollector>,
    pub memory: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let editor = Arc::new(BufferEditor::default());
        let collector = Arc::new(ScriptedCollector::default());
        let memory = Arc::new(MemoryStore::new());

        let config = Config {
            syntax_warning_delay_ms: 0,
            ..Config::default()
        };
        let session = Session::new(
            config,
            HostSeams {
                backend: Arc::clone(&backend) as Arc<dyn LessonBackend>,
                store: PersistentStore::new(Arc::clone(&memory)),
                editor: Arc::clone(&editor) as Arc<dyn crate::editor::CodeEditor>,
                collector: Arc::clone(&collector) as Arc<dyn InputCollector>,
            },
        );

        Self {
            session,
            backend,
            editor,
            collector,
            memory,
        }
    }
}

impl Deref for Harness {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}
