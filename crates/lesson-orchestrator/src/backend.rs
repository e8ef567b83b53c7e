//! Lesson, execution and check backend.
//!
//! The backend is a black box reached over HTTP:
//!
//! - `GET  /lesson/{id}`       → lesson content, or 404
//! - `POST /lesson/{id}/check` → verdict and feedback for submitted code
//! - `POST /api/run-code`      → execution result
//! - `GET  /health`            → service status
//!
//! [`LessonBackend`] is the seam the orchestrator depends on;
//! [`HttpBackend`] is the `reqwest` implementation.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::lesson_id::LessonId;

// ============================================================================
// Execution RPC
// ============================================================================

/// Body of `POST /api/run-code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Source to execute.
    pub code: String,
    /// Always `"run"`.
    pub action: String,
    /// Values fed to the program's input calls, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_inputs: Option<Vec<String>>,
}

impl RunRequest {
    /// Creates a run request. An empty input list is sent as no inputs.
    #[must_use]
    pub fn new(code: impl Into<String>, user_inputs: Vec<String>) -> Self {
        Self {
            code: code.into(),
            action: "run".to_string(),
            user_inputs: (!user_inputs.is_empty()).then_some(user_inputs),
        }
    }
}

/// Application-level outcome of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The program ran to completion.
    Success,
    /// Anything else is treated as an error.
    #[serde(other)]
    Error,
}

/// Server-reported execution time; the backend sends either text or seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionTime {
    /// Seconds as a number.
    Seconds(f64),
    /// Preformatted text, e.g. `"0.012s"`.
    Text(String),
}

impl fmt::Display for ExecutionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(secs) => write!(f, "{secs:.3}s"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Response of `POST /api/run-code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    /// Success or error.
    pub status: ExecutionStatus,
    /// Standard output captured before completion or failure.
    #[serde(default)]
    pub output: Option<String>,
    /// Server-measured execution time.
    #[serde(default)]
    pub execution_time: Option<ExecutionTime>,
    /// Wire name of the error category when `status` is error.
    #[serde(default)]
    pub error_type: Option<String>,
    /// Backend message.
    #[serde(default)]
    pub message: Option<String>,
    /// Captured stderr / traceback.
    #[serde(default)]
    pub error_output: Option<String>,
    /// Execution time limit in seconds, for timeouts.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Learner-oriented explanation supplied by the backend.
    #[serde(default)]
    pub friendly_message: Option<String>,
    /// Suggested fix supplied by the backend.
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Line the error was attributed to.
    #[serde(default)]
    pub error_line: Option<u64>,
    /// Free-form extra detail.
    #[serde(default)]
    pub error_details: Option<serde_json::Value>,
    /// Inputs the backend fed to the program.
    #[serde(default)]
    pub simulated_input: Option<serde_json::Value>,
}

impl ExecutionResponse {
    /// A successful response with the given output.
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: Some(output.into()),
            ..Self::error("")
        }
    }

    /// An error response of the given wire type, all optional fields empty.
    #[must_use]
    pub fn error(error_type: impl Into<String>) -> Self {
        let error_type = error_type.into();
        Self {
            status: ExecutionStatus::Error,
            output: None,
            execution_time: None,
            error_type: (!error_type.is_empty()).then_some(error_type),
            message: None,
            error_output: None,
            timeout: None,
            friendly_message: None,
            suggestion: None,
            error_line: None,
            error_details: None,
            simulated_input: None,
        }
    }

    /// Server time as display text.
    #[must_use]
    pub fn execution_time_text(&self) -> String {
        self.execution_time
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string)
    }
}

// ============================================================================
// Check RPC
// ============================================================================

/// Body of `POST /lesson/{id}/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Source to grade.
    pub code: String,
}

/// Response of `POST /lesson/{id}/check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Application status of the check itself.
    #[serde(default)]
    pub status: String,
    /// Whether the answer is correct.
    #[serde(default)]
    pub correct: bool,
    /// Headline message.
    #[serde(default)]
    pub message: String,
    /// Longer explanation.
    #[serde(default)]
    pub feedback: Option<String>,
    /// What the learner's program printed.
    #[serde(default)]
    pub student_output: Option<String>,
    /// What the lesson expects.
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Ordered hints.
    #[serde(default)]
    pub hints: Vec<String>,
}

// ============================================================================
// Lesson RPC
// ============================================================================

/// Response of `GET /lesson/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonPayload {
    /// Id echoed by the backend.
    #[serde(default)]
    pub lesson_id: Option<String>,
    /// Optional display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Markdown problem statement.
    #[serde(default)]
    pub problem_statement: String,
    /// Initial editor content.
    #[serde(default)]
    pub starter_code: String,
    /// Set to `"error"` when the backend failed to produce the lesson.
    #[serde(default)]
    pub status: Option<String>,
    /// Backend message accompanying an error status.
    #[serde(default)]
    pub message: Option<String>,
}

impl LessonPayload {
    /// Whether the payload carries an error marker instead of content.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Reported status, e.g. `"healthy"`.
    pub status: String,
    /// Service name.
    #[serde(default)]
    pub service: Option<String>,
    /// Anything else the backend reports.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// LessonBackend
// ============================================================================

/// Remote lesson, execution and check service.
#[async_trait]
pub trait LessonBackend: Send + Sync {
    /// Fetches lesson content. A missing lesson is `LessonNotFound`.
    async fn fetch_lesson(&self, lesson_id: &LessonId) -> Result<LessonPayload>;

    /// Executes code. Non-2xx responses are transport errors.
    async fn run_code(&self, request: &RunRequest) -> Result<ExecutionResponse>;

    /// Grades code against a lesson.
    async fn check_answer(&self, lesson_id: &LessonId, request: &CheckRequest)
        -> Result<CheckResponse>;

    /// Reports backend health.
    async fn health(&self) -> Result<HealthStatus>;
}

/// [`LessonBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a client for the backend at `base_url`.
    ///
    /// No client-side timeout is set: execution limits are enforced and
    /// reported by the backend.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .user_agent(concat!("lesson-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OrchestratorError::network(&base_url, e))?;
        Ok(Self { client, base_url })
    }

    /// The backend base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestratorError::http_status(url, status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| OrchestratorError::decode(url, e))
    }
}

#[async_trait]
impl LessonBackend for HttpBackend {
    async fn fetch_lesson(&self, lesson_id: &LessonId) -> Result<LessonPayload> {
        let url = self.url(&format!("/lesson/{lesson_id}"));
        debug!(url = %url, "Fetching lesson");
        match self.send(&url, self.client.get(&url)).await {
            Err(OrchestratorError::HttpStatus { status: 404, .. }) => {
                Err(OrchestratorError::lesson_not_found(lesson_id))
            }
            other => other,
        }
    }

    async fn run_code(&self, request: &RunRequest) -> Result<ExecutionResponse> {
        let url = self.url("/api/run-code");
        debug!(
            url = %url,
            code_bytes = request.code.len(),
            inputs = request.user_inputs.as_ref().map_or(0, Vec::len),
            "Dispatching run request"
        );
        self.send(&url, self.client.post(&url).json(request)).await
    }

    async fn check_answer(
        &self,
        lesson_id: &LessonId,
        request: &CheckRequest,
    ) -> Result<CheckResponse> {
        let url = self.url(&format!("/lesson/{lesson_id}/check"));
        debug!(url = %url, "Submitting answer");
        self.send(&url, self.client.post(&url).json(request)).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        let url = self.url("/health");
        let health: HealthStatus = self.send(&url, self.client.get(&url)).await?;
        info!(status = %health.status, "Backend health checked");
        Ok(health)
    }
}
