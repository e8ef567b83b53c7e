//! Run and check orchestration.
//!
//! A run moves through
//! `Idle → Validating → (CollectingInput) → Dispatching → Classifying → Idle`;
//! a check moves through `Idle → Submitting → Reporting → Idle`. Each action
//! is single-flight: a second request while one is in flight is rejected
//! with [`RunOutcome::Busy`] / [`CheckOutcome::Busy`] instead of queueing.
//!
//! Nothing here returns transport or execution failures as `Err`. Every
//! failure is rendered to the UI and reported as an outcome.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{
    CheckRequest, CheckResponse, ExecutionResponse, ExecutionStatus, LessonBackend, RunRequest,
};
use crate::classify::{classify, format_client_time, transport_failure_message, ClassifiedError};
use crate::editor::CodeEditor;
use crate::events::{EventBroadcaster, StatusLevel, UiEvent};
use crate::input::{detect_prompts, Collection, InputCollector, InputPrompt};
use crate::lesson::LessonLoader;
use crate::progress::{LessonStatus, ProgressTracker};
use crate::syntax::check_syntax;
use crate::visualize::ClassGraph;

/// Width of the rule framing the run summary.
const RULE_WIDTH: usize = 50;

/// Output shown when the editor is empty.
pub const EMPTY_CODE_MESSAGE: &str =
    "Error: No code to execute.\n\nPlease enter some Python code in the editor.";

/// Output shown when the learner cancels input collection.
pub const CANCELLED_MESSAGE: &str = "Execution cancelled: no input was provided.";

// ============================================================================
// Phases and outcomes
// ============================================================================

/// Phase of the run state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run in flight.
    #[default]
    Idle,
    /// Reading and checking the source.
    Validating,
    /// Waiting for the learner's input values.
    CollectingInput,
    /// Waiting for the execution backend.
    Dispatching,
    /// Rendering the backend result.
    Classifying,
}

/// Phase of the check state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    /// No check in flight.
    #[default]
    Idle,
    /// Waiting for the check backend.
    Submitting,
    /// Rendering feedback.
    Reporting,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The program ran to completion.
    Success {
        /// Text rendered to the output panel.
        rendered: String,
        /// Client-measured round trip.
        elapsed: Duration,
        /// Input values fed to the program.
        inputs: Vec<String>,
    },
    /// The backend reported an application-level error.
    ExecutionError(ClassifiedError),
    /// The request never produced a structured payload.
    TransportError {
        /// Text rendered to the output panel.
        rendered: String,
    },
    /// The editor was empty; nothing was sent.
    EmptyCode,
    /// The editor's source could not be read; nothing was sent.
    Unreadable {
        /// Text rendered to the output panel.
        rendered: String,
    },
    /// The learner cancelled input collection; nothing was sent.
    Cancelled,
    /// Re-run requested without a previous interactive run.
    NothingToRerun,
    /// A run is already in flight.
    Busy,
}

impl RunOutcome {
    /// Whether the program ran to completion.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// How an answer check ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The answer is correct; the lesson is now completed.
    Correct {
        /// Text rendered to the feedback panel.
        rendered: String,
    },
    /// The answer is not correct yet.
    Incorrect {
        /// Text rendered to the feedback panel.
        rendered: String,
    },
    /// No lesson has been loaded.
    NoLesson,
    /// The editor's source could not be read; nothing was sent.
    Unreadable {
        /// Text rendered to the feedback panel.
        rendered: String,
    },
    /// The request never produced a structured payload.
    TransportError {
        /// Text rendered to the feedback panel.
        rendered: String,
    },
    /// A check is already in flight.
    Busy,
}

// ============================================================================
// Single-flight guard
// ============================================================================

/// Holds the in-flight flag for one action and resets its phase on drop.
struct InFlight<'a, P: Copy + Default> {
    flag: &'a AtomicBool,
    phase: &'a StdMutex<P>,
}

impl<'a, P: Copy + Default> InFlight<'a, P> {
    fn acquire(flag: &'a AtomicBool, phase: &'a StdMutex<P>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, phase })
    }

    fn enter(&self, next: P) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl<P: Copy + Default> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        self.enter(P::default());
        self.flag.store(false, Ordering::Release);
    }
}

/// Source and prompts of the last run that consumed input.
#[derive(Debug, Clone)]
struct InteractiveRun {
    code: String,
    prompts: Vec<InputPrompt>,
}

// ============================================================================
// ExecutionOrchestrator
// ============================================================================

/// Drives runs and answer checks.
pub struct ExecutionOrchestrator {
    backend: Arc<dyn LessonBackend>,
    editor: Arc<dyn CodeEditor>,
    collector: Arc<dyn InputCollector>,
    progress: Arc<Mutex<ProgressTracker>>,
    loader: Arc<LessonLoader>,
    events: EventBroadcaster,
    syntax_warning_delay: Duration,
    run_in_flight: AtomicBool,
    run_phase: StdMutex<RunPhase>,
    check_in_flight: AtomicBool,
    check_phase: StdMutex<CheckPhase>,
    last_interactive: Mutex<Option<InteractiveRun>>,
}

impl std::fmt::Debug for ExecutionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOrchestrator")
            .field("run_phase", &self.run_phase())
            .field("check_phase", &self.check_phase())
            .finish_non_exhaustive()
    }
}

impl ExecutionOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        backend: Arc<dyn LessonBackend>,
        editor: Arc<dyn CodeEditor>,
        collector: Arc<dyn InputCollector>,
        progress: Arc<Mutex<ProgressTracker>>,
        loader: Arc<LessonLoader>,
        events: EventBroadcaster,
        syntax_warning_delay: Duration,
    ) -> Self {
        Self {
            backend,
            editor,
            collector,
            progress,
            loader,
            events,
            syntax_warning_delay,
            run_in_flight: AtomicBool::new(false),
            run_phase: StdMutex::new(RunPhase::Idle),
            check_in_flight: AtomicBool::new(false),
            check_phase: StdMutex::new(CheckPhase::Idle),
            last_interactive: Mutex::new(None),
        }
    }

    /// Current run phase.
    #[must_use]
    pub fn run_phase(&self) -> RunPhase {
        *self.run_phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current check phase.
    #[must_use]
    pub fn check_phase(&self) -> CheckPhase {
        *self.check_phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the last successful run consumed input and can be re-run.
    pub async fn can_rerun(&self) -> bool {
        self.last_interactive.lock().await.is_some()
    }

    // ------------------------------------------------------------------------
    // Run flow
    // ------------------------------------------------------------------------

    /// Runs the editor's source.
    pub async fn run(&self) -> RunOutcome {
        let Some(flight) = InFlight::acquire(&self.run_in_flight, &self.run_phase) else {
            debug!("Run requested while another run is in flight");
            return RunOutcome::Busy;
        };

        self.events
            .send(UiEvent::status("Running...", StatusLevel::Running));
        flight.enter(RunPhase::Validating);

        let code = match self.editor.read() {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "Failed to read code for run");
                let rendered = e.to_string();
                self.events.send(UiEvent::output(rendered.as_str()));
                self.events
                    .send(UiEvent::status("Could not read code", StatusLevel::Error));
                return RunOutcome::Unreadable { rendered };
            }
        };
        if code.trim().is_empty() {
            self.events.send(UiEvent::output(EMPTY_CODE_MESSAGE));
            self.events
                .send(UiEvent::status("No code provided", StatusLevel::Error));
            return RunOutcome::EmptyCode;
        }

        self.advise_syntax(&code).await;

        let prompts = detect_prompts(&code);
        let inputs = if prompts.is_empty() {
            Vec::new()
        } else {
            flight.enter(RunPhase::CollectingInput);
            match self.collect(&prompts).await {
                Some(values) => values,
                None => return self.cancelled(),
            }
        };

        self.dispatch(&flight, code, prompts, inputs).await
    }

    /// Re-runs the last interactive program with freshly collected input.
    ///
    /// The retained source is used, not the editor's current text.
    pub async fn rerun_with_new_inputs(&self) -> RunOutcome {
        let Some(flight) = InFlight::acquire(&self.run_in_flight, &self.run_phase) else {
            return RunOutcome::Busy;
        };

        let Some(previous) = self.last_interactive.lock().await.clone() else {
            self.events.send(UiEvent::output(
                "Nothing to re-run yet. Run a program that asks for input first.",
            ));
            return RunOutcome::NothingToRerun;
        };

        self.events
            .send(UiEvent::status("Running...", StatusLevel::Running));
        flight.enter(RunPhase::CollectingInput);
        let Some(inputs) = self.collect(&previous.prompts).await else {
            return self.cancelled();
        };

        self.dispatch(&flight, previous.code, previous.prompts, inputs)
            .await
    }

    async fn advise_syntax(&self, code: &str) {
        let warnings = check_syntax(code);
        if warnings.is_empty() {
            return;
        }

        debug!(count = warnings.len(), "Syntax heuristic reported warnings");
        let mut text = String::from("Warning: Code may have syntax issues.\n");
        for warning in &warnings {
            let _ = writeln!(text, "  {warning}");
        }
        text.push_str("Executing anyway...\n");
        self.events.send(UiEvent::output(text));

        if !self.syntax_warning_delay.is_zero() {
            tokio::time::sleep(self.syntax_warning_delay).await;
        }
    }

    async fn collect(&self, prompts: &[InputPrompt]) -> Option<Vec<String>> {
        debug!(prompts = prompts.len(), "Collecting input");
        match self.collector.collect(prompts).await.fit_to(prompts.len()) {
            Collection::Submitted(values) => Some(values),
            Collection::Cancelled => None,
        }
    }

    fn cancelled(&self) -> RunOutcome {
        info!("Run cancelled during input collection");
        self.events.send(UiEvent::output(CANCELLED_MESSAGE));
        self.events
            .send(UiEvent::status("Cancelled", StatusLevel::Info));
        RunOutcome::Cancelled
    }

    async fn dispatch(
        &self,
        flight: &InFlight<'_, RunPhase>,
        code: String,
        prompts: Vec<InputPrompt>,
        inputs: Vec<String>,
    ) -> RunOutcome {
        flight.enter(RunPhase::Dispatching);
        self.events.send(UiEvent::output(
            "Code sent to backend...\nExecuting Python code...\n",
        ));

        let request = RunRequest::new(code.as_str(), inputs.clone());
        info!(
            code_lines = line_count(&code),
            inputs = inputs.len(),
            "Dispatching run"
        );

        let started = Instant::now();
        let result = self.backend.run_code(&request).await;
        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, elapsed_ms, "Run request failed");
                let rendered = transport_failure_message("execute code", &e, elapsed);
                self.events.send(UiEvent::output(rendered.as_str()));
                self.events
                    .send(UiEvent::status("Execution failed", StatusLevel::Error));
                self.events.send(UiEvent::run_finished(false, elapsed_ms));
                return RunOutcome::TransportError { rendered };
            }
        };

        flight.enter(RunPhase::Classifying);
        let success = response.status == ExecutionStatus::Success;
        self.events.send(UiEvent::run_finished(success, elapsed_ms));

        if !success {
            let classified = classify(&response, elapsed);
            info!(kind = %classified.kind, elapsed_ms, "Run finished with an error");
            self.events.send(UiEvent::output(classified.message.as_str()));
            self.events
                .send(UiEvent::status("Execution error", StatusLevel::Error));
            self.remember_interactive(None).await;
            return RunOutcome::ExecutionError(classified);
        }

        info!(elapsed_ms, "Run finished successfully");
        let rendered = render_success(&code, &response, elapsed);
        self.events.send(UiEvent::output(rendered.as_str()));
        self.events
            .send(UiEvent::status("Execution successful", StatusLevel::Success));

        if let Some(lesson_id) = self.loader.current_lesson_id().await {
            if self.loader.is_interactive(&lesson_id) {
                self.events
                    .send(UiEvent::ClassDiagram(ClassGraph::parse(&code)));
            }
        }

        let retained = (!inputs.is_empty()).then(|| InteractiveRun {
            code: code.clone(),
            prompts,
        });
        self.remember_interactive(retained).await;

        RunOutcome::Success {
            rendered,
            elapsed,
            inputs,
        }
    }

    async fn remember_interactive(&self, run: Option<InteractiveRun>) {
        self.events.send(UiEvent::RerunAvailable(run.is_some()));
        *self.last_interactive.lock().await = run;
    }

    // ------------------------------------------------------------------------
    // Check flow
    // ------------------------------------------------------------------------

    /// Submits the editor's source as the answer to the current lesson.
    pub async fn check(&self) -> CheckOutcome {
        let Some(flight) = InFlight::acquire(&self.check_in_flight, &self.check_phase) else {
            debug!("Check requested while another check is in flight");
            return CheckOutcome::Busy;
        };

        let Some(lesson_id) = self.loader.current_lesson_id().await else {
            self.events
                .send(UiEvent::feedback("Open a lesson before checking your answer."));
            self.events
                .send(UiEvent::status("No lesson loaded", StatusLevel::Error));
            return CheckOutcome::NoLesson;
        };

        let code = match self.editor.read() {
            Ok(code) => code,
            Err(e) => {
                warn!(lesson_id = %lesson_id, error = %e, "Failed to read code for check");
                let rendered = e.to_string();
                self.events.send(UiEvent::feedback(rendered.as_str()));
                self.events
                    .send(UiEvent::status("Could not read code", StatusLevel::Error));
                return CheckOutcome::Unreadable { rendered };
            }
        };

        flight.enter(CheckPhase::Submitting);
        self.events
            .send(UiEvent::status("Checking answer...", StatusLevel::Running));

        let request = CheckRequest { code };
        let started = Instant::now();
        let response = match self.backend.check_answer(&lesson_id, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(lesson_id = %lesson_id, error = %e, "Check request failed");
                let rendered =
                    transport_failure_message("check your answer", &e, started.elapsed());
                self.events.send(UiEvent::feedback(rendered.as_str()));
                self.events
                    .send(UiEvent::status("Check failed", StatusLevel::Error));
                return CheckOutcome::TransportError { rendered };
            }
        };

        flight.enter(CheckPhase::Reporting);
        info!(lesson_id = %lesson_id, correct = response.correct, "Answer checked");

        if response.correct {
            self.progress
                .lock()
                .await
                .update_status(&lesson_id, LessonStatus::Completed);
        }

        let rendered = render_feedback(&response);
        self.events.send(UiEvent::feedback(rendered.as_str()));

        if response.correct {
            self.events.send(UiEvent::status(
                format!("Lesson {lesson_id} completed"),
                StatusLevel::Success,
            ));
            CheckOutcome::Correct { rendered }
        } else {
            self.events
                .send(UiEvent::status("Not quite yet", StatusLevel::Info));
            CheckOutcome::Incorrect { rendered }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn line_count(code: &str) -> usize {
    code.split('\n').count()
}

/// Output panel text for a successful run.
#[must_use]
pub fn render_success(code: &str, response: &ExecutionResponse, elapsed: Duration) -> String {
    let output = response
        .output
        .as_deref()
        .filter(|o| !o.is_empty())
        .unwrap_or("(no output)");
    let rule = "=".repeat(RULE_WIDTH);

    let mut out = format!("{output}\n\n{rule}\n");
    out.push_str("Execution completed successfully!\n");
    let _ = writeln!(out, "Server time: {}", response.execution_time_text());
    let _ = writeln!(out, "Client time: {}", format_client_time(elapsed));
    let _ = writeln!(out, "Code lines: {}", line_count(code));
    if let Some(simulated) = &response.simulated_input {
        let simulated = simulated
            .as_str()
            .map_or_else(|| simulated.to_string(), str::to_string);
        let _ = writeln!(out, "Simulated input: {simulated}");
    }
    out.push_str(&rule);
    out
}

/// Feedback panel text for a check verdict.
#[must_use]
pub fn render_feedback(response: &CheckResponse) -> String {
    let mut out = String::from(if response.correct {
        "Correct!\n"
    } else {
        "Not quite right yet.\n"
    });

    if !response.message.trim().is_empty() {
        let _ = write!(out, "\n{}\n", response.message.trim_end());
    }
    if let Some(explanation) = response.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        let _ = write!(out, "\nExplanation:\n{}\n", explanation.trim_end());
    }
    if let Some(expected) = &response.expected_output {
        let _ = write!(out, "\nExpected output:\n{}\n", expected.trim_end());
    }
    if let Some(actual) = &response.student_output {
        let _ = write!(out, "\nYour output:\n{}\n", actual.trim_end());
    }
    if !response.hints.is_empty() {
        out.push_str("\nHints:\n");
        for (index, hint) in response.hints.iter().enumerate() {
            let _ = writeln!(out, "{}. {hint}", index + 1);
        }
    }

    out.trim_end().to_string()
}
