//! Lesson loading.
//!
//! [`LessonLoader::load`] fetches lesson content, renders it (problem panel,
//! editor, canvas toggle), and tells the progress tracker the lesson has
//! started. The first lesson has built-in fallback content so the runner is
//! usable without a lesson service.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::LessonBackend;
use crate::editor::CodeEditor;
use crate::error::OrchestratorError;
use crate::events::{EventBroadcaster, StatusLevel, UiEvent};
use crate::lesson_id::LessonId;
use crate::progress::ProgressTracker;

/// Problem statement used when the first lesson is missing from the backend.
pub const FALLBACK_PROBLEM_STATEMENT: &str = "\
# Lesson 01: The First Room

Welcome! Your mission is to write a tiny text game that refuses to let the
player leave.

## Your task

1. Print a welcome message.
2. Ask the player what they want to do with `input()`.
3. If they type `quit`, print a message explaining that quitting is
   temporarily disabled.
4. Otherwise, congratulate them for staying.

Press **Run** to try your program and **Check** when you think it is done.";

/// Starter code used when the first lesson is missing from the backend.
pub const FALLBACK_STARTER_CODE: &str = "\
# Lesson 01: The First Room
print(\"Welcome to TRY NOT TO QUIT!\")
print(\"Your mission: find a way to exit this program.\")

choice = input(\"What do you want to do? \")

# Your turn: handle the 'quit' choice
print(\"You chose:\", choice)
";

// ============================================================================
// LessonContent
// ============================================================================

/// Where lesson content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Served by the lesson backend.
    Remote,
    /// Built-in content for the first lesson.
    Fallback,
    /// Placeholder explaining a load failure.
    Error,
}

/// Content of one lesson, as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    /// The lesson.
    pub lesson_id: LessonId,
    /// Title line.
    pub title: String,
    /// Markdown problem statement.
    pub problem_statement: String,
    /// Initial editor content.
    pub starter_code: String,
    /// Origin of the content.
    pub source_kind: SourceKind,
}

impl LessonContent {
    /// Built-in content for the first lesson.
    #[must_use]
    pub fn fallback(lesson_id: LessonId) -> Self {
        Self {
            title: format!("Lesson {lesson_id}: The First Room"),
            lesson_id,
            problem_statement: FALLBACK_PROBLEM_STATEMENT.to_string(),
            starter_code: FALLBACK_STARTER_CODE.to_string(),
            source_kind: SourceKind::Fallback,
        }
    }

    /// Placeholder content explaining why a lesson failed to load.
    #[must_use]
    pub fn error(lesson_id: LessonId, error: &OrchestratorError) -> Self {
        let reason = error.summary();
        Self {
            title: format!("Lesson {lesson_id}: Unavailable"),
            problem_statement: format!(
                "# Error Loading Lesson\n\nLesson {lesson_id} could not be loaded.\n\n\
                 **Reason:** {reason}\n\nPlease refresh and try again."
            ),
            starter_code: format!(
                "# Lesson {lesson_id} failed to load\nprint(\"Please refresh to try loading the lesson again.\")\n"
            ),
            lesson_id,
            source_kind: SourceKind::Error,
        }
    }
}

/// A failed load: the error plus the placeholder content that was rendered.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct LoadFailure {
    /// What went wrong.
    #[source]
    pub error: OrchestratorError,
    /// The rendered placeholder.
    pub content: LessonContent,
}

// ============================================================================
// LessonLoader
// ============================================================================

/// Fetches and renders lessons.
pub struct LessonLoader {
    backend: Arc<dyn LessonBackend>,
    progress: Arc<Mutex<ProgressTracker>>,
    editor: Arc<dyn CodeEditor>,
    events: EventBroadcaster,
    interactive_lessons: Vec<LessonId>,
    current: Mutex<Option<LessonContent>>,
}

impl std::fmt::Debug for LessonLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonLoader")
            .field("interactive_lessons", &self.interactive_lessons)
            .finish_non_exhaustive()
    }
}

impl LessonLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(
        backend: Arc<dyn LessonBackend>,
        progress: Arc<Mutex<ProgressTracker>>,
        editor: Arc<dyn CodeEditor>,
        events: EventBroadcaster,
        interactive_lessons: Vec<LessonId>,
    ) -> Self {
        Self {
            backend,
            progress,
            editor,
            events,
            interactive_lessons,
            current: Mutex::new(None),
        }
    }

    /// Whether `lesson_id` shows the interactive canvas.
    #[must_use]
    pub fn is_interactive(&self, lesson_id: &LessonId) -> bool {
        self.interactive_lessons.contains(lesson_id)
    }

    /// The last successfully loaded (or fallback) lesson.
    pub async fn current(&self) -> Option<LessonContent> {
        self.current.lock().await.clone()
    }

    /// Id of the last successfully loaded (or fallback) lesson.
    pub async fn current_lesson_id(&self) -> Option<LessonId> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|content| content.lesson_id.clone())
    }

    /// Loads and renders a lesson.
    ///
    /// On success the content becomes current and the lesson is marked as
    /// started. A missing first lesson is replaced by built-in content.
    ///
    /// # Errors
    ///
    /// Any other failure renders placeholder content and returns it inside a
    /// [`LoadFailure`]; the current lesson is left unchanged.
    pub async fn load(&self, lesson_id: &LessonId) -> Result<LessonContent, LoadFailure> {
        self.events
            .send(UiEvent::status("Loading lesson...", StatusLevel::Info));

        let fetched = match self.backend.fetch_lesson(lesson_id).await {
            Ok(payload) if payload.is_error() => Err(OrchestratorError::lesson_load_failed(
                lesson_id,
                payload
                    .message
                    .unwrap_or_else(|| "the lesson service reported an error".to_string()),
            )),
            Ok(payload) => Ok(LessonContent {
                lesson_id: lesson_id.clone(),
                title: payload
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("Lesson {lesson_id}")),
                problem_statement: payload.problem_statement,
                starter_code: payload.starter_code,
                source_kind: SourceKind::Remote,
            }),
            Err(OrchestratorError::LessonNotFound { .. }) if *lesson_id == LessonId::first() => {
                warn!(lesson_id = %lesson_id, "First lesson missing from backend; using built-in content");
                Ok(LessonContent::fallback(lesson_id.clone()))
            }
            Err(e @ OrchestratorError::LessonNotFound { .. }) => Err(e),
            Err(e) => Err(OrchestratorError::lesson_load_failed(lesson_id, e.summary())),
        };

        match fetched {
            Ok(content) => {
                self.render(&content);
                self.progress.lock().await.mark_started(lesson_id);
                *self.current.lock().await = Some(content.clone());

                info!(
                    lesson_id = %lesson_id,
                    source = ?content.source_kind,
                    "Lesson loaded"
                );
                self.events.send(UiEvent::status(
                    format!("Lesson {lesson_id} loaded successfully"),
                    StatusLevel::Success,
                ));
                Ok(content)
            }
            Err(error) => {
                warn!(lesson_id = %lesson_id, error = %error, "Failed to load lesson");
                let content = LessonContent::error(lesson_id.clone(), &error);
                self.render(&content);
                self.events
                    .send(UiEvent::status("Error loading lesson", StatusLevel::Error));
                Err(LoadFailure { error, content })
            }
        }
    }

    fn render(&self, content: &LessonContent) {
        self.events.send(UiEvent::problem(
            content.lesson_id.as_str(),
            content.title.as_str(),
            content.problem_statement.as_str(),
        ));
        self.editor.set_text(&content.starter_code);
        self.editor.clear_history();
        self.events.send(UiEvent::output(""));
        self.events
            .send(UiEvent::Canvas(self.is_interactive(&content.lesson_id)));
        self.events.send(UiEvent::RerunAvailable(false));
    }
}
