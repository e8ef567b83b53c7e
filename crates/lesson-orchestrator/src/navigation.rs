//! Lesson navigation.
//!
//! The committed current lesson only changes after its content loaded. A
//! failed or unknown lesson renders a "coming soon" view and leaves
//! persisted progress untouched.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::editor::CodeEditor;
use crate::error::Result;
use crate::events::{EventBroadcaster, NavigationPayload, StatusLevel, UiEvent};
use crate::lesson::{LessonContent, LessonLoader};
use crate::lesson_id::LessonId;
use crate::progress::ProgressTracker;

/// Output shown with the coming-soon view.
pub const COMING_SOON_MESSAGE: &str =
    "This lesson is coming soon! Use the navigation to return to available lessons.";

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The lesson loaded and is now current.
    Navigated(LessonContent),
    /// The lesson is unknown or failed to load; the current lesson is unchanged.
    ComingSoon {
        /// The requested lesson.
        requested: LessonId,
    },
    /// Nothing to do (already at the first lesson).
    Unchanged,
}

impl NavigationOutcome {
    /// Whether a lesson was committed.
    #[must_use]
    pub const fn is_navigated(&self) -> bool {
        matches!(self, Self::Navigated(_))
    }
}

/// Moves between lessons.
pub struct NavigationController {
    loader: Arc<LessonLoader>,
    progress: Arc<Mutex<ProgressTracker>>,
    editor: Arc<dyn CodeEditor>,
    events: EventBroadcaster,
    known_lessons: Vec<LessonId>,
    default_lesson: LessonId,
}

impl std::fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("known_lessons", &self.known_lessons)
            .field("default_lesson", &self.default_lesson)
            .finish_non_exhaustive()
    }
}

impl NavigationController {
    /// Creates a controller over the statically known lessons.
    #[must_use]
    pub fn new(
        loader: Arc<LessonLoader>,
        progress: Arc<Mutex<ProgressTracker>>,
        editor: Arc<dyn CodeEditor>,
        events: EventBroadcaster,
        known_lessons: Vec<LessonId>,
        default_lesson: LessonId,
    ) -> Self {
        Self {
            loader,
            progress,
            editor,
            events,
            known_lessons,
            default_lesson,
        }
    }

    /// The statically known lessons, in course order.
    #[must_use]
    pub fn known_lessons(&self) -> &[LessonId] {
        &self.known_lessons
    }

    /// Whether `lesson_id` is part of the course.
    #[must_use]
    pub fn is_known(&self, lesson_id: &LessonId) -> bool {
        self.known_lessons.contains(lesson_id)
    }

    /// Validates the restored current lesson and opens it.
    ///
    /// An unknown restored lesson is corrected to the default lesson, and the
    /// correction is persisted, before anything is loaded. A record that
    /// loaded with unreadable fields is persisted at the same point.
    pub async fn restore(&self) -> NavigationOutcome {
        let current = {
            let mut progress = self.progress.lock().await;
            progress.ensure_current_lesson(&self.known_lessons, &self.default_lesson);
            progress.current_lesson().clone()
        };
        info!(lesson_id = %current, "Restoring lesson");
        self.go_to(&current).await
    }

    /// Opens `lesson_id`, committing it only if it loads.
    pub async fn go_to(&self, lesson_id: &LessonId) -> NavigationOutcome {
        if !self.is_known(lesson_id) {
            info!(lesson_id = %lesson_id, "Lesson is not part of the course");
            self.show_coming_soon(lesson_id).await;
            return NavigationOutcome::ComingSoon {
                requested: lesson_id.clone(),
            };
        }

        match self.loader.load(lesson_id).await {
            Ok(content) => {
                self.progress.lock().await.set_current_lesson(lesson_id);
                self.publish_navigation(lesson_id);
                info!(lesson_id = %lesson_id, "Navigated to lesson");
                NavigationOutcome::Navigated(content)
            }
            Err(failure) => {
                warn!(lesson_id = %lesson_id, error = %failure, "Navigation failed");
                self.show_coming_soon(lesson_id).await;
                NavigationOutcome::ComingSoon {
                    requested: lesson_id.clone(),
                }
            }
        }
    }

    /// Parses `raw` and opens it.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::InvalidLessonId` if `raw` is not two digits.
    pub async fn go_to_raw(&self, raw: &str) -> Result<NavigationOutcome> {
        let lesson_id = LessonId::parse(raw.trim())?;
        Ok(self.go_to(&lesson_id).await)
    }

    /// Opens the previous lesson. A no-op at the first lesson.
    pub async fn go_previous(&self) -> NavigationOutcome {
        let current = self.current_number().await;
        let Some(previous) = current
            .checked_sub(1)
            .filter(|n| *n >= 1)
            .and_then(LessonId::from_number)
        else {
            return NavigationOutcome::Unchanged;
        };
        self.go_to(&previous).await
    }

    /// Opens the next lesson. Past the last known lesson this shows the
    /// coming-soon view.
    pub async fn go_next(&self) -> NavigationOutcome {
        let current = self.current_number().await;
        let Some(next) = LessonId::from_number(current + 1) else {
            return NavigationOutcome::Unchanged;
        };
        self.go_to(&next).await
    }

    /// Button state for the committed current lesson.
    pub async fn navigation_state(&self) -> NavigationPayload {
        let current = self.progress.lock().await.current_lesson().clone();
        self.payload_for(&current)
    }

    async fn current_number(&self) -> u32 {
        self.progress.lock().await.current_lesson().number()
    }

    fn payload_for(&self, current: &LessonId) -> NavigationPayload {
        let number = current.number();
        let last = self
            .known_lessons
            .iter()
            .map(LessonId::number)
            .max()
            .unwrap_or(number);

        let (previous_enabled, previous_label) = if number <= 1 {
            (false, "← First Lesson".to_string())
        } else {
            (true, format!("← Lesson {}", number - 1))
        };
        let (next_enabled, next_label) = if number >= last {
            (false, "Last Lesson →".to_string())
        } else {
            (true, format!("Lesson {} →", number + 1))
        };

        NavigationPayload {
            current_lesson: current.to_string(),
            previous_enabled,
            previous_label,
            next_enabled,
            next_label,
        }
    }

    fn publish_navigation(&self, current: &LessonId) {
        self.events
            .send(UiEvent::Navigation(self.payload_for(current)));
    }

    async fn show_coming_soon(&self, lesson_id: &LessonId) {
        let planned: String = self
            .known_lessons
            .iter()
            .map(|id| format!("- Lesson {id}\n"))
            .collect();
        let markdown = format!(
            "## Coming Soon!\n\nLesson {lesson_id} is currently under development.\n\n\
             **Available lessons:**\n\n{planned}\nReturn to Lesson {} to keep learning.",
            self.default_lesson
        );
        self.events.send(UiEvent::problem(
            lesson_id.as_str(),
            format!("Lesson {lesson_id}: Coming Soon"),
            markdown,
        ));

        self.editor.set_text(&format!(
            "# Lesson {lesson_id}: Coming Soon\n\
             # This lesson is currently under development.\n\
             #\n\
             # Stay tuned!\n\
             \n\
             print(\"This lesson is coming soon!\")\n"
        ));
        self.editor.clear_history();

        self.events.send(UiEvent::output(COMING_SOON_MESSAGE));
        self.events.send(UiEvent::Canvas(false));
        self.events.send(UiEvent::RerunAvailable(false));
        self.events.send(UiEvent::status(
            format!("Lesson {lesson_id} is not available yet"),
            StatusLevel::Info,
        ));

        let current = self.progress.lock().await.current_lesson().clone();
        self.publish_navigation(&current);
    }
}
