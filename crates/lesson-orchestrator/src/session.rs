//! A wired lesson session.
//!
//! [`Session`] builds every component from a [`Config`] plus the host's
//! seams (backend, store, editor, input collector) and shares the single
//! progress tracker between them.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::backend::{HealthStatus, LessonBackend};
use crate::config::Config;
use crate::editor::CodeEditor;
use crate::error::Result;
use crate::events::EventBroadcaster;
use crate::execution::ExecutionOrchestrator;
use crate::input::InputCollector;
use crate::lesson::LessonLoader;
use crate::navigation::{NavigationController, NavigationOutcome};
use crate::progress::{ProgressSummary, ProgressTracker};
use crate::store::PersistentStore;

/// Host-supplied collaborators.
pub struct HostSeams {
    /// Lesson, execution and check service.
    pub backend: Arc<dyn LessonBackend>,
    /// Durable storage for progress.
    pub store: PersistentStore,
    /// The code editor adapter.
    pub editor: Arc<dyn CodeEditor>,
    /// The input collection surface.
    pub collector: Arc<dyn InputCollector>,
}

/// Every component of a running lesson session.
pub struct Session {
    /// Configuration the session was built from.
    pub config: Config,
    /// UI event sink.
    pub events: EventBroadcaster,
    /// The single progress tracker.
    pub progress: Arc<Mutex<ProgressTracker>>,
    /// Lesson loading.
    pub loader: Arc<LessonLoader>,
    /// Run and check flows.
    pub orchestrator: ExecutionOrchestrator,
    /// Lesson navigation.
    pub navigation: NavigationController,
    backend: Arc<dyn LessonBackend>,
}

impl std::fmt::Debug for HostSeams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSeams")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("navigation", &self.navigation)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wires a session. Call [`Session::start`] to restore progress and open
    /// the current lesson.
    #[must_use]
    pub fn new(config: Config, seams: HostSeams) -> Self {
        let HostSeams {
            backend,
            store,
            editor,
            collector,
        } = seams;

        let events = EventBroadcaster::default();
        let known_lessons = config.known_lessons();
        let progress = Arc::new(Mutex::new(ProgressTracker::new(
            store,
            events.clone(),
            known_lessons.len(),
        )));

        let loader = Arc::new(LessonLoader::new(
            Arc::clone(&backend),
            Arc::clone(&progress),
            Arc::clone(&editor),
            events.clone(),
            config.interactive_lesson_ids(),
        ));

        let orchestrator = ExecutionOrchestrator::new(
            Arc::clone(&backend),
            Arc::clone(&editor),
            collector,
            Arc::clone(&progress),
            Arc::clone(&loader),
            events.clone(),
            config.syntax_warning_delay(),
        );

        let navigation = NavigationController::new(
            Arc::clone(&loader),
            Arc::clone(&progress),
            editor,
            events.clone(),
            known_lessons,
            config.default_lesson_id(),
        );

        Self {
            config,
            events,
            progress,
            loader,
            orchestrator,
            navigation,
            backend,
        }
    }

    /// Restores persisted progress and opens the (validated) current lesson.
    pub async fn start(&self) -> NavigationOutcome {
        self.progress.lock().await.load();
        info!(api_base_url = %self.config.api_base_url, "Session started");
        self.navigation.restore().await
    }

    /// Resets progress to defaults and reopens the default lesson.
    pub async fn reset_progress(&self) -> NavigationOutcome {
        self.progress.lock().await.reset();
        self.navigation.go_to(&self.config.default_lesson_id()).await
    }

    /// Completion figures for the course.
    pub async fn progress_summary(&self) -> ProgressSummary {
        self.progress.lock().await.summary()
    }

    /// Asks the backend for its health.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the backend cannot be reached.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.backend.health().await
    }
}
