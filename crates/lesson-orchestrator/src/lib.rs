//! Lesson runner core
//!
//! Tracks learner progress, loads lessons, runs and checks learner code
//! against a remote backend, and navigates the course. Rendering is reported
//! through [`events::UiEvent`]s so any front end can display it.

pub mod backend;
pub mod classify;
pub mod config;
pub mod editor;
pub mod error;
pub mod events;
pub mod execution;
pub mod input;
pub mod lesson;
pub mod lesson_id;
pub mod navigation;
pub mod progress;
pub mod session;
pub mod store;
pub mod syntax;
pub mod visualize;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    CheckRequest, CheckResponse, ExecutionResponse, ExecutionStatus, HealthStatus, HttpBackend,
    LessonBackend, LessonPayload, RunRequest,
};
pub use classify::{classify, ClassifiedError, ErrorKind};
pub use config::{Config, API_URL_ENV};
pub use editor::{BufferEditor, CodeEditor, FileEditor};
pub use error::{OrchestratorError, Result};
pub use events::{EventBroadcaster, StatusLevel, UiEvent};
pub use execution::{CheckOutcome, CheckPhase, ExecutionOrchestrator, RunOutcome, RunPhase};
pub use input::{detect_prompts, Collection, InputCollector, InputPrompt, PresetCollector};
pub use lesson::{LessonContent, LessonLoader, LoadFailure, SourceKind};
pub use lesson_id::LessonId;
pub use navigation::{NavigationController, NavigationOutcome};
pub use progress::{
    LessonProgress, LessonStatus, ProgressSummary, ProgressTracker, PROGRESS_STORAGE_KEY,
};
pub use session::{HostSeams, Session};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistentStore};
pub use visualize::ClassGraph;
