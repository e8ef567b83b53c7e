//! Lesson progress: the only persisted entity of a session.
//!
//! [`ProgressTracker`] owns the single [`LessonProgress`] record. All
//! mutation goes through it, which keeps completion monotonic: once a lesson
//! is completed it stays completed until the learner explicitly resets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{EventBroadcaster, ProgressPayload, UiEvent};
use crate::lesson_id::LessonId;
use crate::store::PersistentStore;

/// Storage key of the progress document.
pub const PROGRESS_STORAGE_KEY: &str = "lesson_progress";

// ============================================================================
// LessonStatus
// ============================================================================

/// Per-lesson status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    /// Never opened.
    #[default]
    NotStarted,
    /// Opened but not yet passed.
    InProgress,
    /// Answer checked as correct.
    Completed,
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

// ============================================================================
// LessonProgress
// ============================================================================

/// The persisted progress record.
///
/// Invariant: `id ∈ completed_lessons ⇔ lesson_statuses[id] == Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    /// The lesson the learner is on.
    pub current_lesson: LessonId,
    /// Lessons with a correct-answer check.
    pub completed_lessons: BTreeSet<LessonId>,
    /// Status of every lesson that has been touched.
    pub lesson_statuses: BTreeMap<LessonId, LessonStatus>,
}

impl Default for LessonProgress {
    fn default() -> Self {
        Self {
            current_lesson: LessonId::first(),
            completed_lessons: BTreeSet::new(),
            lesson_statuses: BTreeMap::new(),
        }
    }
}

impl LessonProgress {
    /// Status of a lesson; untouched lessons are `NotStarted`.
    #[must_use]
    pub fn status_of(&self, lesson_id: &LessonId) -> LessonStatus {
        self.lesson_statuses
            .get(lesson_id)
            .copied()
            .unwrap_or_default()
    }

    /// Whether a lesson has been completed.
    #[must_use]
    pub fn is_completed(&self, lesson_id: &LessonId) -> bool {
        self.completed_lessons.contains(lesson_id)
    }

    /// Restores the completion invariant after loading foreign data.
    ///
    /// Repairs only ever add completion, never remove it.
    fn reconcile(&mut self) {
        for id in &self.completed_lessons {
            self.lesson_statuses
                .insert(id.clone(), LessonStatus::Completed);
        }
        for (id, status) in &self.lesson_statuses {
            if *status == LessonStatus::Completed {
                self.completed_lessons.insert(id.clone());
            }
        }
    }

    /// Shallow-merges a persisted JSON object over `self`.
    ///
    /// Each known top-level field is decoded on its own and collections are
    /// decoded entry by entry. Anything that cannot be decoded is skipped and
    /// the rest is kept, so older saves and saves with unknown extra fields
    /// still load. Returns the number of fields or entries that were dropped.
    fn merge_from(&mut self, value: &serde_json::Value) -> usize {
        let Some(object) = value.as_object() else {
            warn!("Persisted progress is not a JSON object; keeping defaults");
            return 1;
        };

        let mut dropped = 0;

        if let Some(raw) = object.get("currentLesson") {
            match decode_id(raw) {
                Some(id) => self.current_lesson = id,
                None => {
                    warn!(value = %raw, "Ignoring unreadable persisted current lesson");
                    dropped += 1;
                }
            }
        }

        match object.get("completedLessons") {
            None => {}
            Some(serde_json::Value::Array(entries)) => {
                let mut completed = BTreeSet::new();
                for entry in entries {
                    match decode_id(entry) {
                        Some(id) => {
                            completed.insert(id);
                        }
                        None => {
                            warn!(entry = %entry, "Skipping unreadable completed lesson");
                            dropped += 1;
                        }
                    }
                }
                self.completed_lessons = completed;
            }
            Some(other) => {
                warn!(value = %other, "Ignoring persisted completedLessons that is not a list");
                dropped += 1;
            }
        }

        match object.get("lessonStatuses") {
            None => {}
            Some(serde_json::Value::Object(entries)) => {
                let mut statuses = BTreeMap::new();
                for (key, raw) in entries {
                    let id = LessonId::parse(key).ok();
                    let status = serde_json::from_value::<LessonStatus>(raw.clone()).ok();
                    match (id, status) {
                        (Some(id), Some(status)) => {
                            statuses.insert(id, status);
                        }
                        _ => {
                            warn!(lesson = %key, status = %raw, "Skipping unreadable lesson status");
                            dropped += 1;
                        }
                    }
                }
                self.lesson_statuses = statuses;
            }
            Some(other) => {
                warn!(value = %other, "Ignoring persisted lessonStatuses that is not a map");
                dropped += 1;
            }
        }

        dropped
    }
}

fn decode_id(raw: &serde_json::Value) -> Option<LessonId> {
    raw.as_str().and_then(|text| LessonId::parse(text).ok())
}

/// Completion figures for the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    /// Completed lessons.
    pub completed: usize,
    /// Lessons in the course.
    pub total: usize,
}

impl ProgressSummary {
    /// Completion percentage, rounded to the nearest integer.
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let completed = self.completed.min(self.total);
        let rounded = (completed * 200 + self.total) / (self.total * 2);
        u32::try_from(rounded).unwrap_or(100)
    }

    /// "N% Complete (c/t lessons)".
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{}% Complete ({}/{} lessons)",
            self.percentage(),
            self.completed,
            self.total
        )
    }
}

impl From<ProgressSummary> for ProgressPayload {
    fn from(summary: ProgressSummary) -> Self {
        Self {
            completed: summary.completed,
            total: summary.total,
            percentage: summary.percentage(),
        }
    }
}

// ============================================================================
// ProgressTracker
// ============================================================================

/// Owns, persists and publishes lesson progress.
#[derive(Debug)]
pub struct ProgressTracker {
    progress: LessonProgress,
    store: PersistentStore,
    events: EventBroadcaster,
    total_lessons: usize,
    /// Set when the last load skipped unreadable data; cleared on save.
    needs_resave: bool,
}

impl ProgressTracker {
    /// Creates a tracker with default progress. Call [`ProgressTracker::load`]
    /// to restore persisted state.
    #[must_use]
    pub fn new(store: PersistentStore, events: EventBroadcaster, total_lessons: usize) -> Self {
        Self {
            progress: LessonProgress::default(),
            store,
            events,
            total_lessons,
            needs_resave: false,
        }
    }

    /// Read access to the in-memory record.
    #[must_use]
    pub const fn progress(&self) -> &LessonProgress {
        &self.progress
    }

    /// Whether the stored copy is known to differ from the in-memory record
    /// because the last load skipped unreadable data.
    #[must_use]
    pub const fn needs_resave(&self) -> bool {
        self.needs_resave
    }

    /// The lesson the learner is on.
    #[must_use]
    pub const fn current_lesson(&self) -> &LessonId {
        &self.progress.current_lesson
    }

    /// Restores persisted progress.
    ///
    /// Absent or unreadable documents leave the defaults in place. Present
    /// documents are shallow-merged over the defaults entry by entry; when
    /// anything had to be skipped the tracker remembers that the stored copy
    /// needs rewriting (see [`ProgressTracker::needs_resave`]).
    pub fn load(&mut self) {
        let mut restored = LessonProgress::default();
        self.needs_resave = false;
        match self.store.load_value(PROGRESS_STORAGE_KEY) {
            Ok(Some(value)) => {
                let dropped = restored.merge_from(&value);
                if dropped > 0 {
                    warn!(dropped, "Saved progress was partly unreadable; it will be rewritten");
                    self.needs_resave = true;
                }
                restored.reconcile();
                info!(
                    current_lesson = %restored.current_lesson,
                    completed = restored.completed_lessons.len(),
                    "Progress restored"
                );
            }
            Ok(None) => debug!("No saved progress found, using defaults"),
            Err(e) => warn!(error = %e, "Failed to read saved progress; using defaults"),
        }
        self.progress = restored;
        self.publish();
    }

    /// Persists the whole record.
    ///
    /// Failures are logged and swallowed: the in-memory record stays
    /// authoritative for the session. Returns whether the write succeeded.
    pub fn save(&mut self) -> bool {
        match self.store.save(PROGRESS_STORAGE_KEY, &self.progress) {
            Ok(()) => {
                debug!("Progress saved");
                self.needs_resave = false;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save progress; continuing with in-memory state");
                false
            }
        }
    }

    /// Sets the status of a lesson, persists, and refreshes the progress bar.
    ///
    /// A completed lesson is never downgraded: requests to move it back to
    /// `NotStarted` or `InProgress` are ignored.
    pub fn update_status(&mut self, lesson_id: &LessonId, status: LessonStatus) {
        let previous = self.progress.status_of(lesson_id);
        if previous == LessonStatus::Completed && status != LessonStatus::Completed {
            debug!(
                lesson_id = %lesson_id,
                requested = %status,
                "Ignoring downgrade of a completed lesson"
            );
            return;
        }

        info!(lesson_id = %lesson_id, status = %status, "Updating lesson status");
        self.progress
            .lesson_statuses
            .insert(lesson_id.clone(), status);

        if status == LessonStatus::Completed && self.progress.completed_lessons.insert(lesson_id.clone()) {
            info!(lesson_id = %lesson_id, "Lesson marked as completed");
        }

        self.save();
        self.publish();
    }

    /// Marks a lesson as started unless it already is started or completed.
    pub fn mark_started(&mut self, lesson_id: &LessonId) {
        match self.progress.status_of(lesson_id) {
            LessonStatus::NotStarted => self.update_status(lesson_id, LessonStatus::InProgress),
            LessonStatus::InProgress | LessonStatus::Completed => {}
        }
    }

    /// Commits the current lesson and persists.
    pub fn set_current_lesson(&mut self, lesson_id: &LessonId) {
        if &self.progress.current_lesson == lesson_id {
            return;
        }
        info!(lesson_id = %lesson_id, "Current lesson changed");
        self.progress.current_lesson = lesson_id.clone();
        self.save();
    }

    /// Ensures the current lesson is one of `known`, correcting it to
    /// `fallback` (and persisting the correction) if not.
    ///
    /// A record that loaded with skipped data is persisted here as well, so
    /// a malformed stored lesson id is replaced on disk by the default.
    /// Returns `true` when a correction was made.
    pub fn ensure_current_lesson(&mut self, known: &[LessonId], fallback: &LessonId) -> bool {
        if known.contains(&self.progress.current_lesson) {
            if self.needs_resave {
                info!("Rewriting partly unreadable saved progress");
                self.save();
            }
            return false;
        }
        warn!(
            restored = %self.progress.current_lesson,
            fallback = %fallback,
            "Restored lesson is not part of the course; correcting"
        );
        self.progress.current_lesson = fallback.clone();
        self.save();
        true
    }

    /// Reinitializes progress to defaults and persists.
    pub fn reset(&mut self) {
        info!("Progress reset to defaults");
        self.progress = LessonProgress::default();
        self.save();
        self.publish();
    }

    /// Completion figures over the configured course length.
    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            completed: self.progress.completed_lessons.len(),
            total: self.total_lessons,
        }
    }

    fn publish(&self) {
        self.events
            .send(UiEvent::Progress(self.summary().into()));
    }
}
