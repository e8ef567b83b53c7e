//! Configuration types for the lesson orchestrator.
//!
//! This module provides the configuration used to locate the lesson backend,
//! declare the statically known course outline, and place persisted state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::lesson_id::LessonId;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "lesson.json";

/// Environment variable that overrides `apiBaseUrl`.
pub const API_URL_ENV: &str = "LESSON_API_URL";

/// Default backend base URL.
fn default_api_base_url() -> String {
    "http://localhost:5000".to_string()
}

/// Default course outline: six planned lessons.
fn default_lessons() -> Vec<String> {
    (1..=6).map(|n| format!("{n:02}")).collect()
}

/// Default lesson used when restored state is invalid.
fn default_lesson() -> String {
    "01".to_string()
}

/// Lessons that show the interactive canvas by default.
fn default_interactive_lessons() -> Vec<String> {
    vec!["03".to_string()]
}

/// Default directory for the file-backed store.
fn default_state_dir() -> String {
    ".lesson".to_string()
}

/// Default file backing the CLI editor.
fn default_workspace_file() -> String {
    ".lesson/main.py".to_string()
}

/// Default advisory pause after syntax warnings, in milliseconds.
const fn default_syntax_warning_delay_ms() -> u64 {
    1000
}

/// Main configuration for a lesson session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the lesson, execution and check backend.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Statically known lesson ids, in course order.
    #[serde(default = "default_lessons")]
    pub lessons: Vec<String>,

    /// Lesson selected when nothing valid has been persisted.
    #[serde(default = "default_lesson")]
    pub default_lesson: String,

    /// Lessons that show the interactive canvas and class diagram.
    #[serde(default = "default_interactive_lessons")]
    pub interactive_lessons: Vec<String>,

    /// Directory holding persisted progress.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// File the terminal editor adapter reads and writes.
    #[serde(default = "default_workspace_file")]
    pub workspace_file: String,

    /// Pause applied after the syntax heuristic reports warnings.
    #[serde(default = "default_syntax_warning_delay_ms")]
    pub syntax_warning_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            lessons: default_lessons(),
            default_lesson: default_lesson(),
            interactive_lessons: default_interactive_lessons(),
            state_dir: default_state_dir(),
            workspace_file: default_workspace_file(),
            syntax_warning_delay_ms: default_syntax_warning_delay_ms(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `lesson.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    /// `LESSON_API_URL`, when set, overrides the backend URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            OrchestratorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `lesson.json` inside a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::ConfigParseError` if the file exists but
    /// contains invalid JSON, and `OrchestratorError::ConfigValidationError`
    /// if the values are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<Self>(&contents)
                .map_err(|e| OrchestratorError::config_parse(path, e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(OrchestratorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!(url = %url, "Backend URL overridden from environment");
                config.api_base_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// Checks that:
    /// - `apiBaseUrl` is an http(s) URL
    /// - `lessons` is non-empty, two-digit and free of duplicates
    /// - `defaultLesson` is one of `lessons`
    /// - `interactiveLessons` are two-digit ids
    /// - `stateDir` is not empty
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(OrchestratorError::config_validation(
                format!("apiBaseUrl must be an http(s) URL, got '{url}'"),
                "Set apiBaseUrl to something like http://localhost:5000 in your lesson.json",
            ));
        }

        if self.lessons.is_empty() {
            return Err(OrchestratorError::config_validation(
                "lessons must not be empty",
                "List at least one lesson id, e.g. [\"01\"], in your lesson.json",
            ));
        }

        let mut seen = HashSet::new();
        for raw in &self.lessons {
            LessonId::parse(raw).map_err(|_| {
                OrchestratorError::config_validation(
                    format!("lesson id '{raw}' is not two digits"),
                    "Use two-digit lesson ids such as \"01\"",
                )
            })?;
            if !seen.insert(raw.as_str()) {
                return Err(OrchestratorError::config_validation(
                    format!("lesson id '{raw}' is listed twice"),
                    "Remove the duplicate entry from lessons",
                ));
            }
        }

        if !seen.contains(self.default_lesson.as_str()) {
            return Err(OrchestratorError::config_validation(
                format!("defaultLesson '{}' is not in lessons", self.default_lesson),
                "Set defaultLesson to one of the ids listed in lessons",
            ));
        }

        for raw in &self.interactive_lessons {
            LessonId::parse(raw).map_err(|_| {
                OrchestratorError::config_validation(
                    format!("interactive lesson id '{raw}' is not two digits"),
                    "Use two-digit lesson ids in interactiveLessons",
                )
            })?;
        }

        if self.state_dir.trim().is_empty() {
            return Err(OrchestratorError::config_validation(
                "stateDir must not be empty",
                "Provide a directory for persisted progress (use '.lesson' for the default)",
            ));
        }

        Ok(())
    }

    /// The known lesson ids in course order.
    ///
    /// Ids are validated by [`Config::validate`]; malformed entries are skipped.
    #[must_use]
    pub fn known_lessons(&self) -> Vec<LessonId> {
        self.lessons
            .iter()
            .filter_map(|raw| LessonId::parse(raw).ok())
            .collect()
    }

    /// The lesson used when restored state is invalid.
    #[must_use]
    pub fn default_lesson_id(&self) -> LessonId {
        LessonId::parse(&self.default_lesson)
            .ok()
            .or_else(|| self.known_lessons().into_iter().next())
            .unwrap_or_else(LessonId::first)
    }

    /// Lessons that show the interactive canvas.
    #[must_use]
    pub fn interactive_lesson_ids(&self) -> Vec<LessonId> {
        self.interactive_lessons
            .iter()
            .filter_map(|raw| LessonId::parse(raw).ok())
            .collect()
    }

    /// Directory of the file-backed store.
    #[must_use]
    pub fn state_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.state_dir)
    }

    /// Advisory delay after syntax warnings.
    #[must_use]
    pub const fn syntax_warning_delay(&self) -> Duration {
        Duration::from_millis(self.syntax_warning_delay_ms)
    }
}
