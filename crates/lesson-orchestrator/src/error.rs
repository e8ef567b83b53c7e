//! Error types for the lesson orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, progress persistence, lesson loading,
//! and communication with the execution backend.

use std::path::PathBuf;

/// A specialized `Result` type for lesson orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur while running lessons.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your lesson.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The host storage primitive failed to read or write a key.
    #[error("Storage error for key '{key}': {message}\n\nSuggestion: Check that the state directory is writable and has free space")]
    StorageError {
        /// The storage key involved.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// A persisted document could not be decoded.
    #[error("Corrupted stored value for key '{key}': {message}\n\nSuggestion: Reset progress to start fresh")]
    StoredValueCorrupted {
        /// The storage key involved.
        key: String,
        /// Description of the corruption.
        message: String,
    },

    // ========================================================================
    // Lesson Errors
    // ========================================================================
    /// A lesson identifier is not two ASCII digits.
    #[error("Invalid lesson id '{raw}'\n\nSuggestion: Lesson ids are two digits, e.g. '01'")]
    InvalidLessonId {
        /// The rejected input.
        raw: String,
    },

    /// The lesson service has no content for the requested lesson.
    #[error("Lesson {lesson_id} not found\n\nSuggestion: The lesson may still be under development")]
    LessonNotFound {
        /// The requested lesson.
        lesson_id: String,
    },

    /// Lesson content could not be loaded for a reason other than "not found".
    #[error("Failed to load lesson {lesson_id}: {message}\n\nSuggestion: Refresh and try again")]
    LessonLoadFailed {
        /// The requested lesson.
        lesson_id: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The backend could not be reached.
    #[error("Network error talking to {url}: {message}\n\nSuggestion: Check that the backend server is running and reachable")]
    Network {
        /// The URL being requested.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}\n\nSuggestion: Retry later; the backend may be experiencing issues")]
    HttpStatus {
        /// The URL being requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The backend answered with a body that could not be decoded.
    #[error("Unexpected response from {url}: {message}\n\nSuggestion: Make sure the backend version matches this client")]
    Decode {
        /// The URL being requested.
        url: String,
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Workspace Errors
    // ========================================================================
    /// The learner's source file exists but could not be read.
    #[error("Could not read your code from '{path}': {message}\n\nSuggestion: Make sure the file is saved as UTF-8 text and is readable")]
    WorkspaceRead {
        /// Path to the workspace file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `StorageError`.
    #[must_use]
    pub fn storage(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::StorageError {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Creates a new `StoredValueCorrupted` error.
    #[must_use]
    pub fn stored_value_corrupted(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::StoredValueCorrupted {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Creates a new `InvalidLessonId` error.
    #[must_use]
    pub fn invalid_lesson_id(raw: impl Into<String>) -> Self {
        Self::InvalidLessonId { raw: raw.into() }
    }

    /// Creates a new `LessonNotFound` error.
    #[must_use]
    pub fn lesson_not_found(lesson_id: impl std::fmt::Display) -> Self {
        Self::LessonNotFound {
            lesson_id: lesson_id.to_string(),
        }
    }

    /// Creates a new `LessonLoadFailed` error.
    #[must_use]
    pub fn lesson_load_failed(
        lesson_id: impl std::fmt::Display,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::LessonLoadFailed {
            lesson_id: lesson_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a new `HttpStatus` error.
    #[must_use]
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a new `WorkspaceRead` error.
    #[must_use]
    pub fn workspace_read(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::WorkspaceRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// The first line of the message, without the suggestion.
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Returns `true` for failures that happened below the application
    /// protocol: the request never produced a structured payload.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Decode { .. }
        )
    }
}
