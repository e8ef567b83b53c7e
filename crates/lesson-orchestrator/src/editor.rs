//! Code editor capability.
//!
//! The orchestrator only needs to read the learner's source, replace it with
//! starter code, and drop the undo history so starter code cannot be undone
//! into the previous lesson. Each concrete editor gets one adapter, chosen
//! once when the session is built.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::{OrchestratorError, Result};

/// Minimal editor surface.
pub trait CodeEditor: Send + Sync {
    /// Current source text.
    fn text(&self) -> String;

    /// Current source text, failing when the source exists but cannot be read.
    ///
    /// # Errors
    ///
    /// Editors over external storage return [`OrchestratorError::WorkspaceRead`].
    fn read(&self) -> Result<String> {
        Ok(self.text())
    }

    /// Replaces the whole source text.
    fn set_text(&self, text: &str);

    /// Forgets undo history.
    fn clear_history(&self);
}

// ============================================================================
// BufferEditor
// ============================================================================

#[derive(Debug, Default)]
struct Buffer {
    text: String,
    history: Vec<String>,
}

/// In-memory editor with an undo stack.
#[derive(Debug, Default)]
pub struct BufferEditor {
    buffer: Mutex<Buffer>,
}

impl BufferEditor {
    /// Creates an editor holding `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            buffer: Mutex::new(Buffer {
                text: text.into(),
                history: Vec::new(),
            }),
        }
    }

    /// Restores the previous text. Returns `false` when there is nothing to undo.
    pub fn undo(&self) -> bool {
        let mut buffer = self.buffer();
        match buffer.history.pop() {
            Some(previous) => {
                buffer.text = previous;
                true
            }
            None => false,
        }
    }

    /// Number of undoable edits.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.buffer().history.len()
    }

    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CodeEditor for BufferEditor {
    fn text(&self) -> String {
        self.buffer().text.clone()
    }

    fn set_text(&self, text: &str) {
        let mut buffer = self.buffer();
        let previous = std::mem::replace(&mut buffer.text, text.to_string());
        buffer.history.push(previous);
    }

    fn clear_history(&self) {
        self.buffer().history.clear();
    }
}

// ============================================================================
// FileEditor
// ============================================================================

/// Editor backed by a file the learner edits with their own tools.
///
/// A missing file reads as empty source. Read failures surface through
/// [`CodeEditor::read`]; write failures are logged.
#[derive(Debug, Clone)]
pub struct FileEditor {
    path: PathBuf,
}

impl FileEditor {
    /// Creates an editor over `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CodeEditor for FileEditor {
    fn text(&self) -> String {
        self.read().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to read workspace file");
            String::new()
        })
    }

    fn read(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(OrchestratorError::workspace_read(&self.path, e)),
        }
    }

    fn set_text(&self, text: &str) {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "Failed to create workspace directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, text) {
            warn!(path = %self.path.display(), error = %e, "Failed to write workspace file");
        }
    }

    fn clear_history(&self) {
        // A plain file keeps no undo history.
    }
}
