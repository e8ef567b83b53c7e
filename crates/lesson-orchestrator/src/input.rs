//! Interactive input detection and collection.
//!
//! [`detect_prompts`] is a best-effort lexical pass: it recognizes single-line
//! `input(...)` calls only. Multi-line calls, string concatenation and
//! prompts built at runtime are not understood and fall back to a synthesized
//! `"Input N:"` prompt (or are missed entirely when split across lines).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Matches `input(` with an optional leading string literal argument.
static INPUT_CALL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"\binput\s*\(\s*(?P<literal>"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')?"#).ok()
});

// ============================================================================
// InputPrompt
// ============================================================================

/// A prompt the program will show when it asks for input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPrompt {
    /// Text shown to the learner.
    pub prompt_text: String,
    /// 1-based line of the call site.
    pub source_line: usize,
}

/// Scans `source` for interactive input call sites, in source order.
///
/// Blank lines and `#` comment lines are skipped. Every call on a line is
/// reported. Calling this twice on the same source yields the same result.
///
/// # Examples
///
/// ```
/// use lesson_orchestrator::input::detect_prompts;
///
/// let prompts = detect_prompts(r#"name = input("Name: ")"#);
/// assert_eq!(prompts.len(), 1);
/// assert_eq!(prompts[0].prompt_text, "Name: ");
/// assert_eq!(prompts[0].source_line, 1);
/// ```
#[must_use]
pub fn detect_prompts(source: &str) -> Vec<InputPrompt> {
    let Some(re) = INPUT_CALL.as_ref() else {
        return Vec::new();
    };

    let mut prompts = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        for caps in re.captures_iter(line) {
            let prompt_text = caps
                .name("literal")
                .and_then(|m| unquote(m.as_str()))
                .unwrap_or_else(|| format!("Input {}:", prompts.len() + 1));
            prompts.push(InputPrompt {
                prompt_text,
                source_line: index + 1,
            });
        }
    }

    debug!(count = prompts.len(), "Detected input prompts");
    prompts
}

/// Strips the surrounding quotes of a string literal and unescapes it.
fn unquote(literal: &str) -> Option<String> {
    let quote = literal.chars().next()?;
    let inner = literal.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(escaped @ ('\\' | '\'' | '"')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

// ============================================================================
// InputCollector
// ============================================================================

/// Result of an input collection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    /// One value per prompt, in prompt order.
    Submitted(Vec<String>),
    /// The learner aborted; the run must not be dispatched.
    Cancelled,
}

impl Collection {
    /// Forces a submission to exactly `expected` values, padding with empty
    /// strings or dropping extras. Cancellation is left alone.
    #[must_use]
    pub fn fit_to(self, expected: usize) -> Self {
        match self {
            Self::Submitted(mut values) => {
                values.resize(expected, String::new());
                Self::Submitted(values)
            }
            Self::Cancelled => Self::Cancelled,
        }
    }
}

/// Host surface that asks the learner for one value per prompt.
///
/// Implementations suspend until the learner submits or cancels.
#[async_trait]
pub trait InputCollector: Send + Sync {
    /// Gathers one value per prompt, or reports cancellation.
    async fn collect(&self, prompts: &[InputPrompt]) -> Collection;
}

/// Collector with answers supplied up front.
///
/// Missing answers become empty strings, extra answers are ignored.
#[derive(Debug, Clone, Default)]
pub struct PresetCollector {
    answers: Option<Vec<String>>,
}

impl PresetCollector {
    /// Submits `answers` for every collection pass.
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Some(answers.into_iter().map(Into::into).collect()),
        }
    }

    /// Cancels every collection pass.
    #[must_use]
    pub const fn cancelling() -> Self {
        Self { answers: None }
    }
}

#[async_trait]
impl InputCollector for PresetCollector {
    async fn collect(&self, prompts: &[InputPrompt]) -> Collection {
        match &self.answers {
            Some(answers) => Collection::Submitted(answers.clone()).fit_to(prompts.len()),
            None => Collection::Cancelled,
        }
    }
}
