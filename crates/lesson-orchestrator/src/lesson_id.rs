//! Two-digit lesson identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Identifier of a lesson, always two ASCII digits (`"01"`, `"12"`).
///
/// Ordering follows the numeric value, which for two-digit ids is the same
/// as the lexical order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LessonId(String);

impl LessonId {
    /// Largest number representable as a lesson id.
    pub const MAX_NUMBER: u32 = 99;

    /// Parses a lesson id, accepting only two ASCII digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use lesson_orchestrator::LessonId;
    ///
    /// assert!(LessonId::parse("01").is_ok());
    /// assert!(LessonId::parse("1").is_err());
    /// assert!(LessonId::parse("ab").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, OrchestratorError> {
        if raw.len() == 2 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(OrchestratorError::invalid_lesson_id(raw))
        }
    }

    /// The first lesson of every course, `"01"`.
    #[must_use]
    pub fn first() -> Self {
        Self("01".to_string())
    }

    /// Builds the id for a lesson number, zero-padded to two digits.
    ///
    /// Returns `None` for numbers that do not fit in two digits.
    #[must_use]
    pub fn from_number(number: u32) -> Option<Self> {
        (number <= Self::MAX_NUMBER).then(|| Self(format!("{number:02}")))
    }

    /// Numeric value of the id.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.0
            .bytes()
            .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LessonId {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LessonId {
    type Error = OrchestratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LessonId> for String {
    fn from(id: LessonId) -> Self {
        id.0
    }
}
