//! Maps backend execution errors to learner-facing messages.
//!
//! The backend reports failures with an `error_type` wire value and a
//! handful of optional fields. When it supplies a `friendly_message` or a
//! `suggestion`, those lead the rendered message and the raw technical text
//! follows under a labelled section. Otherwise a fixed message per
//! [`ErrorKind`] is used.

use std::fmt::Write as _;
use std::time::Duration;

use crate::backend::ExecutionResponse;
use crate::error::OrchestratorError;

/// Category of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The program exceeded the execution time limit.
    Timeout,
    /// The program raised at runtime.
    Runtime,
    /// The submission was empty or its inputs malformed.
    Input,
    /// The execution service is misconfigured.
    System,
    /// Anything the backend did not categorize.
    Unknown,
}

impl ErrorKind {
    /// Maps the backend `error_type` value.
    #[must_use]
    pub fn from_wire(error_type: Option<&str>) -> Self {
        match error_type {
            Some("timeout_error") => Self::Timeout,
            Some("runtime_error") => Self::Runtime,
            Some("input_error") => Self::Input,
            Some("system_error") => Self::System,
            _ => Self::Unknown,
        }
    }

    /// The backend wire value for this kind.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Timeout => "timeout_error",
            Self::Runtime => "runtime_error",
            Self::Input => "input_error",
            Self::System => "system_error",
            Self::Unknown => "unknown",
        }
    }

    /// Heading of the rendered message.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Timeout => "Timeout Error",
            Self::Runtime => "Runtime Error",
            Self::Input => "Input Error",
            Self::System => "System Error",
            Self::Unknown => "Execution Error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A classified execution failure ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// The category.
    pub kind: ErrorKind,
    /// Full text for the output panel.
    pub message: String,
}

/// Fixed text for server-side misconfiguration. Never includes backend detail.
pub const SYSTEM_ERROR_MESSAGE: &str = "System Error\n\n\
    The code execution service is not configured correctly.\n\
    This is a server configuration issue, not a problem with your code.\n\
    Please try again later or contact support if the problem persists.";

/// Classifies an error response.
///
/// `client_time` is the round trip measured by the orchestrator.
#[must_use]
pub fn classify(response: &ExecutionResponse, client_time: Duration) -> ClassifiedError {
    let kind = ErrorKind::from_wire(response.error_type.as_deref());

    let message = match kind {
        ErrorKind::System => SYSTEM_ERROR_MESSAGE.to_string(),
        _ if has_enhanced_fields(response) => render_enhanced(kind, response),
        ErrorKind::Timeout => render_timeout(response, client_time),
        ErrorKind::Runtime => render_runtime(response, client_time),
        ErrorKind::Input => render_input(response),
        ErrorKind::Unknown => render_unknown(response, client_time),
    };

    ClassifiedError { kind, message }
}

/// Message for a request that never produced a structured payload.
///
/// `action` completes the sentence "Failed to ...", e.g. `"execute code"`.
#[must_use]
pub fn transport_failure_message(
    action: &str,
    error: &OrchestratorError,
    elapsed: Duration,
) -> String {
    let detail = error.summary();

    let mut out = format!("Failed to {action}\n\nError details: {detail}\n\n");
    out.push_str("Troubleshooting steps:\n");
    out.push_str("1. Check that the backend server is running\n");
    out.push_str("2. Verify your network connection is stable\n");
    out.push_str("3. Try again in a moment\n\n");
    let _ = write!(out, "Failed after: {:.1}s", elapsed.as_secs_f64());
    out
}

/// Client round trip as display text.
#[must_use]
pub fn format_client_time(elapsed: Duration) -> String {
    format!("{:.3}s", elapsed.as_secs_f64())
}

fn has_enhanced_fields(response: &ExecutionResponse) -> bool {
    non_empty(response.friendly_message.as_deref()).is_some()
        || non_empty(response.suggestion.as_deref()).is_some()
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

fn render_enhanced(kind: ErrorKind, response: &ExecutionResponse) -> String {
    let mut out = format!("{}\n\n", kind.title());

    let headline = non_empty(response.friendly_message.as_deref())
        .or_else(|| non_empty(response.message.as_deref()))
        .unwrap_or("Something went wrong while running your code.");
    out.push_str(headline);
    out.push('\n');

    if let Some(line) = response.error_line {
        let _ = write!(out, "\nLine: {line}\n");
    }
    if let Some(suggestion) = non_empty(response.suggestion.as_deref()) {
        let _ = write!(out, "\nSuggestion: {suggestion}\n");
    }

    let technical = non_empty(response.error_output.as_deref())
        .or_else(|| non_empty(response.message.as_deref()))
        .filter(|t| *t != headline);
    if let Some(technical) = technical {
        let _ = write!(out, "\nTechnical details:\n{}\n", technical.trim_end());
    }

    out.trim_end().to_string()
}

fn render_timeout(response: &ExecutionResponse, client_time: Duration) -> String {
    let bound = response
        .timeout
        .map_or_else(|| "the time limit".to_string(), format_seconds);

    let mut out = String::from("Timeout Error\n\n");
    let _ = write!(out, "Your code took too long to execute (over {bound}).\n\n");
    out.push_str("Tips:\n");
    out.push_str("- Check for infinite loops (while True, loops whose condition never changes)\n");
    out.push_str("- Make sure every loop moves toward its exit condition\n");
    out.push_str("- Reduce the amount of work done inside loops\n");
    out.push_str("- Avoid long-running operations such as long sleeps\n\n");
    let _ = write!(out, "Total time: {}", format_client_time(client_time));
    out
}

fn render_runtime(response: &ExecutionResponse, client_time: Duration) -> String {
    let stderr = non_empty(response.error_output.as_deref())
        .or_else(|| non_empty(response.message.as_deref()))
        .unwrap_or("Unknown runtime error");

    let mut out = String::from("Runtime Error\n\n");
    let _ = write!(out, "{}\n\n", stderr.trim_end());
    let _ = writeln!(out, "Execution time: {}", response.execution_time_text());
    let _ = writeln!(out, "Total time: {}", format_client_time(client_time));
    if let Some(output) = non_empty(response.output.as_deref()) {
        let _ = write!(out, "\nOutput before error:\n{}\n", output.trim_end());
    }
    out.push_str("\nTip: Check the error message above for the line number and what went wrong.");
    out
}

fn render_input(response: &ExecutionResponse) -> String {
    let message = non_empty(response.message.as_deref()).unwrap_or("No code was provided.");

    let mut out = String::from("Input Error\n\n");
    let _ = write!(out, "{message}\n\n");
    out.push_str("Please enter some Python code to execute.\n\n");
    out.push_str("Example:\nprint(\"Hello, World!\")\nx = 5\nprint(f\"x = {x}\")");
    out
}

fn render_unknown(response: &ExecutionResponse, client_time: Duration) -> String {
    let message = non_empty(response.message.as_deref()).unwrap_or("An unknown error occurred.");

    let mut out = String::from("Execution Error\n\n");
    let _ = write!(out, "{message}\n\n");
    let _ = writeln!(out, "Execution time: {}", response.execution_time_text());
    let _ = write!(out, "Total time: {}", format_client_time(client_time));
    if let Some(details) = &response.error_details {
        let details = details
            .as_str()
            .map_or_else(|| details.to_string(), str::to_string);
        let _ = write!(out, "\n\nDetails: {details}");
    }
    out
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract().abs() < f64::EPSILON {
        if (seconds - 1.0).abs() < f64::EPSILON {
            "1 second".to_string()
        } else {
            format!("{seconds:.0} seconds")
        }
    } else {
        format!("{seconds} seconds")
    }
}
