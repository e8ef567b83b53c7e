//! UI event types and broadcasting.
//!
//! Every component that "renders" something does so by publishing a
//! [`UiEvent`] on the shared [`EventBroadcaster`]. The host (terminal,
//! browser bridge, tests) subscribes and draws. Components never depend on
//! a concrete UI.
//!
//! # Example
//!
//! ```no_run
//! use lesson_orchestrator::events::{EventBroadcaster, StatusLevel, UiEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(UiEvent::status("Ready", StatusLevel::Ready));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {event:?}");
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::visualize::ClassGraph;

// ============================================================================
// Event Payloads
// ============================================================================

/// Severity/colour of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// Idle and ready for input.
    Ready,
    /// A request is in flight.
    Running,
    /// The last action succeeded.
    Success,
    /// The last action failed.
    Error,
    /// Neutral information.
    Info,
}

/// Payload for the `status` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Short status text.
    pub text: String,
    /// How the status should be presented.
    pub level: StatusLevel,
}

/// Payload for the `output` and `feedback` events. Replaces the panel content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelPayload {
    /// The full panel text.
    pub text: String,
}

/// Payload for the `problem` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemPayload {
    /// The lesson the statement belongs to.
    pub lesson_id: String,
    /// Title line for the lesson panel.
    pub title: String,
    /// Problem statement in markdown.
    pub markdown: String,
}

/// Payload for the `progress` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Number of completed lessons.
    pub completed: usize,
    /// Number of lessons in the course.
    pub total: usize,
    /// Rounded completion percentage.
    pub percentage: u32,
}

/// Payload for the `navigation` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationPayload {
    /// The committed current lesson.
    pub current_lesson: String,
    /// Whether "previous" is enabled.
    pub previous_enabled: bool,
    /// Label for the "previous" control.
    pub previous_label: String,
    /// Whether "next" is enabled.
    pub next_enabled: bool,
    /// Label for the "next" control.
    pub next_label: String,
}

/// Payload for the `run_finished` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFinishedPayload {
    /// Whether the backend reported success.
    pub success: bool,
    /// Client-measured round trip, in milliseconds.
    pub elapsed_ms: u64,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events published to the UI.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum UiEvent {
    /// Status line update.
    Status(StatusPayload),
    /// Replace the output panel.
    Output(PanelPayload),
    /// Replace the feedback panel.
    Feedback(PanelPayload),
    /// Replace the problem panel.
    Problem(ProblemPayload),
    /// Progress bar refresh.
    Progress(ProgressPayload),
    /// Show or hide the interactive canvas panel.
    Canvas(bool),
    /// Class diagram for lessons with an interactive canvas.
    ClassDiagram(ClassGraph),
    /// Whether "re-run with different inputs" is offered.
    RerunAvailable(bool),
    /// Navigation control state.
    Navigation(NavigationPayload),
    /// A run request completed (successfully or not).
    RunFinished(RunFinishedPayload),
}

impl UiEvent {
    /// Creates a `Status` event.
    #[must_use]
    pub fn status(text: impl Into<String>, level: StatusLevel) -> Self {
        Self::Status(StatusPayload {
            text: text.into(),
            level,
        })
    }

    /// Creates an `Output` event.
    #[must_use]
    pub fn output(text: impl Into<String>) -> Self {
        Self::Output(PanelPayload { text: text.into() })
    }

    /// Creates a `Feedback` event.
    #[must_use]
    pub fn feedback(text: impl Into<String>) -> Self {
        Self::Feedback(PanelPayload { text: text.into() })
    }

    /// Creates a `Problem` event.
    #[must_use]
    pub fn problem(
        lesson_id: impl Into<String>,
        title: impl Into<String>,
        markdown: impl Into<String>,
    ) -> Self {
        Self::Problem(ProblemPayload {
            lesson_id: lesson_id.into(),
            title: title.into(),
            markdown: markdown.into(),
        })
    }

    /// Creates a `RunFinished` event stamped with the current time.
    #[must_use]
    pub fn run_finished(success: bool, elapsed_ms: u64) -> Self {
        Self::RunFinished(RunFinishedPayload {
            success,
            elapsed_ms,
            timestamp: Utc::now(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Output(_) => "output",
            Self::Feedback(_) => "feedback",
            Self::Problem(_) => "problem",
            Self::Progress(_) => "progress",
            Self::Canvas(_) => "canvas",
            Self::ClassDiagram(_) => "class_diagram",
            Self::RerunAvailable(_) => "rerun_available",
            Self::Navigation(_) => "navigation",
            Self::RunFinished(_) => "run_finished",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts UI events to every subscriber.
///
/// Uses a tokio broadcast channel for pub-sub event distribution.
/// Events are not retained for subscribers that join later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<UiEvent>,
}

impl EventBroadcaster {
    /// Creates a new `EventBroadcaster` with the specified buffer capacity.
    ///
    /// The buffer determines how many events can be queued per subscriber
    /// before old events are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber for receiving events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event to all subscribers.
    ///
    /// Returns the number of receivers that will see the event; 0 means
    /// nobody is listening, which is not an error.
    pub fn send(&self, event: UiEvent) -> usize {
        tracing::trace!(event = event.event_name(), "Publishing UI event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Drains every event currently buffered in `receiver`.
///
/// Handy for hosts that render after an action completes rather than
/// streaming.
pub fn drain(receiver: &mut broadcast::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "UI subscriber lagged; events dropped");
            }
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Event tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_event_serialization_shape() {
        let event = UiEvent::status("Running...", StatusLevel::Running);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "status");
        assert_eq!(json["payload"]["text"], "Running...");
        assert_eq!(json["payload"]["level"], "running");
    }

    #[test]
    fn test_problem_payload_is_camel_case() {
        let event = UiEvent::problem("01", "Lesson 01", "# Hi");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "problem");
        assert_eq!(json["payload"]["lessonId"], "01");
    }

    #[test]
    fn test_event_names() {
        assert_eq!(UiEvent::output("").event_name(), "output");
        assert_eq!(UiEvent::feedback("").event_name(), "feedback");
        assert_eq!(UiEvent::Canvas(true).event_name(), "canvas");
        assert_eq!(UiEvent::RerunAvailable(false).event_name(), "rerun_available");
        assert_eq!(UiEvent::run_finished(true, 5).event_name(), "run_finished");
    }

    // ------------------------------------------------------------------------
    // Broadcaster tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_broadcaster_send_receive() {
        let broadcaster = EventBroadcaster::new(10);
        let mut receiver = broadcaster.subscribe();

        let count = broadcaster.send(UiEvent::output("hello"));
        assert_eq!(count, 1);

        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, UiEvent::Output(ref p) if p.text == "hello"));
    }

    #[test]
    fn test_broadcaster_no_subscribers() {
        let broadcaster = EventBroadcaster::new(10);
        assert_eq!(broadcaster.send(UiEvent::Canvas(false)), 0);
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[test]
    fn test_drain_collects_buffered_events() {
        let broadcaster = EventBroadcaster::default();
        let mut receiver = broadcaster.subscribe();

        broadcaster.send(UiEvent::output("a"));
        broadcaster.send(UiEvent::feedback("b"));

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 2);
        assert!(drain(&mut receiver).is_empty());
    }
}
