//! Orchestrator event stream.
//!
//! Every mode transition, gate decision, and trade signal is rendered as a
//! `UiEvent`. The stream is the authoritative audit log of a session.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::Timestamp;

/// Event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Informational.
    Info,
    /// A check passed or an operation succeeded.
    Ok,
    /// A check failed or degraded behavior was observed.
    Warn,
    /// An operation failed.
    Error,
}

impl EventLevel {
    /// Returns the level as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Mode state machine transition.
    Mode,
    /// Gate evaluation outcome.
    Gate,
    /// Drift detection (consecutive losses).
    Drift,
    /// Redline (daily loss hard stop).
    Redline,
    /// Trade decision or fill.
    Trade,
    /// Everything else (startup, refresh, diagnostics).
    System,
}

impl EventKind {
    /// Returns the kind as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::Gate => "gate",
            Self::Drift => "drift",
            Self::Redline => "redline",
            Self::Trade => "trade",
            Self::System => "system",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the orchestrator's audit stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiEvent {
    /// Unique event id.
    pub id: Uuid,
    /// Emission timestamp.
    pub ts: Timestamp,
    /// Severity level.
    pub level: EventLevel,
    /// Event category.
    pub kind: EventKind,
    /// Human-readable message.
    pub message: String,
}

impl UiEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(level: EventLevel, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts: Timestamp::now(),
            level,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.level, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_new() {
        let event = UiEvent::new(EventLevel::Warn, EventKind::Gate, "gate #1 failed");
        assert_eq!(event.level, EventLevel::Warn);
        assert_eq!(event.kind, EventKind::Gate);
        assert!(event.ts.as_millis() > 0);
    }

    #[test]
    fn test_event_ids_unique() {
        let a = UiEvent::new(EventLevel::Info, EventKind::System, "a");
        let b = UiEvent::new(EventLevel::Info, EventKind::System, "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_event_serde_names() {
        let event = UiEvent::new(EventLevel::Ok, EventKind::Redline, "resumed");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"level\":\"ok\""));
        assert!(json.contains("\"kind\":\"redline\""));
    }

    #[test]
    fn test_event_display() {
        let event = UiEvent::new(EventLevel::Error, EventKind::Mode, "paused");
        let rendered = format!("{event}");
        assert!(rendered.contains("[error] mode paused"));
    }
}
