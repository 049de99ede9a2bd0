//! Typed events decoded from live channel frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SessionIdError;

/// Opaque key naming the backend task whose events are observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Build a session id, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionIdError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(SessionIdError::Empty);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form for use inside an endpoint URL.
    pub fn url_encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Severity of a log line streamed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    /// Parse a wire level. Unknown levels fall back to `Info`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            "success" => LogLevel::Success,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Success => write!(f, "success"),
        }
    }
}

/// Progress report. `percent` is always within `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub status: String,
    pub message: String,
}

/// One log line. `timestamp` is ISO-8601 and for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub text: String,
    pub level: LogLevel,
    pub timestamp: String,
}

/// Application-level error reported by the backend. Not terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// Final outcome of the backend task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub success: bool,
    pub result: Value,
}

/// Closed set of events a live channel can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Progress(ProgressEvent),
    Log(LogEvent),
    Error(ErrorEvent),
    Completion(CompletionEvent),
}

impl Event {
    /// Short name of the event class, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Progress(_) => "progress",
            Event::Log(_) => "log",
            Event::Error(_) => "error",
            Event::Completion(_) => "completion",
        }
    }

    pub fn progress(percent: u8, status: &str, message: &str) -> Self {
        Event::Progress(ProgressEvent {
            percent: percent.min(100),
            status: status.to_string(),
            message: message.to_string(),
        })
    }

    pub fn log(text: &str, level: LogLevel) -> Self {
        Event::Log(LogEvent {
            text: text.to_string(),
            level,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn error(message: &str) -> Self {
        Event::Error(ErrorEvent {
            message: message.to_string(),
        })
    }

    pub fn completion(success: bool, result: Value) -> Self {
        Event::Completion(CompletionEvent { success, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_rejects_blank() {
        assert_eq!(SessionId::new(""), Err(SessionIdError::Empty));
        assert_eq!(SessionId::new("   "), Err(SessionIdError::Empty));
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_keeps_raw_value() {
        let id = SessionId::new("proj-42").unwrap();
        assert_eq!(id.as_str(), "proj-42");
        assert_eq!(id.to_string(), "proj-42");
    }

    #[test]
    fn test_session_id_url_encoding() {
        let id = SessionId::new("team a/run#1").unwrap();
        assert_eq!(id.url_encoded(), "team%20a%2Frun%231");
    }

    #[test]
    fn test_log_level_from_wire() {
        assert_eq!(LogLevel::from_wire("info"), LogLevel::Info);
        assert_eq!(LogLevel::from_wire("WARNING"), LogLevel::Warning);
        assert_eq!(LogLevel::from_wire("warn"), LogLevel::Warning);
        assert_eq!(LogLevel::from_wire("error"), LogLevel::Error);
        assert_eq!(LogLevel::from_wire("success"), LogLevel::Success);
        assert_eq!(LogLevel::from_wire("verbose"), LogLevel::Info);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_string(&Event::progress(40, "executing", "halfway")).unwrap();
        assert!(json.contains(r#""kind":"progress""#));
        assert!(json.contains(r#""percent":40"#));
    }

    #[test]
    fn test_progress_constructor_clamps() {
        match Event::progress(250, "s", "m") {
            Event::Progress(p) => assert_eq!(p.percent, 100),
            _ => panic!("Expected Progress"),
        }
    }
}
