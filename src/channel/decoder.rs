//! Frame decoder: raw JSON text frames in, typed [`Event`]s out.
//!
//! Decoding is a pure function of one frame. Malformed frames become a
//! [`Decoded::Malformed`] sentinel instead of an error so that nothing is
//! ever thrown into consumer code.

use serde::Deserialize;
use serde_json::Value;

use super::event::{CompletionEvent, ErrorEvent, Event, LogEvent, LogLevel, ProgressEvent};

/// Longest frame excerpt kept in a [`MalformedFrame`] for diagnostics.
const EXCERPT_LEN: usize = 120;

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(Event),
    Malformed(MalformedFrame),
}

impl Decoded {
    pub fn into_event(self) -> Option<Event> {
        match self {
            Decoded::Event(event) => Some(event),
            Decoded::Malformed(_) => None,
        }
    }
}

/// A frame that could not be turned into an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedFrame {
    pub reason: String,
    pub excerpt: String,
}

impl MalformedFrame {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: excerpt(raw),
        }
    }
}

impl std::fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (frame: {})", self.reason, self.excerpt)
    }
}

/// Wire shape of inbound frames, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame {
    Progress {
        #[serde(default)]
        percent: Option<f64>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Log {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    Completion {
        success: bool,
        #[serde(default)]
        data: Value,
    },
}

/// Decode one text frame.
pub fn decode_frame(raw: &str) -> Decoded {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => decode_with_excerpt(&value, raw),
        Err(e) => Decoded::Malformed(MalformedFrame::new(format!("invalid JSON: {}", e), raw)),
    }
}

/// Decode one already-parsed frame.
pub fn decode_value(value: &Value) -> Decoded {
    decode_with_excerpt(value, &value.to_string())
}

fn decode_with_excerpt(value: &Value, raw: &str) -> Decoded {
    let Some(object) = value.as_object() else {
        return Decoded::Malformed(MalformedFrame::new("frame is not a JSON object", raw));
    };
    match object.get("type") {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Decoded::Malformed(MalformedFrame::new("event type tag is not a string", raw));
        }
        None => return Decoded::Malformed(MalformedFrame::new("missing event type tag", raw)),
    }

    match WireFrame::deserialize(value) {
        Ok(frame) => Decoded::Event(into_event(frame)),
        Err(e) => Decoded::Malformed(MalformedFrame::new(e.to_string(), raw)),
    }
}

fn into_event(frame: WireFrame) -> Event {
    match frame {
        WireFrame::Progress {
            percent,
            status,
            message,
        } => Event::Progress(ProgressEvent {
            percent: clamp_percent(percent.unwrap_or(0.0)),
            status: status.unwrap_or_default(),
            message: message.unwrap_or_default(),
        }),
        WireFrame::Log {
            message,
            level,
            timestamp,
        } => Event::Log(LogEvent {
            text: message.unwrap_or_default(),
            level: level.as_deref().map(LogLevel::from_wire).unwrap_or_default(),
            timestamp: timestamp.unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        }),
        WireFrame::Error { message } => Event::Error(ErrorEvent {
            message: message.unwrap_or_default(),
        }),
        WireFrame::Completion { success, data } => Event::Completion(CompletionEvent {
            success,
            result: data,
        }),
    }
}

/// Clamp a wire percentage into `0..=100`, rounding fractional values.
pub fn clamp_percent(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn excerpt(raw: &str) -> String {
    if raw.chars().count() <= EXCERPT_LEN {
        raw.to_string()
    } else {
        let cut: String = raw.chars().take(EXCERPT_LEN - 3).collect();
        format!("{}...", cut)
    }
}
