//! Session state reducer.
//!
//! Folds decoded [`Event`]s, in receipt order, into a single
//! [`SessionViewModel`]. All ordering and consistency policy lives here:
//!
//! | Event        | Before terminal                                   | After terminal |
//! |--------------|---------------------------------------------------|----------------|
//! | `Progress`   | status/message replaced, `percent = max(old, new)` | ignored        |
//! | `Log`        | appended in receipt order                          | ignored        |
//! | `Error`      | `status = "error"`, message replaced, log kept     | ignored        |
//! | `Completion` | `terminal` set, `percent = 100` on success         | ignored        |
//!
//! Ignored events are counted as anomalies and logged at debug level.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::event::{Event, LogEvent};

/// Status shown before the first event arrives.
pub const INITIAL_STATUS: &str = "connecting";

/// Status set by an application error event.
pub const ERROR_STATUS: &str = "error";

/// Frozen end state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Terminal {
    pub success: bool,
    pub result: Value,
}

/// What applying one event did to the view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    IgnoredAfterTerminal,
}

/// The single reduced state that presentation consumers read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionViewModel {
    pub percent: u8,
    pub status: String,
    pub message: String,
    /// Accepted log lines, oldest first.
    pub log: VecDeque<LogEvent>,
    pub terminal: Option<Terminal>,
    /// Log events accepted so far, including any evicted by the cap.
    pub log_appended: u64,
    /// Log events evicted because of `max_log_entries`.
    pub log_dropped: u64,
    /// Events that arrived after the terminal state and were ignored.
    pub anomalies: u64,
    #[serde(skip)]
    max_log_entries: Option<usize>,
}

impl Default for SessionViewModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionViewModel {
    /// Fresh view model with an unbounded log.
    pub fn new() -> Self {
        Self {
            percent: 0,
            status: INITIAL_STATUS.to_string(),
            message: String::new(),
            log: VecDeque::new(),
            terminal: None,
            log_appended: 0,
            log_dropped: 0,
            anomalies: 0,
            max_log_entries: None,
        }
    }

    /// Fresh view model whose log keeps at most `max` entries (oldest evicted).
    /// `None` or `Some(0)` means unbounded.
    pub fn with_log_cap(max: Option<usize>) -> Self {
        Self {
            max_log_entries: max.filter(|m| *m > 0),
            ..Self::new()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// `Some(true)` after a successful completion, `Some(false)` after a
    /// failed one, `None` while the session is running.
    pub fn outcome(&self) -> Option<bool> {
        self.terminal.as_ref().map(|t| t.success)
    }

    pub fn log_cap(&self) -> Option<usize> {
        self.max_log_entries
    }

    /// Apply one event in place.
    pub fn apply(&mut self, event: &Event) -> Applied {
        if self.terminal.is_some() {
            self.anomalies += 1;
            debug!(
                kind = event.kind(),
                anomalies = self.anomalies,
                "ignoring event after terminal state"
            );
            return Applied::IgnoredAfterTerminal;
        }

        match event {
            Event::Progress(progress) => {
                self.status = progress.status.clone();
                self.message = progress.message.clone();
                self.percent = self.percent.max(progress.percent);
            }
            Event::Log(line) => self.push_log(line.clone()),
            Event::Error(error) => {
                self.status = ERROR_STATUS.to_string();
                self.message = error.message.clone();
            }
            Event::Completion(completion) => {
                if completion.success {
                    self.percent = 100;
                }
                self.terminal = Some(Terminal {
                    success: completion.success,
                    result: completion.result.clone(),
                });
            }
        }
        Applied::Updated
    }

    /// Log entries accepted since `seen` (a previous `log_appended` value)
    /// that are still retained.
    pub fn log_since(&self, seen: u64) -> impl Iterator<Item = &LogEvent> {
        let fresh = self.log_appended.saturating_sub(seen);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(self.log.len());
        self.log.iter().skip(self.log.len() - fresh)
    }

    fn push_log(&mut self, line: LogEvent) {
        if let Some(max) = self.max_log_entries
            && self.log.len() >= max
        {
            self.log.pop_front();
            self.log_dropped += 1;
        }
        self.log.push_back(line);
        self.log_appended += 1;
    }
}

/// Pure reducer: `(state, event) -> state`.
pub fn reduce(mut state: SessionViewModel, event: &Event) -> SessionViewModel {
    state.apply(event);
    state
}
