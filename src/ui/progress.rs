//! Terminal renderer for one live session.
//!
//! [`SessionUI`] is a pure function of the published [`SessionSnapshot`]: each
//! call to [`SessionUI::render`] diffs the snapshot against what was already
//! shown and emits only the changes. Output modes:
//! - `full`: progress bar with status line, log lines with level icons
//! - `minimal`: plain lines for status changes and log entries
//! - `json`: one JSON object per change, for machine consumption

use std::io::Write;

use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use serde_json::Value;

use crate::channel::reducer::INITIAL_STATUS;
use crate::channel::{ConnectionState, LogLevel};
use crate::errors::TransportError;
use crate::session::{SessionOutcome, SessionSnapshot};
use crate::ui::icons::{CHECK, CROSS, INFO, LINK, PIVOT, SPARKLE, UNPLUGGED, WARNING};

/// Output mode for the session UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Rich terminal UI with a progress bar
    #[default]
    Full,
    /// Single-line status updates
    Minimal,
    /// JSON-formatted changes
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    /// Parse UI mode from string (convenience method).
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// One visible change between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Connection {
        state: ConnectionState,
    },
    Progress {
        percent: u8,
        status: String,
        message: String,
    },
    Log {
        level: LogLevel,
        text: String,
        timestamp: String,
    },
    Completion {
        success: bool,
        result: Value,
    },
    TransportError {
        message: String,
    },
}

/// Tracks what has already been shown.
#[derive(Debug, Default)]
pub struct SnapshotDiff {
    connection: Option<ConnectionState>,
    progress: Option<(u8, String, String)>,
    log_seen: u64,
    terminal_seen: bool,
}

impl SnapshotDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes in `snap` not yet reported, in display order.
    pub fn diff(&mut self, snap: &SessionSnapshot) -> Vec<UiEvent> {
        let mut events = Vec::new();
        let model = &snap.model;

        if self.connection != Some(snap.connection) {
            self.connection = Some(snap.connection);
            events.push(UiEvent::Connection {
                state: snap.connection,
            });
        }

        for line in model.log_since(self.log_seen) {
            events.push(UiEvent::Log {
                level: line.level,
                text: line.text.clone(),
                timestamp: line.timestamp.clone(),
            });
        }
        self.log_seen = model.log_appended;

        let progress = (model.percent, model.status.clone(), model.message.clone());
        let initial = model.percent == 0
            && model.status == INITIAL_STATUS
            && model.message.is_empty()
            && model.log_appended == 0;
        if self.progress.as_ref() != Some(&progress) && !(self.progress.is_none() && initial) {
            events.push(UiEvent::Progress {
                percent: progress.0,
                status: progress.1.clone(),
                message: progress.2.clone(),
            });
            self.progress = Some(progress);
        }

        if let Some(terminal) = &model.terminal
            && !self.terminal_seen
        {
            self.terminal_seen = true;
            events.push(UiEvent::Completion {
                success: terminal.success,
                result: terminal.result.clone(),
            });
        }

        events
    }
}

/// Terminal UI for a watched session.
pub struct SessionUI {
    mode: UiMode,
    multi: MultiProgress,
    bar: ProgressBar,
    diff: SnapshotDiff,
    verbose: bool,
    term: Term,
}

impl SessionUI {
    /// Create the UI. In `full` mode a progress bar is added immediately.
    pub fn new(session: &str, mode: UiMode, verbose: bool) -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stdout());
        let bar = if mode == UiMode::Full {
            let bar_style = ProgressStyle::default_bar()
                .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .expect("progress bar template is a valid static string")
                .progress_chars("█▓▒░");
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(bar_style);
            bar.set_prefix(session.to_string());
            bar.set_message(style("connecting...").dim().to_string());
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            mode,
            multi,
            bar,
            diff: SnapshotDiff::new(),
            verbose,
            term: Term::stdout(),
        }
    }

    /// Render whatever changed since the previous call.
    pub fn render(&mut self, snap: &SessionSnapshot) {
        for event in self.diff.diff(snap) {
            self.show(&event);
        }
    }

    /// Show a transport failure. Never touches the view model.
    pub fn transport_error(&self, err: &TransportError) {
        self.show(&UiEvent::TransportError {
            message: err.to_string(),
        });
    }

    /// Final summary line.
    pub fn finish(&self, outcome: SessionOutcome, snap: &SessionSnapshot) {
        match self.mode {
            UiMode::Json => {}
            UiMode::Minimal => {
                let _ = writeln!(&self.term, "Done: {}", outcome_label(outcome));
            }
            UiMode::Full => {
                let label = match outcome {
                    SessionOutcome::Succeeded => {
                        format!("{} {}", CHECK, style("Session complete").green().bold())
                    }
                    SessionOutcome::Failed => {
                        format!("{} {}", CROSS, style("Session failed").red().bold())
                    }
                    SessionOutcome::GaveUp => format!(
                        "{} {}",
                        UNPLUGGED,
                        style("Lost connection to backend").red().bold()
                    ),
                    SessionOutcome::Ended => {
                        format!("{} {}", UNPLUGGED, style("Stopped watching").yellow())
                    }
                };
                self.bar.finish_with_message(label);
                if snap.model.log_dropped > 0 {
                    self.print_line(format!(
                        "  {} older log lines were not kept",
                        style(snap.model.log_dropped).dim()
                    ));
                }
                if snap.model.anomalies > 0 && self.verbose {
                    self.print_line(format!(
                        "  {} events arrived after completion and were ignored",
                        style(snap.model.anomalies).dim()
                    ));
                }
            }
        }
    }

    /// Print a line via `MultiProgress`, falling back to `println!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            println!("{}", msg.as_ref());
        }
    }

    fn show(&self, event: &UiEvent) {
        match self.mode {
            UiMode::Json => self.show_json(event),
            UiMode::Minimal => self.show_minimal(event),
            UiMode::Full => self.show_full(event),
        }
    }

    fn show_json(&self, event: &UiEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    fn show_minimal(&self, event: &UiEvent) {
        let line = match event {
            UiEvent::Connection { state } => format!("[{}]", state),
            UiEvent::Progress {
                percent,
                status,
                message,
            } => format!("{:>3}% {} {}", percent, status, message),
            UiEvent::Log { level, text, .. } => format!("{}: {}", level, text),
            UiEvent::Completion { success, .. } => {
                format!("completion: {}", if *success { "ok" } else { "failed" })
            }
            UiEvent::TransportError { message } => format!("transport: {}", message),
        };
        let _ = writeln!(&self.term, "{}", line.trim_end());
    }

    fn show_full(&self, event: &UiEvent) {
        match event {
            UiEvent::Connection { state } => self.on_connection(*state),
            UiEvent::Progress {
                percent,
                status,
                message,
            } => {
                self.bar.set_position(u64::from(*percent));
                let status = if status == crate::channel::reducer::ERROR_STATUS {
                    style(status.as_str()).red().bold()
                } else {
                    style(status.as_str()).yellow()
                };
                if message.is_empty() {
                    self.bar.set_message(status.to_string());
                } else {
                    self.bar.set_message(format!("{}: {}", status, message));
                }
            }
            UiEvent::Log { level, text, .. } => {
                let line = match level {
                    LogLevel::Info => format!("  {}{}", INFO, text),
                    LogLevel::Warning => format!("  {}{}", WARNING, style(text).yellow()),
                    LogLevel::Error => format!("  {}{}", CROSS, style(text).red()),
                    LogLevel::Success => format!("  {}{}", SPARKLE, style(text).green()),
                };
                self.print_line(line);
            }
            UiEvent::Completion { success, result } => {
                if *success {
                    self.bar.set_position(100);
                }
                if self.verbose && !result.is_null() {
                    self.print_line(format!("  {} {}", style("result:").dim(), result));
                }
            }
            UiEvent::TransportError { message } => {
                self.print_line(format!(
                    "  {} {}",
                    UNPLUGGED,
                    style(message.as_str()).red()
                ));
            }
        }
    }

    fn on_connection(&self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                self.print_line(format!("{} {}", LINK, style("connected").green()));
            }
            ConnectionState::Reconnecting => {
                self.print_line(format!("{} {}", PIVOT, style("reconnecting...").yellow()));
            }
            ConnectionState::Disconnected | ConnectionState::Closed => {
                if self.verbose {
                    self.print_line(format!("{} {}", UNPLUGGED, style(state).dim()));
                }
            }
            ConnectionState::Connecting => {}
        }
    }
}

fn outcome_label(outcome: SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Succeeded => "success",
        SessionOutcome::Failed => "failed",
        SessionOutcome::GaveUp => "disconnected",
        SessionOutcome::Ended => "stopped",
    }
}
