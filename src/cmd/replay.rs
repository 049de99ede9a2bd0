//! Offline rendering of captured frames — `yago replay`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

use yago::channel::{ConnectionState, Decoded, SessionViewModel, decode_frame};
use yago::config::YagoConfig;
use yago::session::{SessionOutcome, SessionSnapshot};
use yago::ui::{SessionUI, UiMode};

use crate::Cli;

/// Feed every line of `file` through the decoder and reducer and render the
/// result as if it had arrived live.
pub fn cmd_replay(
    cli: &Cli,
    project_dir: PathBuf,
    file: &Path,
    ui: Option<&str>,
) -> Result<SessionOutcome> {
    let config =
        YagoConfig::with_cli_args(project_dir, cli.verbose, None, ui.map(UiMode::parse))?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read frame file: {}", file.display()))?;

    let label = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "replay".to_string());
    let mut view = SessionUI::new(&label, config.ui_mode(), config.verbose);
    let mut snapshot = SessionSnapshot {
        model: SessionViewModel::with_log_cap(config.max_log_entries()),
        connection: ConnectionState::Connected,
        last_transport_error: None,
    };

    let mut frames = 0usize;
    let mut malformed = 0usize;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        frames += 1;
        match decode_frame(line) {
            Decoded::Event(event) => {
                snapshot.model.apply(&event);
                view.render(&snapshot);
            }
            Decoded::Malformed(frame) => {
                malformed += 1;
                warn!(line = index + 1, reason = %frame.reason, frame = %frame.excerpt, "dropping malformed frame");
            }
        }
    }

    let outcome = match snapshot.model.outcome() {
        Some(true) => SessionOutcome::Succeeded,
        Some(false) => SessionOutcome::Failed,
        None => SessionOutcome::Ended,
    };
    snapshot.connection = ConnectionState::Closed;
    view.render(&snapshot);
    view.finish(outcome, &snapshot);

    if config.ui_mode() != UiMode::Json {
        println!(
            "Replayed {} frames ({} malformed, {} ignored after completion)",
            frames, malformed, snapshot.model.anomalies
        );
    }
    Ok(outcome)
}
