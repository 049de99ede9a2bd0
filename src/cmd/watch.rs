//! Live session view — `yago watch`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use yago::channel::{LiveChannel, SessionId};
use yago::config::YagoConfig;
use yago::session::{ModelPublisher, SessionOutcome};
use yago::ui::{SessionUI, UiMode};

use crate::Cli;

/// Watch one session until it completes, the transport gives up, or the
/// user interrupts.
pub async fn cmd_watch(
    cli: &Cli,
    project_dir: PathBuf,
    session_id: &str,
    url: Option<String>,
    ui: Option<&str>,
) -> Result<SessionOutcome> {
    let config =
        YagoConfig::with_cli_args(project_dir, cli.verbose, url, ui.map(UiMode::parse))?;
    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }

    let session = SessionId::new(session_id).context("Invalid session id")?;
    let mut view = SessionUI::new(session.as_str(), config.ui_mode(), config.verbose);
    let (publisher, mut watch) = ModelPublisher::new(config.max_log_entries());

    let mut channel = LiveChannel::websocket(config.backend_url(), config.connection_settings());
    let handle = channel
        .open_session(session.clone(), publisher)
        .context("Failed to open live channel")?;

    let outcome = tokio::select! {
        outcome = watch.settled(|snapshot, errors| {
            for err in errors {
                view.transport_error(err);
            }
            view.render(snapshot);
        }) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!(session = %session, "interrupted, closing channel");
            SessionOutcome::Ended
        }
    };

    channel.close(&handle);
    while let Some(err) = watch.try_transport_error() {
        view.transport_error(&err);
    }
    let snapshot = watch.snapshot();
    view.render(&snapshot);
    view.finish(outcome, &snapshot);

    info!(session = %session, outcome = ?outcome, "watch finished");
    Ok(outcome)
}
