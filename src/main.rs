use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use yago::config::{CONFIG_DIR, YagoToml};

mod cmd;

#[derive(Parser)]
#[command(name = "yago")]
#[command(version, about = "Watch YAGO backend sessions live: progress, logs and results")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Also write diagnostic logs to this file. Overrides yago.toml [logging] file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a live channel to a session and render it until it finishes
    Watch {
        /// Session identifier of the backend task
        session_id: String,

        /// Endpoint template, `{session}` is replaced by the session id
        #[arg(long)]
        url: Option<String>,

        /// UI output mode: full, minimal, json
        #[arg(long)]
        ui: Option<String>,
    },
    /// Render a captured JSON-lines frame file offline
    Replay {
        /// File with one frame per line
        file: PathBuf,

        /// UI output mode: full, minimal, json
        #[arg(long)]
        ui: Option<String>,
    },
    /// Serve a scripted backend that replays frames to every client
    MockBackend {
        /// Port to serve on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// JSON-lines script of frames to replay
        #[arg(long)]
        script: PathBuf,

        /// Delay between frames in milliseconds
        #[arg(long, default_value = "250")]
        delay_ms: u64,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default yago.toml file
    Init,
}

/// `--log-file` wins over the `[logging] file` setting.
fn resolve_log_file(cli: &Cli, project_dir: &Path) -> Option<PathBuf> {
    if let Some(path) = &cli.log_file {
        return Some(path.clone());
    }
    let toml = YagoToml::load_or_default(&project_dir.join(CONFIG_DIR)).ok()?;
    toml.logging.file.map(|file| {
        if file.is_absolute() {
            file
        } else {
            project_dir.join(file)
        }
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_file = resolve_log_file(&cli, &project_dir);
    let _logging = yago::logging::init(cli.verbose, log_file.as_deref())?;

    match &cli.command {
        Commands::Watch {
            session_id,
            url,
            ui,
        } => {
            let outcome =
                cmd::cmd_watch(&cli, project_dir, session_id, url.clone(), ui.as_deref()).await?;
            return Ok(ExitCode::from(outcome.exit_code() as u8));
        }
        Commands::Replay { file, ui } => {
            let outcome = cmd::cmd_replay(&cli, project_dir, file, ui.as_deref())?;
            return Ok(ExitCode::from(outcome.exit_code() as u8));
        }
        Commands::MockBackend {
            port,
            script,
            delay_ms,
        } => {
            cmd::cmd_mock_backend(*port, script, *delay_ms).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(ExitCode::SUCCESS)
}
