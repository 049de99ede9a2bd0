//! Configuration view and validation commands — `yago config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use yago::config::{CONFIG_DIR, CONFIG_FILE, YagoConfig, YagoToml};

    let yago_dir = project_dir.join(CONFIG_DIR);
    let config_path = yago_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Yago Configuration");
            println!("==================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                YagoToml::load(&config_path)?
            } else {
                println!("No yago.toml found at {}", config_path.display());
                println!("Using default configuration.");
                YagoToml::default()
            };
            println!();

            println!("[backend]");
            println!("  url = \"{}\"", toml.backend.url);
            println!();

            println!("[connection]");
            println!(
                "  connect_timeout_secs = {}",
                toml.connection.connect_timeout_secs
            );
            println!(
                "  heartbeat_interval_secs = {}",
                toml.connection.heartbeat_interval_secs
            );
            println!("  idle_timeout_secs = {}", toml.connection.idle_timeout_secs);
            println!("  probe_on_connect = {}", toml.connection.probe_on_connect);
            println!();

            println!("[reconnect]");
            println!("  enabled = {}", toml.reconnect.enabled);
            println!("  max_attempts = {}", toml.reconnect.max_attempts);
            println!("  initial_delay_ms = {}", toml.reconnect.initial_delay_ms);
            println!("  max_delay_ms = {}", toml.reconnect.max_delay_ms);
            println!();

            println!("[session]");
            println!("  max_log_entries = {}", toml.session.max_log_entries);
            println!("  ui = \"{}\"", toml.session.ui);
            println!();

            if let Some(file) = &toml.logging.file {
                println!("[logging]");
                println!("  file = \"{}\"", file.display());
                println!();
            }

            // Effective values (including env overrides)
            println!("Effective values (with env overrides):");
            let config = YagoConfig::new(project_dir.to_path_buf())?;
            let settings = config.connection_settings();
            println!("  backend_url = \"{}\"", config.backend_url());
            println!("  connect_timeout = {:?}", settings.connect_timeout);
            println!("  max_attempts = {}", settings.reconnect.max_attempts);
            println!();

            if !config_path.exists() {
                println!("Run 'yago config init' to create a yago.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No yago.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = YagoToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("yago.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !yago_dir.exists() {
                std::fs::create_dir_all(&yago_dir)?;
            }

            let toml = YagoToml::default();
            toml.save(&config_path)?;

            println!("Created yago.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [backend] url");
            println!("  - [connection] timeouts and heartbeat");
            println!("  - [reconnect] backoff and retry budget");
            println!("  - [session] max_log_entries, ui");
            println!();
        }
    }

    Ok(())
}
