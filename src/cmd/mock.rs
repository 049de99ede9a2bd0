//! Scripted backend — `yago mock-backend`.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use yago::mock::{MockBackend, MockScript};

pub async fn cmd_mock_backend(port: u16, script: &Path, delay_ms: u64) -> Result<()> {
    let script = MockScript::load(script)?;
    if script.is_empty() {
        anyhow::bail!("Script has no frames");
    }
    let frames = script.len();

    let mut backend = MockBackend::new(script, Duration::from_millis(delay_ms));
    let template = backend.start(port).await?;

    println!("Mock backend listening on {}", template);
    println!("Replaying {} frames per connection, {}ms apart.", frames, delay_ms);
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    backend.stop();
    println!("Mock backend stopped.");
    Ok(())
}
