//! Job scheduler binary (§4.6): one tick or a forever loop, selected by
//! `SCHEDULER_MODE`.

use automation_core::config::{Config, RunMode};
use automation_core::control_plane::ControlPlaneClient;
use automation_core::scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    automation_core::logging::init_default_tracing();

    let config = Config::from_env()?;
    let client = ControlPlaneClient::new(
        config.api_base_url.clone(),
        config.automation_service_token.clone(),
    );

    match config.scheduler.mode {
        RunMode::Once => scheduler::run_once(&config, &client).await,
        RunMode::Loop => scheduler::run_loop(&config, &client, config.scheduler.interval).await,
    }

    Ok(())
}
