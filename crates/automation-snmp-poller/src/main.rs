//! SNMP poller binary (§4.7): one tick or a forever loop, selected by
//! `SNMP_POLLER_MODE`.

use automation_core::config::{Config, RunMode};
use automation_core::control_plane::ControlPlaneClient;
use automation_core::snmp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    automation_core::logging::init_default_tracing();

    let config = Config::from_env()?;
    let client = ControlPlaneClient::new(
        config.api_base_url.clone(),
        config.automation_service_token.clone(),
    );

    match config.snmp_poller.mode {
        RunMode::Once => snmp::run_once(&client, &config.snmp_poller).await,
        RunMode::Loop => snmp::run_loop(&client, &config.snmp_poller, config.snmp_poller.interval).await,
    }

    Ok(())
}
