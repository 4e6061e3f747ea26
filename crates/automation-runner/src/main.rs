//! Single-shot backup runner binary: backs up exactly one device, named
//! entirely by environment variables (§6), then exits.

use automation_core::adapters::{default_registry, resolve_adapter};
use automation_core::config::{Config, SingleShotDevice};
use automation_core::control_plane::ControlPlaneClient;
use automation_core::models::DeviceConnectionInfo;
use automation_core::runner;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    automation_core::logging::init_default_tracing();

    let config = Config::from_env()?;
    let device_env = SingleShotDevice::from_env()?;

    let device = DeviceConnectionInfo {
        device_id: device_env.device_id,
        tenant_id: device_env.tenant_id,
        hostname: device_env.hostname,
        ip_address: device_env.ip_address,
        port: device_env.ssh_port,
        username: device_env.username,
        password: device_env.password,
        secret: None,
        timeout: config.device_timeout_seconds,
    };
    device.validate_all()?;

    let client = ControlPlaneClient::new(
        config.api_base_url.clone(),
        config.automation_service_token.clone(),
    );
    let registry = default_registry();
    let adapter = resolve_adapter(&registry, &device_env.vendor);

    let result = runner::run_backup(
        adapter,
        &device,
        &client,
        &PathBuf::from(&config.backup_root_dir),
        None,
        device_env.execution_id,
    )
    .await;

    if !result.success {
        tracing::warn!(device_id = %device.device_id, error = ?result.error_message, "backup failed");
    }

    Ok(())
}
