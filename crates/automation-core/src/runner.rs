//! Backup Runner (§4.5): drives one vendor adapter end-to-end for one
//! device and reports the outcome, success or failure, exactly once.

use crate::adapters::VendorAdapter;
use crate::config_store;
use crate::control_plane::{ControlPlaneClient, StepStatus};
use crate::error::Error;
use crate::models::{BackupResult, DeviceConnectionInfo, Vendor};
use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Run one backup attempt and report its result. Never returns an `Err` —
/// any failure along the way is folded into a failure `BackupResult` and
/// reported per §4.5 step 8, then returned as `Ok` so callers don't need a
/// second error-handling path on top of the one already encoded in the
/// result.
pub async fn run_backup(
    adapter: Arc<dyn VendorAdapter>,
    device: &DeviceConnectionInfo,
    client: &ControlPlaneClient,
    backup_root_dir: &Path,
    job_id: Option<String>,
    execution_id: Option<String>,
) -> BackupResult {
    let ts = Utc::now();
    let vendor = Vendor::from_str(adapter.vendor_name()).unwrap_or(Vendor::Fortigate);

    client
        .report_step_best_effort(
            &device.device_id,
            execution_id.as_deref(),
            "start_automation",
            StepStatus::Success,
            "",
            json!({ "vendor": adapter.vendor_name() }),
        )
        .await;

    match run_inner(adapter, device, client, backup_root_dir, execution_id.as_deref(), ts).await {
        Ok(result) => {
            if let Err(e) = client.report_backup_result(&result).await {
                tracing::warn!(device_id = %device.device_id, error = %e, "failed to report successful backup result");
            }
            result
        }
        Err(e) => {
            client
                .report_step_best_effort(
                    &device.device_id,
                    execution_id.as_deref(),
                    "error",
                    StepStatus::Failed,
                    &e.to_string(),
                    json!({}),
                )
                .await;
            let result = BackupResult::failure(
                device.device_id.clone(),
                device.tenant_id.clone(),
                job_id,
                execution_id,
                vendor,
                ts,
                e.to_string(),
            );
            if let Err(report_err) = client.report_backup_result(&result).await {
                tracing::warn!(device_id = %device.device_id, error = %report_err, "failed to report failed backup result");
            }
            result
        }
    }
}

async fn run_inner(
    adapter: Arc<dyn VendorAdapter>,
    device: &DeviceConnectionInfo,
    client: &ControlPlaneClient,
    backup_root_dir: &Path,
    execution_id: Option<&str>,
    ts: chrono::DateTime<Utc>,
) -> crate::error::Result<BackupResult> {
    let vendor = Vendor::from_str(adapter.vendor_name()).unwrap_or(Vendor::Fortigate);

    let config_text = adapter.fetch_running_config(device).await?;

    client
        .report_step_best_effort(
            &device.device_id,
            execution_id,
            "config_read",
            StepStatus::Success,
            "",
            json!({ "length": config_text.len() }),
        )
        .await;

    let saved = config_store::save(
        backup_root_dir,
        &device.tenant_id,
        &device.device_id,
        ts,
        &config_text,
    )
    .await
    .map_err(|e| Error::backup_execution(format!("failed to persist config: {e}")))?;

    client
        .report_step_best_effort(
            &device.device_id,
            execution_id,
            "file_write",
            StepStatus::Success,
            "",
            json!({
                "path": saved.path.display().to_string(),
                "size": saved.size_bytes,
                "sha256": saved.sha256_hex,
            }),
        )
        .await;

    client
        .report_step_best_effort(
            &device.device_id,
            execution_id,
            "report_ready",
            StepStatus::Success,
            "",
            json!({ "sha256": saved.sha256_hex }),
        )
        .await;

    Ok(BackupResult::success(
        device.device_id.clone(),
        device.tenant_id.clone(),
        None,
        execution_id.map(str::to_string),
        vendor,
        ts,
        saved.path.display().to_string(),
        saved.sha256_hex,
        saved.size_bytes,
    ))
}
