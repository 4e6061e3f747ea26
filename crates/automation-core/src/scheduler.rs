//! Job Scheduler (§4.6): polls the control plane for pending jobs and
//! dispatches one backup run per device, racing a per-job deadline against
//! the worker rather than cancelling it.

use crate::adapters::{resolve_adapter, VendorAdapter};
use crate::config::Config;
use crate::control_plane::{ControlPlaneClient, JobStatus, StepStatus};
use crate::models::{BackupResult, DeviceConnectionInfo, Job, Vendor};
use crate::runner;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Run one scheduling tick: fetch, dedup, dispatch.
pub async fn run_once(config: &Config, client: &ControlPlaneClient) {
    let jobs = client.fetch_pending_jobs_parsed().await.unwrap_or_default();
    let jobs = dedup_by_device(jobs);
    let registry = crate::adapters::default_registry();
    let backup_root_dir = PathBuf::from(&config.backup_root_dir);

    for job in jobs {
        dispatch_job(config, client, &registry, &backup_root_dir, job).await;
    }
}

/// Keep the first job seen per `deviceId`, in response order; drop jobs
/// with no `deviceId` entirely (§4.6 step 2).
fn dedup_by_device(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen = HashMap::new();
    let mut out = Vec::new();
    for job in jobs {
        let Some(device_id) = job.device_id.clone() else {
            continue;
        };
        if seen.insert(device_id, ()).is_none() {
            out.push(job);
        }
    }
    out
}

async fn dispatch_job(
    config: &Config,
    client: &ControlPlaneClient,
    registry: &HashMap<&'static str, Arc<dyn VendorAdapter>>,
    backup_root_dir: &std::path::Path,
    job: Job,
) {
    let Some(device_id) = job.device_id.clone() else {
        return;
    };
    let Some(execution_id) = job.execution_id.clone() else {
        return;
    };

    if let Err(e) = client.set_job_status(&execution_id, JobStatus::Running).await {
        warn!(device_id, %execution_id, error = %e, "failed to mark job running");
    }

    client
        .report_step_best_effort(
            &device_id,
            Some(execution_id.as_str()),
            "automation_dispatch",
            StepStatus::Success,
            "",
            json!({ "vendor": job.vendor }),
        )
        .await;

    let Some(vendor) = job.vendor.as_deref() else {
        let _ = client.set_job_status(&execution_id, JobStatus::Skipped).await;
        return;
    };
    if !registry.contains_key(vendor) {
        let _ = client.set_job_status(&execution_id, JobStatus::Skipped).await;
        return;
    }
    let adapter = resolve_adapter(registry, vendor);

    let device = DeviceConnectionInfo {
        device_id: device_id.clone(),
        tenant_id: job.tenant_id_str().unwrap_or_default().to_string(),
        hostname: job.hostname.clone().unwrap_or_default(),
        ip_address: job.mgmt_ip_host().unwrap_or_default(),
        port: job.ssh_port.unwrap_or(22),
        username: job.username.clone().unwrap_or_default(),
        password: job.password.clone().unwrap_or_default(),
        secret: job.secret.clone(),
        timeout: config.device_timeout_seconds,
    };

    let deadline = Duration::from_secs(u64::from(device.timeout) + 5);
    let client_for_task = client.clone();
    let backup_root_dir = backup_root_dir.to_path_buf();
    let execution_id_for_task = execution_id.clone();
    let device_for_task = device.clone();

    let worker = tokio::spawn(async move {
        runner::run_backup(
            adapter,
            &device_for_task,
            &client_for_task,
            &backup_root_dir,
            None,
            Some(execution_id_for_task),
        )
        .await
    });

    match tokio::time::timeout(deadline, worker).await {
        Ok(Ok(_result)) => {
            // The worker already reported its own step sequence and final
            // BackupResult; nothing further to do here.
        }
        Ok(Err(join_err)) => {
            synthesize_failure(
                client,
                &device,
                vendor,
                &execution_id,
                &format!("worker task failed: {join_err}"),
            )
            .await;
        }
        Err(_elapsed) => {
            synthesize_failure(client, &device, vendor, &execution_id, "Backup timed out").await;
        }
    }
}

/// Post the synthetic error step and failure `BackupResult` used when the
/// worker task exceeds its deadline or panics before reporting anything
/// itself (§4.6 steps 4/5). The worker is not cancelled; this report and
/// the worker's eventual completion are allowed to race (§4.6 step 6).
async fn synthesize_failure(
    client: &ControlPlaneClient,
    device: &DeviceConnectionInfo,
    vendor: &str,
    execution_id: &str,
    detail: &str,
) {
    client
        .report_step_best_effort(
            &device.device_id,
            Some(execution_id),
            "error",
            StepStatus::Failed,
            detail,
            json!({}),
        )
        .await;

    let vendor = Vendor::from_str(vendor).unwrap_or(Vendor::Fortigate);
    let result = BackupResult::failure(
        device.device_id.clone(),
        device.tenant_id.clone(),
        None,
        Some(execution_id.to_string()),
        vendor,
        Utc::now(),
        detail.to_string(),
    );
    if let Err(e) = client.report_backup_result(&result).await {
        warn!(device_id = %device.device_id, %execution_id, error = %e, "failed to report synthetic failure result");
    }
}

/// Run forever, sleeping `interval` between ticks; a tick that panics sleeps
/// 5s before continuing rather than taking the whole process down (§4.6,
/// §7). `run_once` itself never returns an error — every error it can hit is
/// already caught and logged per-job or per-call — so a panic is the only
/// "unhandled error" a tick can produce.
pub async fn run_loop(config: &Config, client: &ControlPlaneClient, interval: Duration) {
    loop {
        let config = config.clone();
        let client = client.clone();
        let tick = tokio::spawn(async move { run_once(&config, &client).await });
        if let Err(join_err) = tick.await {
            warn!(error = %join_err, "scheduler tick panicked, backing off");
            tokio::time::sleep(Duration::from_secs(5)).await;
            continue;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(device_id: Option<&str>) -> Job {
        let v = serde_json::json!({
            "executionId": "e1",
            "deviceId": device_id,
            "tenantId": "t1",
            "vendor": "fortigate",
        });
        Job::from_json_value(&v).unwrap()
    }

    #[test]
    fn dedup_keeps_first_occurrence_and_drops_jobs_without_device_id() {
        let jobs = vec![job(Some("D1")), job(Some("D2")), job(Some("D1")), job(None)];
        let deduped = dedup_by_device(jobs);
        let ids: Vec<_> = deduped.iter().map(|j| j.device_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["D1".to_string(), "D2".to_string()]);
    }
}
