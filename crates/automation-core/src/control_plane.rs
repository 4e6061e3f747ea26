//! Typed HTTP client for the control plane (§4.2, §6).
//!
//! Stateless beyond its shared `reqwest::Client` (connection pooling) and
//! immutable base URL / bearer token. Step-reporting calls are exposed as
//! best-effort helpers that log and swallow failures per §4.5/§7 — callers
//! must not let a step-report failure abort a backup.

use crate::error::{Error, Result};
use crate::models::{BackupResult, Device, Job, SnmpConfig};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A status a job transitions through.
#[derive(Debug, Clone, Copy)]
pub enum JobStatus {
    Running,
    Skipped,
}

impl JobStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of one named checkpoint during a backup attempt.
#[derive(Debug, Clone, Copy)]
pub enum StepStatus {
    Success,
    Failed,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// HTTP client for the control plane's internal API.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct StepReport<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    #[serde(rename = "executionId")]
    execution_id: Option<&'a str>,
    #[serde(rename = "stepKey")]
    step_key: &'a str,
    status: &'static str,
    detail: &'a str,
    meta: Value,
}

#[derive(Serialize)]
struct JobStatusBody {
    status: &'static str,
}

#[derive(Serialize)]
struct MetricsReport<'a> {
    #[serde(rename = "tenantId")]
    tenant_id: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    #[serde(rename = "uptimeTicks")]
    uptime_ticks: u64,
    #[serde(rename = "cpuPercent")]
    cpu_percent: u64,
    #[serde(rename = "memUsedPercent")]
    mem_used_percent: u64,
}

#[derive(Serialize)]
struct InventoryReport<'a> {
    #[serde(rename = "tenantId")]
    tenant_id: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    model: Option<&'a str>,
    firmware: Option<&'a str>,
    serial: Option<&'a str>,
}

impl ControlPlaneClient {
    /// Build a client for `base_url` (trailing slash stripped by the
    /// caller — see `Config::from_env`) carrying `token` as a bearer
    /// credential.
    #[must_use]
    pub fn new(base_url: String, token: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client with static TLS config must build");
        Self {
            http,
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(&self, method: &str, url: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let truncated: String = body.chars().take(2048).collect();
        Err(Error::control_plane(method, url, format!("{status} {truncated}")))
    }

    /// POST the final `BackupResult` for one execution. Propagates errors —
    /// this is not best-effort (§4.5 step 7/8, §7 propagation policy).
    pub async fn report_backup_result(&self, result: &BackupResult) -> Result<()> {
        let url = self.url("/internal/backups/report");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(result)
            .send()
            .await
            .map_err(|e| Error::control_plane("POST", &url, e.to_string()))?;
        self.check_status("POST", &url, resp).await?;
        Ok(())
    }

    /// POST a step checkpoint. Propagating variant; use
    /// `report_step_best_effort` at call sites that must not fail the
    /// backup on a reporting error.
    pub async fn report_step(
        &self,
        device_id: &str,
        execution_id: Option<&str>,
        step_key: &str,
        status: StepStatus,
        detail: &str,
        meta: Value,
    ) -> Result<()> {
        let url = self.url("/internal/backups/step");
        let body = StepReport {
            device_id,
            execution_id,
            step_key,
            status: status.as_str(),
            detail,
            meta,
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::control_plane("POST", &url, e.to_string()))?;
        self.check_status("POST", &url, resp).await?;
        Ok(())
    }

    /// Report a step, logging and swallowing any failure. A failure to
    /// report a step MUST NOT abort the backup (§4.2, §4.5, §7).
    pub async fn report_step_best_effort(
        &self,
        device_id: &str,
        execution_id: Option<&str>,
        step_key: &str,
        status: StepStatus,
        detail: &str,
        meta: Value,
    ) {
        if let Err(e) = self
            .report_step(device_id, execution_id, step_key, status, detail, meta)
            .await
        {
            warn!(device_id, step_key, error = %e, "best-effort step report failed");
        }
    }

    /// Fetch pending jobs, returning each as a raw `serde_json::Value` so
    /// callers can use `Job::from_json_value` (which needs the original
    /// JSON to resolve the `tenantId`/`TenantId` casing ambiguity).
    pub async fn fetch_pending_jobs(&self) -> Result<Vec<Value>> {
        let url = self.url("/internal/jobs/pending");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::control_plane("GET", &url, e.to_string()))?;
        let resp = self.check_status("GET", &url, resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::control_plane("GET", &url, e.to_string()))?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Fetch pending jobs already parsed into `Job`s. Malformed entries are
    /// dropped (logged at `warn`) rather than failing the whole fetch.
    pub async fn fetch_pending_jobs_parsed(&self) -> Result<Vec<Job>> {
        let raw = self.fetch_pending_jobs().await?;
        Ok(raw
            .into_iter()
            .filter_map(|v| match Job::from_json_value(&v) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!(error = %e, "dropping malformed job");
                    None
                }
            })
            .collect())
    }

    /// PATCH a job's status.
    pub async fn set_job_status(&self, execution_id: &str, status: JobStatus) -> Result<()> {
        let url = self.url(&format!("/internal/jobs/{execution_id}/status"));
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&JobStatusBody {
                status: status.as_str(),
            })
            .send()
            .await
            .map_err(|e| Error::control_plane("PATCH", &url, e.to_string()))?;
        self.check_status("PATCH", &url, resp).await?;
        Ok(())
    }

    /// List active devices, one page at a time.
    pub async fn list_active_devices(&self, limit: u32, offset: u32) -> Result<Vec<Device>> {
        let url = self.url(&format!("/internal/monitoring/devices?limit={limit}&offset={offset}"));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::control_plane("GET", &url, e.to_string()))?;
        let resp = self.check_status("GET", &url, resp).await?;
        #[derive(serde::Deserialize)]
        struct Page {
            items: Vec<Device>,
        }
        let page: Page = resp
            .json()
            .await
            .map_err(|e| Error::control_plane("GET", &url, e.to_string()))?;
        Ok(page.items)
    }

    /// Fetch a single device's SNMP credentials.
    pub async fn get_snmp_config(&self, device_id: &str) -> Result<SnmpConfig> {
        let url = self.url(&format!("/internal/monitoring/devices/{device_id}/snmp_config"));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::control_plane("GET", &url, e.to_string()))?;
        let resp = self.check_status("GET", &url, resp).await?;
        resp.json()
            .await
            .map_err(|e| Error::control_plane("GET", &url, e.to_string()))
    }

    /// Report uptime/CPU/memory metrics for one device. Best-effort by
    /// convention (the SNMP poller swallows all per-device errors, §4.7).
    pub async fn report_metrics(
        &self,
        tenant_id: &str,
        device_id: &str,
        uptime_ticks: u64,
        cpu_percent: u64,
        mem_used_percent: u64,
    ) -> Result<()> {
        let url = self.url("/internal/monitoring/metrics");
        let body = MetricsReport {
            tenant_id,
            device_id,
            uptime_ticks,
            cpu_percent,
            mem_used_percent,
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::control_plane("POST", &url, e.to_string()))?;
        self.check_status("POST", &url, resp).await?;
        Ok(())
    }

    /// Report inventory (model/firmware/serial) for one device.
    pub async fn report_inventory(
        &self,
        tenant_id: &str,
        device_id: &str,
        model: Option<&str>,
        firmware: Option<&str>,
        serial: Option<&str>,
    ) -> Result<()> {
        let url = self.url("/internal/monitoring/inventory");
        let body = InventoryReport {
            tenant_id,
            device_id,
            model,
            firmware,
            serial,
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::control_plane("POST", &url, e.to_string()))?;
        self.check_status("POST", &url, resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vendor;
    use chrono::Utc;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn report_backup_result_posts_expected_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/internal/backups/report")
                .header("authorization", "Bearer test-token")
                .json_body_partial(json!({"success": true, "deviceId": "D1"}).to_string());
            then.status(200);
        });

        let client = ControlPlaneClient::new(server.base_url(), "test-token".to_string());
        let ts = "2024-05-01T12:34:56Z".parse().unwrap();
        let result = BackupResult::success(
            "D1".to_string(),
            "T1".to_string(),
            None,
            None,
            Vendor::Fortigate,
            ts,
            "/data/backups/T1/D1/2024/05/01/20240501T123456Z.cfg".to_string(),
            "abc123".to_string(),
            42,
        );
        client.report_backup_result(&result).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn non_2xx_response_becomes_control_plane_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/internal/jobs/pending");
            then.status(500).body("boom");
        });

        let client = ControlPlaneClient::new(server.base_url(), "tok".to_string());
        let err = client.fetch_pending_jobs().await.unwrap_err();
        assert!(matches!(err, Error::ControlPlane { .. }));
    }

    #[tokio::test]
    async fn step_report_failure_is_swallowed_by_best_effort_helper() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/internal/backups/step");
            then.status(503);
        });

        let client = ControlPlaneClient::new(server.base_url(), "tok".to_string());
        // Must not panic even though the mock returns 503.
        client
            .report_step_best_effort("D1", Some("e1"), "start_automation", StepStatus::Success, "", json!({}))
            .await;
    }

    #[tokio::test]
    async fn base_url_trailing_slash_must_already_be_stripped_by_caller() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/internal/jobs/pending");
            then.status(200).json_body(json!({"items": []}));
        });
        let client = ControlPlaneClient::new(server.base_url(), "tok".to_string());
        let jobs = client.fetch_pending_jobs().await.unwrap();
        assert!(jobs.is_empty());
    }
}
