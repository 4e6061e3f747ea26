//! End-to-end scenarios (§8): `httpmock` stands in for the control plane,
//! `tempfile` stands in for the backup root.

use automation_core::adapters::default_registry;
use automation_core::control_plane::ControlPlaneClient;
use automation_core::models::DeviceConnectionInfo;
use automation_core::runner::run_backup;
use httpmock::prelude::*;
use serde_json::json;

fn fortigate_device() -> DeviceConnectionInfo {
    DeviceConnectionInfo {
        device_id: "D1".to_string(),
        tenant_id: "T1".to_string(),
        hostname: "fw1.example".to_string(),
        ip_address: String::new(),
        port: 22,
        username: "admin".to_string(),
        password: "pw".to_string(),
        secret: None,
        timeout: 30,
    }
}

/// E1: simulated FortiGate happy path.
#[tokio::test]
async fn e1_fortigate_happy_path_simulated() {
    std::env::set_var("SIMULATE_BACKUP", "1");

    let server = MockServer::start();
    let report_mock = server.mock(|when, then| {
        when.method(POST).path("/internal/backups/report");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(POST).path("/internal/backups/step");
        then.status(200);
    });

    let client = ControlPlaneClient::new(server.base_url(), "tok".to_string());
    let dir = tempfile::tempdir().unwrap();
    let registry = default_registry();
    let adapter = registry.get("fortigate").unwrap().clone();

    let result = run_backup(
        adapter,
        &fortigate_device(),
        &client,
        dir.path(),
        None,
        Some("e1".to_string()),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.config_size_bytes, 74);
    assert_eq!(result.config_sha256.len(), 64);
    assert!(result.config_path.as_deref().unwrap().contains("/T1/D1/"));
    report_mock.assert_hits(1);

    std::env::remove_var("SIMULATE_BACKUP");
}

/// E2: a connection failure produces a failure result with the exact
/// documented invariants, and no `report_ready` step is ever sent.
#[tokio::test]
async fn e2_auth_failure_produces_documented_failure_result() {
    use async_trait::async_trait;
    use automation_core::adapters::VendorAdapter;
    use automation_core::error::Error;

    struct AuthFailsAdapter;
    #[async_trait]
    impl VendorAdapter for AuthFailsAdapter {
        fn vendor_name(&self) -> &'static str {
            "fortigate"
        }
        async fn fetch_running_config(&self, _device: &DeviceConnectionInfo) -> automation_core::error::Result<String> {
            Err(Error::backup_connection("Authentication failed for fw1.example"))
        }
    }

    let server = MockServer::start();
    let report_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/internal/backups/report")
            .json_body_partial(json!({"success": false}).to_string());
        then.status(200);
    });
    let step_mock = server.mock(|when, then| {
        when.method(POST).path("/internal/backups/step");
        then.status(200);
    });

    let client = ControlPlaneClient::new(server.base_url(), "tok".to_string());
    let dir = tempfile::tempdir().unwrap();

    let result = run_backup(
        std::sync::Arc::new(AuthFailsAdapter),
        &fortigate_device(),
        &client,
        dir.path(),
        None,
        Some("e2".to_string()),
    )
    .await;

    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("Authentication failed for fw1.example"));
    assert_eq!(result.config_sha256, "");
    assert_eq!(result.config_size_bytes, 0);
    assert!(result.config_path.is_none());
    report_mock.assert_hits(1);
    // start_automation + error step = 2 step posts; report_ready never sent.
    step_mock.assert_hits(2);
}

/// E5: scheduler dedup keeps only the first job per device id.
#[tokio::test]
async fn e5_scheduler_dispatches_first_occurrence_per_device_only() {
    use automation_core::config::Config;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/internal/jobs/pending");
        then.status(200).json_body(json!({
            "items": [
                {"executionId": "a", "deviceId": "X", "tenantId": "T1", "vendor": "fortigate"},
                {"executionId": "b", "deviceId": "X", "tenantId": "T1", "vendor": "fortigate"},
                {"executionId": "c", "deviceId": "Y", "tenantId": "T1", "vendor": "fortigate"},
            ]
        }));
    });
    let status_a = server.mock(|when, then| {
        when.method(PATCH).path("/internal/jobs/a/status");
        then.status(200);
    });
    let status_b = server.mock(|when, then| {
        when.method(PATCH).path("/internal/jobs/b/status");
        then.status(200);
    });
    let status_c = server.mock(|when, then| {
        when.method(PATCH).path("/internal/jobs/c/status");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(POST).path("/internal/backups/step");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(POST).path("/internal/backups/report");
        then.status(200);
    });

    std::env::set_var("SIMULATE_BACKUP", "1");
    std::env::set_var("AUTOMATION_SERVICE_TOKEN", "tok");
    let backup_root = tempfile::tempdir().unwrap();
    let mut config = Config::from_env().unwrap();
    config.api_base_url = server.base_url();
    config.backup_root_dir = backup_root.path().display().to_string();

    let client = ControlPlaneClient::new(server.base_url(), "tok".to_string());
    automation_core::scheduler::run_once(&config, &client).await;

    status_a.assert_hits(1);
    status_c.assert_hits(1);
    status_b.assert_hits(0);

    std::env::remove_var("SIMULATE_BACKUP");
    std::env::remove_var("AUTOMATION_SERVICE_TOKEN");
}
