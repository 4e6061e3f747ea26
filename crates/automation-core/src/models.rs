//! Plain value types shared across the worker: connection info, jobs, and
//! backup results.

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use validator::Validate;

/// Vendor tag, a closed set understood by the adapter registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Fortinet FortiGate firewall.
    Fortigate,
    /// Cisco IOS router/switch.
    CiscoIos,
    /// HP/H3C Comware switch.
    HpComware,
}

impl Display for Vendor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fortigate => "fortigate",
            Self::CiscoIos => "cisco_ios",
            Self::HpComware => "hp_comware",
        })
    }
}

impl FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fortigate" => Ok(Self::Fortigate),
            "cisco_ios" => Ok(Self::CiscoIos),
            "hp_comware" => Ok(Self::HpComware),
            other => Err(format!("unknown vendor: {other}")),
        }
    }
}

/// A single job's connection target, valid for one dispatch cycle.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceConnectionInfo {
    /// Opaque device identifier.
    pub device_id: String,
    /// Opaque tenant identifier.
    pub tenant_id: String,
    /// DNS hostname, if known. At least one of hostname/ip_address must be non-empty.
    pub hostname: String,
    /// IP address, if known. At least one of hostname/ip_address must be non-empty.
    pub ip_address: String,
    /// SSH port, default 22.
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    /// SSH username.
    pub username: String,
    /// SSH password.
    pub password: String,
    /// Enable/secret password, if the vendor's CLI needs one.
    pub secret: Option<String>,
    /// Per-job timeout in seconds, bounded [1, 300].
    #[validate(range(min = 1, max = 300))]
    pub timeout: u32,
}

impl DeviceConnectionInfo {
    /// Validate the invariants that `validator`'s derive can't express:
    /// at least one of hostname/ip_address must be non-empty.
    pub fn validate_all(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::validation("device_connection_info", e.to_string()))?;
        if self.hostname.trim().is_empty() && self.ip_address.trim().is_empty() {
            return Err(Error::validation(
                "hostname/ip_address",
                "at least one of hostname or ip_address must be non-empty",
            ));
        }
        Ok(())
    }

    /// Host the adapter should dial: prefer `hostname` when non-empty, else
    /// `ip_address`. Vendor adapters with a different preference order
    /// (Cisco IOS prefers IP) call `dial_host_ip_first` instead.
    #[must_use]
    pub fn dial_host_hostname_first(&self) -> &str {
        if !self.hostname.trim().is_empty() {
            &self.hostname
        } else {
            &self.ip_address
        }
    }

    /// Host the adapter should dial, IP-address-first.
    #[must_use]
    pub fn dial_host_ip_first(&self) -> &str {
        if !self.ip_address.trim().is_empty() {
            &self.ip_address
        } else {
            &self.hostname
        }
    }
}

/// A job as delivered by the control plane's pending-jobs queue.
///
/// `tenant_id` is deliberately not a plain `#[serde(rename)]` field: the
/// control plane has historically emitted it as either `tenantId` or
/// `TenantId` (see the spec's open questions), so it is populated by
/// `Job::from_json_value` rather than by derive.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(rename = "executionId")]
    pub execution_id: Option<String>,
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(skip)]
    pub tenant_id: Option<String>,
    pub vendor: Option<String>,
    pub hostname: Option<String>,
    #[serde(rename = "mgmtIp")]
    pub mgmt_ip: Option<String>,
    #[serde(rename = "sshPort")]
    pub ssh_port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub secret: Option<String>,
}

impl Job {
    /// Parse a `Job` from a raw JSON value, reading `tenantId` or, failing
    /// that, `TenantId` — tolerating the upstream casing inconsistency
    /// documented in the spec's open questions.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        let mut job: Self = serde_json::from_value(value.clone())
            .map_err(|e| Error::validation("job", format!("malformed job payload: {e}")))?;
        job.tenant_id = value
            .get("tenantId")
            .or_else(|| value.get("TenantId"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Ok(job)
    }

    /// The tenant id, if present.
    #[must_use]
    pub fn tenant_id_str(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Strip a `/mask` CIDR suffix from `mgmtIp`, if present, and trim
    /// whitespace from the host part. `"10.0.0.1/24"` -> `"10.0.0.1"`.
    #[must_use]
    pub fn mgmt_ip_host(&self) -> Option<String> {
        self.mgmt_ip
            .as_deref()
            .map(|ip| ip.split('/').next().unwrap_or(ip).trim().to_string())
    }
}

/// The unit reported to the control plane for one backup attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResult {
    pub device_id: String,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub vendor: String,
    #[serde(serialize_with = "serialize_timestamp_z")]
    pub backup_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub config_sha256: String,
    pub config_size_bytes: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn serialize_timestamp_z<S>(ts: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    // `SecondsFormat::Secs` drops any sub-second component and `true`
    // renders the UTC offset as a trailing "Z" rather than "+00:00" — the
    // control plane's RFC 3339 contract (§3/§8.4).
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl BackupResult {
    /// Build a successful result. Caller must supply a non-empty digest and
    /// positive size (enforced by `debug_assert!` — the invariant is a
    /// contract between `ConfigStore::save` and this constructor, not user
    /// input).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        device_id: String,
        tenant_id: String,
        job_id: Option<String>,
        execution_id: Option<String>,
        vendor: Vendor,
        backup_timestamp: DateTime<Utc>,
        config_path: String,
        config_sha256: String,
        config_size_bytes: u64,
    ) -> Self {
        debug_assert!(!config_sha256.is_empty());
        debug_assert!(config_size_bytes > 0);
        Self {
            device_id,
            tenant_id,
            job_id,
            execution_id,
            vendor: vendor.to_string(),
            backup_timestamp,
            config_path: Some(config_path),
            config_sha256,
            config_size_bytes,
            success: true,
            error_message: None,
        }
    }

    /// Build a failure result with the invariants from §3: empty digest,
    /// zero size, no path, a required error message.
    #[must_use]
    pub fn failure(
        device_id: String,
        tenant_id: String,
        job_id: Option<String>,
        execution_id: Option<String>,
        vendor: Vendor,
        backup_timestamp: DateTime<Utc>,
        error_message: String,
    ) -> Self {
        Self {
            device_id,
            tenant_id,
            job_id,
            execution_id,
            vendor: vendor.to_string(),
            backup_timestamp,
            config_path: None,
            config_sha256: String::new(),
            config_size_bytes: 0,
            success: false,
            error_message: Some(error_message),
        }
    }
}

/// SNMP security context for a single device: either a v2c community or a
/// v3 USM user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnmpConfig {
    pub community: Option<String>,
    pub v3: Option<SnmpV3Config>,
}

/// SNMP v3 USM security parameters for one device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnmpV3Config {
    pub username: String,
    pub auth_key: Option<String>,
    pub auth_protocol: Option<String>,
    pub priv_key: Option<String>,
    pub priv_protocol: Option<String>,
}

/// A device listed by the control plane's active-devices endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub tenant_id: String,
    pub ip_address: String,
    pub vendor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_round_trips_through_string() {
        assert_eq!(Vendor::from_str("fortigate").unwrap(), Vendor::Fortigate);
        assert_eq!(Vendor::from_str("CISCO_IOS").unwrap(), Vendor::CiscoIos);
        assert_eq!(Vendor::Fortigate.to_string(), "fortigate");
        assert!(Vendor::from_str("juniper").is_err());
    }

    #[test]
    fn mgmt_ip_host_strips_cidr_suffix() {
        let job = Job {
            execution_id: None,
            device_id: None,
            tenant_id: None,
            vendor: None,
            hostname: None,
            mgmt_ip: Some("10.0.0.1/24".to_string()),
            ssh_port: None,
            username: None,
            password: None,
            secret: None,
        };
        assert_eq!(job.mgmt_ip_host().as_deref(), Some("10.0.0.1"));

        let job2 = Job {
            mgmt_ip: Some("10.0.0.1".to_string()),
            ..job
        };
        assert_eq!(job2.mgmt_ip_host().as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn job_from_json_accepts_either_tenant_id_casing() {
        let v = serde_json::json!({
            "executionId": "e1",
            "deviceId": "d1",
            "TenantId": "t1",
            "vendor": "fortigate",
        });
        let job = Job::from_json_value(&v).unwrap();
        assert_eq!(job.tenant_id_str(), Some("t1"));

        let v2 = serde_json::json!({
            "executionId": "e1",
            "deviceId": "d1",
            "tenantId": "t2",
            "vendor": "fortigate",
        });
        let job2 = Job::from_json_value(&v2).unwrap();
        assert_eq!(job2.tenant_id_str(), Some("t2"));
    }

    #[test]
    fn device_connection_info_requires_a_host() {
        let mut info = DeviceConnectionInfo {
            device_id: "d1".to_string(),
            tenant_id: "t1".to_string(),
            hostname: String::new(),
            ip_address: String::new(),
            port: 22,
            username: "admin".to_string(),
            password: "pw".to_string(),
            secret: None,
            timeout: 30,
        };
        assert!(info.validate_all().is_err());
        info.ip_address = "10.0.0.1".to_string();
        assert!(info.validate_all().is_ok());
    }

    #[test]
    fn backup_result_timestamp_serializes_with_trailing_z_and_no_micros() {
        let ts = "2024-05-01T12:34:56.000001Z".parse::<DateTime<Utc>>().unwrap();
        let result = BackupResult::success(
            "D1".to_string(),
            "T1".to_string(),
            None,
            None,
            Vendor::Fortigate,
            ts,
            "/data/backups/T1/D1/2024/05/01/20240501T123456Z.cfg".to_string(),
            "deadbeef".to_string(),
            74,
        );
        let json = serde_json::to_value(&result).unwrap();
        let rendered = json["backupTimestamp"].as_str().unwrap();
        assert_eq!(rendered, "2024-05-01T12:34:56Z");
    }

    #[test]
    fn device_connection_info_rejects_out_of_range_timeout() {
        let info = DeviceConnectionInfo {
            device_id: "d1".to_string(),
            tenant_id: "t1".to_string(),
            hostname: "r1".to_string(),
            ip_address: String::new(),
            port: 22,
            username: "admin".to_string(),
            password: "pw".to_string(),
            secret: None,
            timeout: 301,
        };
        assert!(info.validate_all().is_err());
    }
}
