//! Environment-driven configuration for all three worker processes.
//!
//! Every variable here is read directly from the process environment
//! (`std::env`) rather than through the `config` crate's layered
//! file+environment sourcing: the external contract (§6) is a flat set of
//! independently-named variables with no common prefix, so a hierarchical
//! config-file/Environment-prefix source would add indirection without
//! buying anything. Validation failures become `Error::Config`, which is
//! fatal at process start (§7).

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

/// Run mode for a loop-shaped process (scheduler, SNMP poller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run exactly one tick, then exit.
    Once,
    /// Run ticks forever, sleeping `interval` between them.
    Loop,
}

impl RunMode {
    fn parse(raw: &str, var_name: &str) -> Result<Self> {
        match raw {
            "once" => Ok(Self::Once),
            "loop" => Ok(Self::Loop),
            other => Err(Error::config(format!(
                "{var_name} must be 'once' or 'loop', got '{other}'"
            ))),
        }
    }
}

/// Configuration shared by all three binaries.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the control plane, trailing slash stripped.
    pub api_base_url: String,
    /// Bearer token for control-plane authentication.
    pub automation_service_token: String,
    /// Root directory backups are written under.
    pub backup_root_dir: String,
    /// Default per-device timeout in seconds, used when a job doesn't
    /// override it.
    pub device_timeout_seconds: u32,
    /// `SIMULATE_BACKUP=1` short-circuits adapters with fixed fake configs.
    pub simulate_backup: bool,
    /// Scheduler-only settings.
    pub scheduler: SchedulerConfig,
    /// SNMP poller-only settings.
    pub snmp_poller: SnmpPollerConfig,
}

/// Job Scheduler settings (§4.6, §6).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: RunMode,
    pub interval: Duration,
}

/// SNMP Poller settings (§4.7, §6).
#[derive(Debug, Clone)]
pub struct SnmpPollerConfig {
    pub mode: RunMode,
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
    pub batch_limit: u32,
}

impl Config {
    /// Load configuration from the process environment, applying the
    /// defaults documented in §6 and validating bounds.
    pub fn from_env() -> Result<Self> {
        let api_base_url = env_or(
            "API_BASE_URL",
            "http://127.0.0.1:3001",
        )
        .trim_end_matches('/')
        .to_string();

        let automation_service_token = env::var("AUTOMATION_SERVICE_TOKEN").map_err(|_| {
            Error::config("AUTOMATION_SERVICE_TOKEN is required but was not set")
        })?;

        let backup_root_dir = env_or("BACKUP_ROOT_DIR", "/data/backups");

        let device_timeout_seconds = env_parse_or("DEVICE_TIMEOUT_SECONDS", 30)?;
        if !(1..=300).contains(&device_timeout_seconds) {
            return Err(Error::config(format!(
                "DEVICE_TIMEOUT_SECONDS must be in [1, 300], got {device_timeout_seconds}"
            )));
        }

        let simulate_backup = env_or("SIMULATE_BACKUP", "0") == "1";

        let scheduler = SchedulerConfig {
            mode: RunMode::parse(&env_or("SCHEDULER_MODE", "once"), "SCHEDULER_MODE")?,
            interval: Duration::from_secs(env_parse_or("SCHEDULER_INTERVAL_SECONDS", 30)?),
        };

        let snmp_poller = SnmpPollerConfig {
            mode: RunMode::parse(&env_or("SNMP_POLLER_MODE", "once"), "SNMP_POLLER_MODE")?,
            interval: Duration::from_secs(env_parse_or("SNMP_POLL_INTERVAL_SECONDS", 300)?),
            timeout: Duration::from_secs(env_parse_or("SNMP_TIMEOUT_SECONDS", 2)?),
            retries: env_parse_or("SNMP_RETRIES", 1)?,
            batch_limit: env_parse_or("SNMP_POLL_BATCH_LIMIT", 50)?,
        };

        Ok(Self {
            api_base_url,
            automation_service_token,
            backup_root_dir,
            device_timeout_seconds,
            simulate_backup,
            scheduler,
            snmp_poller,
        })
    }
}

/// Environment variables describing a single device for the single-shot
/// runner binary (§6).
#[derive(Debug, Clone)]
pub struct SingleShotDevice {
    pub device_id: String,
    pub tenant_id: String,
    pub ip_address: String,
    pub ssh_port: u16,
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub vendor: String,
    pub execution_id: Option<String>,
}

impl SingleShotDevice {
    /// Load single-shot device parameters from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            device_id: required_env("DEVICE_ID")?,
            tenant_id: required_env("TENANT_ID")?,
            ip_address: env_or("DEVICE_IP", ""),
            ssh_port: env_parse_or("DEVICE_SSH_PORT", 22)?,
            username: required_env("DEVICE_USERNAME")?,
            password: required_env("DEVICE_PASSWORD")?,
            hostname: env_or("DEVICE_HOSTNAME", ""),
            vendor: required_env("DEVICE_VENDOR")?,
            execution_id: env::var("EXECUTION_ID").ok(),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::config(format!("{name} is required but was not set")))
}

fn env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::config(format!("{name} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't stomp on each other under `cargo test`'s
    // multi-threaded runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn strips_trailing_slash_from_base_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("AUTOMATION_SERVICE_TOKEN", "tok");
        env::set_var("API_BASE_URL", "http://example.test/");
        let config = Config::from_env().unwrap();
        assert_eq!(config.api_base_url, "http://example.test");
        env::remove_var("API_BASE_URL");
        env::remove_var("AUTOMATION_SERVICE_TOKEN");
    }

    #[test]
    fn missing_token_is_a_fatal_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("AUTOMATION_SERVICE_TOKEN");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn rejects_device_timeout_out_of_bounds() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("AUTOMATION_SERVICE_TOKEN", "tok");
        env::set_var("DEVICE_TIMEOUT_SECONDS", "301");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        env::remove_var("DEVICE_TIMEOUT_SECONDS");
        env::remove_var("AUTOMATION_SERVICE_TOKEN");
    }
}
