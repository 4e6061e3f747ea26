//! SNMP Poller (§4.7): per tick, walks the control plane's active-device
//! list and reports metrics + inventory for each, tolerating per-device
//! failures silently.

use super::oids::{
    vendor_specific_inventory_oids, CPU_TABLE_OID, INVENTORY_MODEL_OID, INVENTORY_SERIAL_OID,
    MEM_AVAIL_OID, MEM_TOTAL_OID, UPTIME_OID,
};
use super::session::{DeviceSession, ScalarValue};
use crate::config::SnmpPollerConfig;
use crate::control_plane::ControlPlaneClient;
use crate::models::Device;
use std::time::Duration;
use tracing::warn;

/// Run one polling tick across all active devices.
pub async fn run_once(client: &ControlPlaneClient, config: &SnmpPollerConfig) {
    let devices = match client
        .list_active_devices(config.batch_limit, 0)
        .await
    {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "failed to list active devices; skipping this tick");
            return;
        }
    };

    for device in devices {
        if let Err(e) = poll_device(client, &device, config).await {
            warn!(device_id = %device.device_id, error = %e, "SNMP poll failed for device");
        }
    }
}

/// Run forever, sleeping `interval` between ticks.
pub async fn run_loop(client: &ControlPlaneClient, config: &SnmpPollerConfig, interval: Duration) {
    loop {
        run_once(client, config).await;
        tokio::time::sleep(interval).await;
    }
}

async fn poll_device(
    client: &ControlPlaneClient,
    device: &Device,
    config: &SnmpPollerConfig,
) -> crate::error::Result<()> {
    let snmp_config = client.get_snmp_config(&device.device_id).await?;
    let host = device.ip_address.clone();
    let vendor = device.vendor.clone().unwrap_or_default();
    let timeout = config.timeout;
    let community = snmp_config.community.clone();
    let v3 = snmp_config.v3.clone();
    let retries = config.retries;
    let batch = tokio::task::spawn_blocking(move || {
        collect_metrics_blocking(host, community, v3, vendor, timeout, retries)
    })
    .await
    .unwrap_or_else(|_| empty_metrics_batch());

    client
        .report_metrics(
            &device.tenant_id,
            &device.device_id,
            batch.uptime_ticks,
            batch.cpu_percent,
            batch.mem_used_percent,
        )
        .await?;

    client
        .report_inventory(
            &device.tenant_id,
            &device.device_id,
            batch.model.as_deref(),
            batch.firmware.as_deref(),
            batch.serial.as_deref(),
        )
        .await?;

    Ok(())
}

struct MetricsBatch {
    uptime_ticks: u64,
    cpu_percent: u64,
    mem_used_percent: u64,
    model: Option<String>,
    firmware: Option<String>,
    serial: Option<String>,
}

/// Everything in here is blocking `snmp2` socket I/O; run on a blocking
/// thread so the tick loop doesn't stall the async runtime (§4.7, §5).
fn empty_metrics_batch() -> MetricsBatch {
    MetricsBatch {
        uptime_ticks: 0,
        cpu_percent: 0,
        mem_used_percent: 0,
        model: None,
        firmware: None,
        serial: None,
    }
}

fn collect_metrics_blocking(
    host: String,
    community: Option<String>,
    v3: Option<crate::models::SnmpV3Config>,
    vendor: String,
    timeout: Duration,
    retries: u32,
) -> MetricsBatch {
    let mut session =
        match DeviceSession::open(&host, community.as_deref(), v3.as_ref(), timeout, retries) {
            Ok(session) => session,
            Err(_) => return empty_metrics_batch(),
        };

    let uptime_ticks = scalar_as_u64(session.get(UPTIME_OID));

    let cpu_rows = session.walk(CPU_TABLE_OID);
    let cpu_vals: Vec<i64> = cpu_rows
        .into_iter()
        .filter_map(|(_, v)| match v {
            ScalarValue::Integer(i) => Some(i),
            _ => None,
        })
        .collect();
    let cpu_percent = if cpu_vals.is_empty() {
        None
    } else {
        Some(round_half_to_even_avg(&cpu_vals))
    };

    let total = scalar_as_i64(session.get(MEM_TOTAL_OID));
    let avail = scalar_as_i64(session.get(MEM_AVAIL_OID));
    let mem_used_percent = match (total, avail) {
        (Some(total), Some(avail)) if total > 0 => Some(mem_used_percent(total, avail)),
        _ => None,
    };

    let (uptime_ticks, cpu_percent, mem_used_percent) =
        match (uptime_ticks, cpu_percent, mem_used_percent) {
            (None, None, None) => (Some(0), Some(0), Some(0)),
            other => other,
        };

    let model = first_non_empty_string(session.walk(INVENTORY_MODEL_OID));
    let mut serial = first_non_empty_string(session.walk(INVENTORY_SERIAL_OID));

    let (fw_oid, serial_oid) = vendor_specific_inventory_oids(&vendor);
    let firmware = fw_oid.and_then(|oid| match session.get(oid) {
        Some(ScalarValue::Text(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    });
    if serial.is_none() {
        if let Some(oid) = serial_oid {
            if let Some(ScalarValue::Text(s)) = session.get(oid) {
                if !s.trim().is_empty() {
                    serial = Some(s);
                }
            }
        }
    }

    MetricsBatch {
        uptime_ticks: uptime_ticks.unwrap_or(0),
        cpu_percent: cpu_percent.unwrap_or(0),
        mem_used_percent: mem_used_percent.unwrap_or(0),
        model,
        firmware,
        serial,
    }
}

fn scalar_as_u64(value: Option<ScalarValue>) -> Option<u64> {
    match value {
        Some(ScalarValue::Integer(i)) => u64::try_from(i).ok(),
        _ => None,
    }
}

fn scalar_as_i64(value: Option<ScalarValue>) -> Option<i64> {
    match value {
        Some(ScalarValue::Integer(i)) => Some(i),
        _ => None,
    }
}

fn first_non_empty_string(rows: Vec<(String, ScalarValue)>) -> Option<String> {
    rows.into_iter().find_map(|(_, v)| match v {
        ScalarValue::Text(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Average `values`, rounding half-to-even (banker's rounding) as §4.7/§8
/// property 13 requires.
fn round_half_to_even_avg(values: &[i64]) -> u64 {
    let sum: i64 = values.iter().sum();
    let count = values.len() as i64;
    let quotient = sum as f64 / count as f64;
    quotient.round_ties_even().max(0.0) as u64
}

fn clamp_percent(value: i64) -> u64 {
    value.clamp(0, 100) as u64
}

/// `(total-avail)/total*100`, rounded half-to-even like the CPU average and
/// clamped to `[0, 100]` (§4.7, §8 property 14). Plain integer division
/// truncates instead of rounding, which the spec's worked example
/// (`total=1000, avail=333` -> `67`, not `66`) rules out.
fn mem_used_percent(total: i64, avail: i64) -> u64 {
    let used = total - avail;
    let quotient = (used as f64 * 100.0 / total as f64).round_ties_even();
    clamp_percent(quotient as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_average_matches_documented_example() {
        assert_eq!(round_half_to_even_avg(&[10, 20, 30]), 20);
    }

    #[test]
    fn memory_clamp_handles_avail_exceeding_total() {
        assert_eq!(clamp_percent((1000 - 1200) * 100 / 1000), 0);
    }

    #[test]
    fn memory_clamp_handles_zero_avail() {
        assert_eq!(clamp_percent((100 - 0) * 100 / 100), 100);
    }

    #[test]
    fn mem_used_percent_rounds_half_to_even_instead_of_truncating() {
        assert_eq!(mem_used_percent(1000, 333), 67);
    }

    #[test]
    fn first_non_empty_string_skips_blank_rows() {
        let rows = vec![
            ("1.1".to_string(), ScalarValue::Text(String::new())),
            ("1.2".to_string(), ScalarValue::Text("  ".to_string())),
            ("1.3".to_string(), ScalarValue::Text("FGT60F1234".to_string())),
        ];
        assert_eq!(first_non_empty_string(rows).as_deref(), Some("FGT60F1234"));
    }
}
