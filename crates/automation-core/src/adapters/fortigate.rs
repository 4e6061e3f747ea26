//! FortiGate adapter: disables console paging, then dumps the full
//! configuration.

use super::{empty_config_error, simulate_backup_enabled};
use crate::adapters::VendorAdapter;
use crate::error::{Error, Result};
use crate::kex::{connect_with_kex_fallback, DialCredentials};
use crate::models::DeviceConnectionInfo;
use async_trait::async_trait;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

const SIMULATED_CONFIG: &str =
    "config-version=simulated\nconfig system global\nset hostname FortiGate-Sim\nend\n";

pub struct FortigateAdapter;

#[async_trait]
impl VendorAdapter for FortigateAdapter {
    fn vendor_name(&self) -> &'static str {
        "fortigate"
    }

    async fn fetch_running_config(&self, device: &DeviceConnectionInfo) -> Result<String> {
        if simulate_backup_enabled() {
            return Ok(SIMULATED_CONFIG.to_string());
        }
        let device = device.clone();
        tokio::task::spawn_blocking(move || fetch_blocking(&device))
            .await
            .map_err(|e| Error::backup_execution(format!("backup task panicked: {e}")))?
    }
}

fn fetch_blocking(device: &DeviceConnectionInfo) -> Result<String> {
    let host = device.dial_host_hostname_first();
    let timeout = Duration::from_secs(u64::from(device.timeout));
    let creds = DialCredentials {
        username: &device.username,
        password: &device.password,
    };
    let dialed = connect_with_kex_fallback(&host, device.port, timeout, &creds)?;

    let mut channel = dialed.session.channel_session().map_err(|e| {
        Error::backup_connection(format!("failed to open SSH channel to {host}: {e}"))
    })?;
    channel
        .request_pty("vt100", None, None)
        .map_err(|e| Error::backup_connection(format!("failed to request PTY for {host}: {e}")))?;
    channel
        .shell()
        .map_err(|e| Error::backup_connection(format!("failed to start shell for {host}: {e}")))?;

    for cmd in [
        "config global",
        "config system console",
        "set output standard",
        "end",
    ] {
        send_line(&mut channel, cmd)?;
        let _ = read_until(&mut channel, "#", timeout);
    }

    send_line(&mut channel, "show full-configuration")?;
    let output = read_until(&mut channel, "#", timeout)?;

    let _ = channel.send_eof();
    let _ = channel.close();

    if output.trim().is_empty() {
        return Err(empty_config_error());
    }
    Ok(output)
}

fn send_line(channel: &mut ssh2::Channel, line: &str) -> Result<()> {
    channel
        .write_all(format!("{line}\n").as_bytes())
        .map_err(|source| Error::Io {
            path: "ssh-channel".to_string(),
            source,
        })
}

/// Read from `channel` until `marker` is seen in the accumulated output or
/// `timeout` elapses, whichever comes first.
fn read_until(channel: &mut ssh2::Channel, marker: &str, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 65536];
    let mut collected = String::new();
    while Instant::now() < deadline {
        match channel.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                collected.push_str(&String::from_utf8_lossy(&buf[..n]));
                if collected.contains(marker) {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(_) => break,
        }
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_name_is_fortigate() {
        assert_eq!(FortigateAdapter.vendor_name(), "fortigate");
    }
}
