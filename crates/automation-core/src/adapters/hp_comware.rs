//! HP Comware adapter.
//!
//! Despite the name, this adapter also serves IOS-like devices that lack
//! their own adapter: the dialect is detected from the login banner
//! ("Comware"/"H3C" vs. anything else) and the paging-disable and
//! show-config commands are chosen accordingly. Comware's interactive CLI
//! additionally sends a "Press any key" splash on connect and a "---- More
//! ----" pager mid-output, neither of which line up with a simple
//! request/response exchange. This is modeled as an explicit state machine
//! (§4.4) rather than a single read loop with ad-hoc flag checks, so each
//! transition's exit condition is named instead of inferred from string
//! matches scattered through one function.

use super::{empty_config_error, simulate_backup_enabled};
use crate::adapters::VendorAdapter;
use crate::error::{Error, Result};
use crate::kex::{connect_with_kex_fallback, DialCredentials};
use crate::models::DeviceConnectionInfo;
use async_trait::async_trait;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

const SIMULATED_CONFIG: &str = "sysname HP-Comware-Sim\n#\nsysname HP-Comware\n#\nreturn\n";

pub struct HpComwareAdapter;

#[async_trait]
impl VendorAdapter for HpComwareAdapter {
    fn vendor_name(&self) -> &'static str {
        "hp_comware"
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

/// CLI dialect, detected from the login banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Comware,
    IosLike,
}

/// `"Comware"` or `"H3C"` anywhere in the banner means Comware; anything
/// else is treated as IOS-like (Python `hp_comware.py`'s `is_comware`).
fn classify_dialect(banner: &str) -> Dialect {
    if banner.contains("Comware") || banner.contains("H3C") {
        Dialect::Comware
    } else {
        Dialect::IosLike
    }
}

/// Stages of the pre-command negotiation: banner drain, paging disabled,
/// command sent. Draining the command's own output is handled separately
/// by `drain_command`, since an IOS-like device may need a second command
/// attempt with its own fresh read window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellState {
    /// Waiting out the initial banner, possibly including a "Press any
    /// key" splash.
    ReadingBanner,
    /// Banner drained, dialect known; paging-disable command sent,
    /// waiting for the prompt to come back.
    PagingDisabled,
    /// Show-config command sent; negotiation is over.
    CommandSent,
}

fn fetch_blocking(device: &DeviceConnectionInfo) -> Result<String> {
    let host = device.dial_host_hostname_first();
    let timeout = Duration::from_secs(u64::from(device.timeout)).max(Duration::from_secs(45));
    let creds = DialCredentials {
        username: &device.username,
        password: &device.password,
    };
    let dialed = connect_with_kex_fallback(&host, device.port, timeout, &creds)?;

    let mut channel = dialed.session.channel_session().map_err(|e| {
        Error::backup_connection(format!("failed to open SSH channel to {host}: {e}"))
    })?;
    let _ = channel.request_pty("vt100", None, None);
    channel
        .shell()
        .map_err(|e| Error::backup_connection(format!("failed to start shell for {host}: {e}")))?;

    let output = drive_session(&mut channel, timeout)?;

    let _ = channel.send_eof();
    let _ = channel.close();

    if output.trim().is_empty() {
        return Err(empty_config_error());
    }
    Ok(output)
}

fn drive_session(channel: &mut ssh2::Channel, timeout: Duration) -> Result<String> {
    let negotiation_deadline = Instant::now() + timeout;
    let mut state = ShellState::ReadingBanner;
    let mut banner = String::new();
    let mut dialect = Dialect::IosLike;
    let mut primary_command = "show run";

    let _ = channel.write_all(b"\n");

    while state != ShellState::CommandSent && Instant::now() < negotiation_deadline {
        let Some(chunk) = read_chunk(channel) else {
            break;
        };
        if has_press_any_key(&chunk) {
            let _ = channel.write_all(b" ");
        }

        match state {
            ShellState::ReadingBanner => {
                banner.push_str(&chunk);
                if !chunk.is_empty() {
                    dialect = classify_dialect(&banner);
                    let paging_command: &[u8] = match dialect {
                        Dialect::Comware => b"screen-length disable\n",
                        Dialect::IosLike => b"no page\n",
                    };
                    let _ = channel.write_all(paging_command);
                    state = ShellState::PagingDisabled;
                }
            }
            ShellState::PagingDisabled => {
                if !chunk.is_empty() {
                    primary_command = match dialect {
                        Dialect::Comware => "display current-configuration",
                        Dialect::IosLike => "show run",
                    };
                    state = ShellState::CommandSent;
                }
            }
            ShellState::CommandSent => {}
        }
    }

    // §4.4 `collect` loop: each show-config attempt gets its own
    // max(device_timeout, 45s) read window, not a shared remainder of the
    // negotiation deadline.
    let command_timeout = timeout.max(Duration::from_secs(45));
    let mut captured = drain_command(channel, primary_command, command_timeout);

    if dialect == Dialect::IosLike
        && (captured.trim().is_empty()
            || captured.contains("Invalid input")
            || captured.contains("Unknown command"))
    {
        std::thread::sleep(Duration::from_millis(300));
        captured = drain_command(channel, "show running-config", command_timeout);
    }

    Ok(captured)
}

/// Read one chunk, sleeping briefly on `WouldBlock`. `None` means the
/// channel is closed (EOF or a hard read error).
fn read_chunk(channel: &mut ssh2::Channel) -> Option<String> {
    let mut buf = [0u8; 65536];
    match channel.read(&mut buf) {
        Ok(0) => None,
        Ok(n) => Some(String::from_utf8_lossy(&buf[..n]).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            std::thread::sleep(Duration::from_millis(100));
            Some(String::new())
        }
        Err(_) => None,
    }
}

/// Send `command`, then read until the Comware `return` sentinel appears in
/// the accumulated output or `timeout` elapses, answering "Press any key"
/// and pager prompts along the way.
fn drain_command(channel: &mut ssh2::Channel, command: &str, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 65536];
    let mut captured = String::new();
    let _ = channel.write_all(format!("{command}\n").as_bytes());

    while Instant::now() < deadline {
        match channel.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if has_press_any_key(&chunk) {
                    let _ = channel.write_all(b" ");
                }
                if has_more_prompt(&chunk) {
                    let _ = channel.write_all(b" ");
                }
                captured.push_str(&chunk);
                if captured.contains("\nreturn") || captured.trim_end().ends_with("return") {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(_) => break,
        }
    }

    captured
}

fn has_press_any_key(chunk: &str) -> bool {
    chunk.to_lowercase().contains("press any key")
}

fn has_more_prompt(chunk: &str) -> bool {
    chunk.to_lowercase().contains("more")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_name_is_hp_comware() {
        assert_eq!(HpComwareAdapter.vendor_name(), "hp_comware");
    }

    #[test]
    fn press_any_key_detection_is_case_insensitive() {
        assert!(has_press_any_key("Press any key to continue"));
        assert!(has_press_any_key("press any key"));
        assert!(!has_press_any_key("nothing interesting here"));
    }

    #[test]
    fn more_prompt_detection_matches_pager_hint() {
        assert!(has_more_prompt("---- More ----"));
        assert!(!has_more_prompt("sysname HP-Comware"));
    }

    #[test]
    fn classify_dialect_recognizes_comware_and_h3c_banners() {
        assert_eq!(classify_dialect("H3C Comware Software"), Dialect::Comware);
        assert_eq!(classify_dialect("H3C S5120-EI"), Dialect::Comware);
        assert_eq!(classify_dialect("Cisco IOS Software, C2960"), Dialect::IosLike);
        assert_eq!(classify_dialect(""), Dialect::IosLike);
    }
}
