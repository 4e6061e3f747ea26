//! Thin blocking wrapper around `snmp2::SyncSession`.
//!
//! `snmp2` is a synchronous, socket-per-session API (no `async` variant),
//! so every call here is meant to run inside `tokio::task::spawn_blocking`
//! — see `poller.rs`. OIDs are accepted as dotted strings (`"1.3.6.1..."`)
//! for parity with the rest of this module and parsed into the numeric
//! form the crate expects.

use crate::error::{Error, Result};
use crate::models::SnmpV3Config;
use snmp2::{AuthProtocol, PrivProtocol, Security, SyncSession, Value};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// One open SNMP session to a device, either v2c or v3.
pub struct DeviceSession {
    inner: SyncSession,
    retries: u32,
}

/// A single scalar SNMP value, reduced to the handful of shapes this
/// poller actually cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Integer(i64),
    Text(String),
    Other,
}

impl DeviceSession {
    /// Open a session to `host` on port 161, using a v3 USM user if
    /// `v3.username` is present, else the v2c `community` (default
    /// `"public"`).
    pub fn open(
        host: &str,
        community: Option<&str>,
        v3: Option<&SnmpV3Config>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self> {
        let addr = resolve_addr(host)?;
        let inner = match v3 {
            Some(v3) if !v3.username.is_empty() => open_v3(addr, v3, timeout)?,
            _ => {
                let community = community.unwrap_or("public");
                SyncSession::new(addr, community.as_bytes(), Some(timeout), 0).map_err(|e| {
                    Error::backup_execution(format!("failed to open SNMP session to {host}: {e}"))
                })?
            }
        };
        Ok(Self { inner, retries })
    }

    /// SNMP GET on a single scalar OID. Returns `None` on any error or
    /// error-status response (timeout, unreachable, no-such-object) rather
    /// than propagating — callers treat an absent metric as a normal,
    /// expected outcome (§4.7).
    pub fn get(&mut self, oid: &str) -> Option<ScalarValue> {
        let numeric = parse_oid(oid)?;
        for _ in 0..=self.retries {
            let Ok(mut response) = self.inner.get(&numeric) else {
                continue;
            };
            if response.error_status != 0 {
                continue;
            }
            if let Some((_, value)) = response.varbinds.next() {
                if let Some(scalar) = scalar_from_value(&value) {
                    return Some(scalar);
                }
            }
        }
        None
    }

    /// Lexicographic WALK rooted at `oid`: repeated GETNEXT until a
    /// returned name no longer starts with `oid`, an end-of-MIB marker is
    /// hit, or an error occurs. Returns the rows collected so far on error
    /// rather than propagating (the original system's same tolerance).
    pub fn walk(&mut self, oid: &str) -> Vec<(String, ScalarValue)> {
        let Some(root) = parse_oid(oid) else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        let mut current = root.clone();
        loop {
            let Ok(mut response) = self.inner.getnext(&current) else {
                break;
            };
            let Some((name, value)) = response.varbinds.next() else {
                break;
            };
            if !name.starts_with(&root) || name == current {
                break;
            }
            let Some(scalar) = scalar_from_value(&value) else {
                break;
            };
            rows.push((oid_to_string(&name), scalar));
            current = name;
            if rows.len() > 10_000 {
                // Pathological device or loop in the agent's MIB tree;
                // bail rather than spin forever.
                break;
            }
        }
        rows
    }
}

fn open_v3(addr: SocketAddr, v3: &SnmpV3Config, timeout: Duration) -> Result<SyncSession> {
    let auth = v3.auth_key.as_ref().map(|key| {
        let proto = match v3.auth_protocol.as_deref().unwrap_or("sha").to_lowercase().as_str() {
            "md5" => AuthProtocol::Md5,
            _ => AuthProtocol::Sha1,
        };
        (proto, key.as_bytes().to_vec())
    });
    let priv_ = v3.priv_key.as_ref().map(|key| {
        let proto = match v3.priv_protocol.as_deref().unwrap_or("aes").to_lowercase().as_str() {
            "des" => PrivProtocol::Des,
            _ => PrivProtocol::Aes128,
        };
        (proto, key.as_bytes().to_vec())
    });

    let security = Security::new(v3.username.as_bytes().to_vec())
        .with_auth(auth)
        .with_priv(priv_);

    SyncSession::new_v3(addr, Some(timeout), 0, security)
        .map_err(|e| Error::backup_execution(format!("failed to open SNMPv3 session: {e}")))
}

fn resolve_addr(host: &str) -> Result<SocketAddr> {
    format!("{host}:161")
        .to_socket_addrs()
        .map_err(|e| Error::backup_execution(format!("failed to resolve {host}: {e}")))?
        .next()
        .ok_or_else(|| Error::backup_execution(format!("no address found for {host}")))
}

fn parse_oid(dotted: &str) -> Option<Vec<u32>> {
    dotted.split('.').map(|part| part.parse::<u32>().ok()).collect()
}

fn oid_to_string(oid: &[u32]) -> String {
    oid.iter().map(ToString::to_string).collect::<Vec<_>>().join(".")
}

fn scalar_from_value(value: &Value<'_>) -> Option<ScalarValue> {
    match value {
        Value::Integer(i) => Some(ScalarValue::Integer(*i)),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
            Some(ScalarValue::Integer(i64::from(*n)))
        }
        Value::Counter64(n) => i64::try_from(*n).ok().map(ScalarValue::Integer),
        Value::OctetString(bytes) => Some(ScalarValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => None,
        _ => Some(ScalarValue::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_oid_into_numeric_components() {
        assert_eq!(parse_oid("1.3.6.1.2.1.1.3.0"), Some(vec![1, 3, 6, 1, 2, 1, 1, 3, 0]));
        assert_eq!(parse_oid(""), None);
        assert_eq!(parse_oid("1.3.x.1"), None);
    }

    #[test]
    fn oid_to_string_round_trips_parse_oid() {
        let numeric = parse_oid("1.3.6.1.2.1.1.3.0").unwrap();
        assert_eq!(oid_to_string(&numeric), "1.3.6.1.2.1.1.3.0");
    }
}
