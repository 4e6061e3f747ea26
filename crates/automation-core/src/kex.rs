//! SSH KEX-fallback dialer (§4.3).
//!
//! Establishes an SSH client session that works against both modern and
//! legacy devices without permanently weakening security posture. Unlike
//! the Paramiko-based original this is adapted from — which has to
//! monkey-patch a process-global transport class and serialize that patch
//! under a mutex, because Paramiko's security options live on the library
//! rather than the connection — `ssh2` (a libssh2 binding) exposes a
//! per-`Session` key-exchange preference string via `Session::method_pref`.
//! Phase 2 is therefore just a second, independent `Session` with an
//! extended preference list: no global state, no mutex, no restore-on-exit
//! dance.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::RegexSet;
use ssh2::{MethodType, Session};
use std::net::TcpStream;
use std::time::Duration;

/// Legacy KEX algorithms required by some old devices, appended (never
/// substituted) after libssh2's secure defaults. Order matters: group14 is
/// preferred over the weaker group1.
pub const LEGACY_KEX: [&str; 2] = [
    "diffie-hellman-group14-sha1",
    "diffie-hellman-group1-sha1",
];

static KEX_FAILURE_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)no matching key exchange method found",
        r"(?i)unable to negotiate.*key exchange",
        r"(?i)kex negotiation failed",
        r"(?i)key exchange negotiation failed",
        r"(?i)no matching kex",
    ])
    .expect("KEX failure pattern set is a fixed, known-valid set of regexes")
});

/// True if `message` looks like a KEX negotiation failure rather than some
/// other connection error (auth failure, host unreachable, ...).
#[must_use]
pub fn is_kex_failure(message: &str) -> bool {
    KEX_FAILURE_PATTERNS.is_match(message)
}

/// A live SSH session plus the TCP stream backing it — some adapters (HP
/// Comware) need to drive channels directly and also want the raw stream
/// for low-level timeout tuning.
pub struct DialedSession {
    pub session: Session,
    pub tcp: TcpStream,
}

/// Credentials used for both phases of a dial attempt.
pub struct DialCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Connect and authenticate to `(host, port)`, retrying once with the
/// legacy KEX list appended if, and only if, the first attempt fails with a
/// classified KEX negotiation error (§4.3).
///
/// Host-key verification is intentionally not performed (operational mode;
/// host-key pinning is explicitly out of scope per §4.3/§6).
pub fn connect_with_kex_fallback(
    host: &str,
    port: u16,
    timeout: Duration,
    creds: &DialCredentials<'_>,
) -> Result<DialedSession> {
    match dial_once(host, port, timeout, creds, None) {
        Ok(dialed) => Ok(dialed),
        Err(e) => {
            if !is_kex_failure(&e.to_string()) {
                return Err(e);
            }
            dial_once(host, port, timeout, creds, Some(&LEGACY_KEX))
        }
    }
}

fn dial_once(
    host: &str,
    port: u16,
    timeout: Duration,
    creds: &DialCredentials<'_>,
    extra_kex: Option<&[&str]>,
) -> Result<DialedSession> {
    let tcp = TcpStream::connect((host, port)).map_err(|e| classify_connect_error(host, &e))?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session = Session::new()
        .map_err(|e| Error::backup_connection(format!("failed to create SSH session for {host}: {e}")))?;
    session.set_timeout(
        u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
    );
    session.set_tcp_stream(tcp.try_clone().map_err(|e| {
        Error::backup_connection(format!("failed to clone TCP stream for {host}: {e}"))
    })?);

    if let Some(legacy) = extra_kex {
        let secure_default = session
            .method_pref(MethodType::Kex, None)
            .unwrap_or_default();
        let extended = append_legacy_kex(&secure_default, legacy);
        session
            .method_pref(MethodType::Kex, Some(&extended))
            .map_err(|e| Error::backup_connection(format!("failed to set KEX preference for {host}: {e}")))?;
    }

    session
        .handshake()
        .map_err(|e| classify_handshake_error(host, &e))?;

    session
        .userauth_password(creds.username, creds.password)
        .map_err(|_| Error::backup_connection(format!("Authentication failed for {host}")))?;

    if !session.authenticated() {
        return Err(Error::backup_connection(format!("Authentication failed for {host}")));
    }

    Ok(DialedSession { session, tcp })
}

/// Append `legacy` algorithms after `default_list` (a comma-separated KEX
/// proposal), skipping any that are already present.
fn append_legacy_kex(default_list: &str, legacy: &[&str]) -> String {
    let mut algos: Vec<&str> = default_list.split(',').filter(|s| !s.is_empty()).collect();
    for alg in legacy {
        if !algos.contains(alg) {
            algos.push(alg);
        }
    }
    algos.join(",")
}

fn classify_connect_error(host: &str, e: &std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::TimedOut {
        Error::backup_connection(format!("Timeout connecting to {host}"))
    } else {
        Error::backup_connection(format!("Unexpected error fetching config from {host}: {e}"))
    }
}

fn classify_handshake_error(host: &str, e: &ssh2::Error) -> Error {
    let msg = e.to_string();
    if is_kex_failure(&msg) {
        // Surfaced to the caller so `connect_with_kex_fallback` can decide
        // whether to retry; not rewritten into a generic message here.
        Error::backup_connection(msg)
    } else {
        Error::backup_connection(format!("Unexpected error fetching config from {host}: {msg}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_matches_all_documented_kex_failure_strings() {
        let messages = [
            "No matching key exchange method found",
            "Unable to negotiate with 10.0.0.1 port 22: no matching key exchange method found",
            "kex negotiation failed",
            "Key exchange negotiation failed",
            "no matching kex",
        ];
        for msg in messages {
            assert!(is_kex_failure(msg), "expected KEX failure match for {msg:?}");
        }
    }

    #[test]
    fn classifier_rejects_unrelated_errors() {
        assert!(!is_kex_failure("host unreachable"));
        assert!(!is_kex_failure("auth failed"));
    }

    #[test]
    fn append_legacy_kex_extends_without_duplicating() {
        let extended = append_legacy_kex(
            "curve25519-sha256,diffie-hellman-group14-sha1",
            &LEGACY_KEX,
        );
        assert_eq!(
            extended,
            "curve25519-sha256,diffie-hellman-group14-sha1,diffie-hellman-group1-sha1"
        );
    }

    #[test]
    fn each_dial_builds_an_independent_session_with_no_shared_state() {
        // There is no process-global KEX list to leak into: `append_legacy_kex`
        // is a pure function over the session's own default preference
        // string, so two sequential calls with the same `default_list`
        // input always produce the same extended result, unaffected by
        // whatever happened in between.
        let default_list = "curve25519-sha256";
        let first = append_legacy_kex(default_list, &LEGACY_KEX);
        let second = append_legacy_kex(default_list, &LEGACY_KEX);
        assert_eq!(first, second);
    }
}
