//! Deterministic, content-addressed backup storage on the local filesystem.
//!
//! Path layout: `<root>/<tenant>/<device>/<YYYY>/<MM>/<DD>/<stamp>.cfg` with
//! all date parts derived from the timestamp converted to UTC.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// The result of writing one config to the backup store.
#[derive(Debug, Clone)]
pub struct SavedConfig {
    /// Absolute path the config was written to.
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the UTF-8-encoded content.
    pub sha256_hex: String,
    /// Length of the UTF-8-encoded content in bytes.
    pub size_bytes: u64,
}

/// Build the deterministic path for a backup, without writing anything.
///
/// `ts` is converted to UTC before any date/time component is read, so the
/// result is independent of the timezone `ts` was originally expressed in.
#[must_use]
pub fn build_backup_path(root: &Path, tenant_id: &str, device_id: &str, ts: DateTime<Utc>) -> PathBuf {
    root.join(tenant_id)
        .join(device_id)
        .join(ts.format("%Y").to_string())
        .join(ts.format("%m").to_string())
        .join(ts.format("%d").to_string())
        .join(format!("{}.cfg", ts.format("%Y%m%dT%H%M%SZ")))
}

/// Write `text` to the deterministic path for `(tenant_id, device_id, ts)`,
/// creating parent directories as needed, and return the path plus its
/// content digest and size.
///
/// Two backups of the same device in the same second land on the same path
/// — this is an accepted overwrite (same second implies overwhelmingly
/// likely same content; see §4.1), not treated as a collision error.
pub async fn save(
    root: &Path,
    tenant_id: &str,
    device_id: &str,
    ts: DateTime<Utc>,
    text: &str,
) -> Result<SavedConfig> {
    let path = build_backup_path(root, tenant_id, device_id, ts);
    let parent = path.parent().ok_or_else(|| {
        Error::backup_execution(format!("backup path has no parent directory: {}", path.display()))
    })?;

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| Error::Io {
            path: parent.display().to_string(),
            source,
        })?;

    let bytes = text.as_bytes();
    let size_bytes = bytes.len() as u64;

    // Write to a temp sibling and rename so a concurrent reader never
    // observes a partially-written file.
    let tmp_path = path.with_extension("cfg.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|source| Error::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;

    let sha256_hex = hex_sha256(bytes);

    Ok(SavedConfig {
        path,
        sha256_hex,
        size_bytes,
    })
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn build_backup_path_is_deterministic_and_uses_utc() {
        let ts_utc = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap();
        let path = build_backup_path(Path::new("/data/backups"), "T1", "D1", ts_utc);
        assert_eq!(
            path,
            Path::new("/data/backups/T1/D1/2024/05/01/20240501T123456Z.cfg")
        );

        // A timestamp expressed with a non-UTC offset but representing the
        // same instant must produce the identical path.
        let ts_with_offset = DateTime::parse_from_rfc3339("2024-05-01T08:34:56-04:00")
            .unwrap()
            .with_timezone(&Utc);
        let path2 = build_backup_path(Path::new("/data/backups"), "T1", "D1", ts_with_offset);
        assert_eq!(path, path2);
    }

    #[tokio::test]
    async fn save_writes_file_and_returns_correct_digest_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap();
        let text = "config-version=simulated\nconfig system global\nset hostname FortiGate-Sim\nend\n";

        let saved = save(dir.path(), "T1", "D1", ts, text).await.unwrap();

        assert_eq!(saved.size_bytes, text.len() as u64);
        assert_eq!(saved.sha256_hex, hex_sha256(text.as_bytes()));
        assert_eq!(saved.sha256_hex.len(), 64);
        assert!(saved.sha256_hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let on_disk = tokio::fs::read_to_string(&saved.path).await.unwrap();
        assert_eq!(on_disk, text);
    }

    #[tokio::test]
    async fn save_overwrites_when_same_second_collides() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap();

        let first = save(dir.path(), "T1", "D1", ts, "first").await.unwrap();
        let second = save(dir.path(), "T1", "D1", ts, "second").await.unwrap();

        assert_eq!(first.path, second.path);
        let on_disk = tokio::fs::read_to_string(&second.path).await.unwrap();
        assert_eq!(on_disk, "second");
    }
}
