//! Error types for the automation worker core.
//!
//! The taxonomy follows the failure modes a backup attempt can hit: a
//! connection never gets established, a connection is established but the
//! device dialogue goes wrong, the control plane rejects or cannot be
//! reached, or the process cannot even start because configuration is
//! missing or malformed.

use thiserror::Error;

/// Core error type for the automation worker.
#[derive(Error, Debug)]
pub enum Error {
    /// Required environment variable missing or malformed at process start.
    /// Fatal: the process exits nonzero.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of what is missing or invalid.
        message: String,
    },

    /// Host unreachable, SSH/TCP timeout, authentication failure, or KEX
    /// irrecoverable after fallback.
    #[error("{message}")]
    BackupConnection {
        /// Human-readable description, already phrased for reporting
        /// verbatim as `BackupResult::error_message`.
        message: String,
    },

    /// Session established but the command failed, output was empty, the
    /// device dialogue was unexpected, or the config file write failed.
    #[error("{message}")]
    BackupExecution {
        /// Human-readable description, already phrased for reporting
        /// verbatim as `BackupResult::error_message`.
        message: String,
    },

    /// Non-2xx response or transport failure talking to the control plane.
    #[error("control plane error: {method} {url} -> {detail}")]
    ControlPlane {
        /// HTTP method of the failed call.
        method: String,
        /// URL of the failed call.
        url: String,
        /// Status code and truncated body, or a transport-level message.
        detail: String,
    },

    /// Field-level validation failure on a `DeviceConnectionInfo` or `Job`.
    #[error("validation error for field '{field}': {message}")]
    Validation {
        /// Field name that failed validation.
        field: String,
        /// Human-readable description.
        message: String,
    },

    /// Filesystem failure while writing a config to the backup store.
    #[error("io error with path '{path}': {source}")]
    Io {
        /// Path being operated on.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for automation-core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `Config` error from a message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Build a `BackupConnection` error.
    pub fn backup_connection<S: Into<String>>(message: S) -> Self {
        Self::BackupConnection {
            message: message.into(),
        }
    }

    /// Build a `BackupExecution` error.
    pub fn backup_execution<S: Into<String>>(message: S) -> Self {
        Self::BackupExecution {
            message: message.into(),
        }
    }

    /// Build a `ControlPlane` error.
    pub fn control_plane<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        method: S1,
        url: S2,
        detail: S3,
    ) -> Self {
        Self::ControlPlane {
            method: method.into(),
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Build a `Validation` error.
    pub fn validation<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True if this error belongs to the "backup" taxonomy (connection or
    /// execution) rather than config/control-plane/validation.
    #[must_use]
    pub const fn is_backup_error(&self) -> bool {
        matches!(self, Self::BackupConnection { .. } | Self::BackupExecution { .. })
    }

    /// The message to surface verbatim as `BackupResult::error_message`.
    /// Panics if called on a non-backup error; callers only call this after
    /// checking `is_backup_error`.
    #[must_use]
    pub fn backup_message(&self) -> &str {
        match self {
            Self::BackupConnection { message } | Self::BackupExecution { message } => message,
            other => unreachable!("backup_message called on non-backup error: {other}"),
        }
    }
}
