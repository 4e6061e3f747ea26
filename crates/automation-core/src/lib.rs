//! Automation core library
//!
//! Shared logic for the scheduler, SNMP poller, and single-shot runner
//! binaries: device connection models, the config store, the control-plane
//! HTTP client, the KEX-fallback SSH dialer, the vendor adapter framework,
//! the backup runner, the job scheduler, and SNMP polling.
//!
//! # Architecture
//!
//! - [`config`] — environment-driven configuration for all three binaries.
//! - [`error`] — the library's unified `Error`/`Result`.
//! - [`models`] — plain value types (`DeviceConnectionInfo`, `Job`, `BackupResult`, ...).
//! - [`config_store`] — deterministic, content-addressed backup storage.
//! - [`control_plane`] — the control plane's internal HTTP API.
//! - [`kex`] — the two-phase SSH KEX-fallback dialer.
//! - [`adapters`] — per-vendor backup strategies behind one trait.
//! - [`runner`] — drives one adapter end-to-end and reports the outcome.
//! - [`scheduler`] — polls for pending jobs and dispatches backup runs.
//! - [`snmp`] — OID polling for metrics and inventory.

pub mod adapters;
pub mod config;
pub mod config_store;
pub mod control_plane;
pub mod error;
pub mod kex;
pub mod logging;
pub mod models;
pub mod runner;
pub mod scheduler;
pub mod snmp;

pub use error::{Error, Result};

/// Commonly used types, re-exported for binary crates.
pub mod prelude {
    pub use crate::adapters::{default_registry, resolve_adapter, VendorAdapter};
    pub use crate::config::{Config, RunMode, SingleShotDevice};
    pub use crate::control_plane::ControlPlaneClient;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_default_tracing;
    pub use crate::models::{BackupResult, Device, DeviceConnectionInfo, Job, Vendor};
}
