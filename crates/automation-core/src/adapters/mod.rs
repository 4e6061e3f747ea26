//! Vendor adapter framework (§4.4).
//!
//! Each vendor implements [`VendorAdapter`] and is looked up by name out of
//! a small registry, rather than a tagged enum: adapters differ enough in
//! their connection protocol (interactive SSH shell vs. command-response)
//! that a shared `match` over an enum would just end up re-deriving dynamic
//! dispatch by hand.

mod cisco_ios;
mod fortigate;
mod hp_comware;

pub use cisco_ios::CiscoIosAdapter;
pub use fortigate::FortigateAdapter;
pub use hp_comware::HpComwareAdapter;

use crate::error::{Error, Result};
use crate::models::DeviceConnectionInfo;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A vendor-specific backup strategy: how to fetch a device's running
/// configuration as text.
///
/// `fetch_running_config` does blocking network I/O (SSH) under the hood;
/// implementations are responsible for running that work on a blocking
/// thread (`tokio::task::spawn_blocking`) so they don't stall the async
/// runtime.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// The vendor name this adapter answers to, matching [`crate::models::Vendor`]'s
    /// `Display` output.
    fn vendor_name(&self) -> &'static str;

    /// Fetch the device's running configuration as text.
    ///
    /// Returns `Error::BackupConnection` for anything that happens before a
    /// command could be issued (DNS, TCP, auth, KEX), and
    /// `Error::BackupExecution` for anything that happens after (empty
    /// config, device-side command errors).
    async fn fetch_running_config(&self, device: &DeviceConnectionInfo) -> Result<String>;
}

/// Build the registry of all known vendor adapters, keyed by vendor name.
#[must_use]
pub fn default_registry() -> HashMap<&'static str, Arc<dyn VendorAdapter>> {
    let mut registry: HashMap<&'static str, Arc<dyn VendorAdapter>> = HashMap::new();
    let fortigate: Arc<dyn VendorAdapter> = Arc::new(FortigateAdapter);
    let cisco_ios: Arc<dyn VendorAdapter> = Arc::new(CiscoIosAdapter);
    let hp_comware: Arc<dyn VendorAdapter> = Arc::new(HpComwareAdapter);
    registry.insert(fortigate.vendor_name(), fortigate);
    registry.insert(cisco_ios.vendor_name(), cisco_ios);
    registry.insert(hp_comware.vendor_name(), hp_comware);
    registry
}

/// Resolve an adapter by vendor name, falling back to Fortigate for an
/// unrecognized vendor string (the scheduler does the same thing: §4.6).
#[must_use]
pub fn resolve_adapter<'a>(
    registry: &'a HashMap<&'static str, Arc<dyn VendorAdapter>>,
    vendor: &str,
) -> Arc<dyn VendorAdapter> {
    registry
        .get(vendor)
        .or_else(|| registry.get("fortigate"))
        .expect("fortigate adapter is always registered")
        .clone()
}

/// `SIMULATE_BACKUP=1` short-circuit: every adapter returns a small fixed
/// fake config instead of dialing the device, so the rest of the pipeline
/// (Config Store, Control-Plane Client, Job Scheduler) can be exercised
/// without real hardware (§4.4).
pub(crate) fn simulate_backup_enabled() -> bool {
    std::env::var("SIMULATE_BACKUP").as_deref() == Ok("1")
}

pub(crate) fn empty_config_error() -> Error {
    Error::backup_execution("Empty configuration received from device")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_three_vendors() {
        let registry = default_registry();
        assert!(registry.contains_key("fortigate"));
        assert!(registry.contains_key("cisco_ios"));
        assert!(registry.contains_key("hp_comware"));
    }

    #[test]
    fn resolve_adapter_falls_back_to_fortigate_for_unknown_vendor() {
        let registry = default_registry();
        let adapter = resolve_adapter(&registry, "juniper_junos");
        assert_eq!(adapter.vendor_name(), "fortigate");
    }
}
