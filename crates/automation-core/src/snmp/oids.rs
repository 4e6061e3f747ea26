//! OIDs polled on every device, plus vendor-specific inventory overrides
//! (§4.7).

pub const UPTIME_OID: &str = "1.3.6.1.2.1.1.3.0";
pub const CPU_TABLE_OID: &str = "1.3.6.1.2.1.25.3.3.1.2";
pub const MEM_TOTAL_OID: &str = "1.3.6.1.4.1.2021.4.5.0";
pub const MEM_AVAIL_OID: &str = "1.3.6.1.4.1.2021.4.6.0";

pub const INVENTORY_MODEL_OID: &str = "1.3.6.1.2.1.47.1.1.1.1.13";
pub const INVENTORY_SERIAL_OID: &str = "1.3.6.1.2.1.47.1.1.1.1.11";

const FORTIGATE_FW_OID: &str = "1.3.6.1.4.1.12356.101.4.1.1.0";
const FORTIGATE_SERIAL_OID: &str = "1.3.6.1.4.1.12356.101.4.1.3.0";

const MIKROTIK_FW_OID: &str = "1.3.6.1.4.1.14988.1.1.4.3.0";
const MIKROTIK_SERIAL_OID: &str = "1.3.6.1.4.1.14988.1.1.7.3.0";

/// Vendor-specific `(firmware_oid, serial_oid)` overrides, used when the
/// generic ENTITY-MIB walk doesn't yield a value. Unknown vendors get no
/// overrides.
#[must_use]
pub fn vendor_specific_inventory_oids(vendor: &str) -> (Option<&'static str>, Option<&'static str>) {
    match vendor.to_lowercase().as_str() {
        "fortigate" => (Some(FORTIGATE_FW_OID), Some(FORTIGATE_SERIAL_OID)),
        "mikrotik" => (Some(MIKROTIK_FW_OID), Some(MIKROTIK_SERIAL_OID)),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fortigate_has_firmware_and_serial_overrides() {
        let (fw, serial) = vendor_specific_inventory_oids("FortiGate");
        assert_eq!(fw, Some(FORTIGATE_FW_OID));
        assert_eq!(serial, Some(FORTIGATE_SERIAL_OID));
    }

    #[test]
    fn unknown_vendor_has_no_overrides() {
        assert_eq!(vendor_specific_inventory_oids("juniper_junos"), (None, None));
    }
}
