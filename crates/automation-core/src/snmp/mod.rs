//! SNMP polling: OIDs, the blocking `snmp2` session wrapper, and the
//! per-tick poller (§4.7).

mod oids;
mod poller;
mod session;

pub use oids::vendor_specific_inventory_oids;
pub use poller::{run_loop, run_once};
pub use session::{DeviceSession, ScalarValue};
