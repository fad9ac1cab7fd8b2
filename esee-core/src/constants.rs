//! Protocol constants

use std::time::Duration;

/// Name advertised for the serial service record
pub const SERVICE_NAME: &str = "E-SEE Bluetooth Service";

/// HTTP port the bridge service is published on
pub const BRIDGE_SERVICE_PORT: u16 = 5200;

/// Interval between readiness checks while waiting on the device
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on a single exchange
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Largest exchange deadline accepted by `BridgeConfig::validate`
pub const MAX_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Size of the single read that captures a report
pub const READ_CHUNK_SIZE: usize = 1024;

/// Axis value used when the device prints a 4-column measurement line
pub const AXIS_PLACEHOLDER: &str = "--";

/// Report line prefixes (matched case-insensitively)
pub mod markers {
    pub const PATIENT_ID: &str = "ID:";
    pub const RIGHT_EYE: &str = "OD / Right";
    pub const LEFT_EYE: &str = "OS / Left";
    pub const TABLE_HEADER: &str = "Test";
    pub const RULE: &str = "-";
    pub const DEVICE_NAME: &str = "Aurolab";
    pub const SERIAL_NUMBER: &str = "S/N:";
}
