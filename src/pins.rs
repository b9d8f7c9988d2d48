//! Bus and peripheral assignments for the AstroPixels dome board.
//!
//! Single source of truth for the I2C wiring. The health cache and the
//! ESP-IDF bus adapter both reference this module rather than hard-coding
//! addresses.

// ---------------------------------------------------------------------------
// I2C bus (Wire)
// ---------------------------------------------------------------------------

/// I2C data line.
pub const I2C_SDA_GPIO: i32 = 21;
/// I2C clock line.
pub const I2C_SCL_GPIO: i32 = 22;
/// Bus clock used for probes.
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Servo controllers (PCA9685)
// ---------------------------------------------------------------------------

/// PCA9685 driving the dome panel servos.
pub const PANELS_I2C_ADDR: u8 = 0x40;
/// PCA9685 driving the holoprojector servos.
pub const HOLOS_I2C_ADDR: u8 = 0x41;

// ---------------------------------------------------------------------------
// Deep-scan range (7-bit addresses, reserved ranges excluded)
// ---------------------------------------------------------------------------

pub const SCAN_FIRST_ADDR: u8 = 0x01;
pub const SCAN_LAST_ADDR: u8 = 0x7E;

/// A peripheral the health cache probes on every refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredPeripheral {
    /// Stable identifier used in JSON and fault codes.
    pub name: &'static str,
    pub address: u8,
    /// Missing critical peripherals raise faults.
    pub critical: bool,
    /// Fault code raised when this peripheral alone is missing.
    pub fault_code: &'static str,
    /// Remediation hint shown when this peripheral alone is missing.
    pub missing_hint: &'static str,
}

/// Peripherals probed on every health refresh, in report order.
pub const MONITORED_PERIPHERALS: [MonitoredPeripheral; 2] = [
    MonitoredPeripheral {
        name: "panels",
        address: PANELS_I2C_ADDR,
        critical: true,
        fault_code: "panels_missing",
        missing_hint: "Check the panel PCA9685 at 0x40: power, address jumpers and cable",
    },
    MonitoredPeripheral {
        name: "holos",
        address: HOLOS_I2C_ADDR,
        critical: true,
        fault_code: "holos_missing",
        missing_hint: "Check the holo PCA9685 at 0x41: power, A0 address jumper and cable",
    },
];
