//! Port traits: the boundary between the management plane and the device.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GatewayService (domain)
//! ```
//!
//! Everything the core does not own (the preference store, the I2C bus,
//! the actuator command engine, the flash writer, the status displays, the
//! network's subscriber set) sits behind one of these traits. The service
//! receives them per call through [`Ports`], so the core never holds a
//! hardware handle and is fully testable with mocks.
//!
//! ## Security notes
//!
//! - **PreferenceStore** implementations MUST make single-key writes atomic.
//! - Callers never log values of keys marked sensitive; stores need not.

use core::fmt;

use embedded_hal::delay::DelayNs;

use crate::diagnostics::ProbeCode;

// ───────────────────────────────────────────────────────────────
// Preference store (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Typed key-value store holding operator settings.
///
/// Absent keys read as `None`; the proxy decides defaults.
pub trait PreferenceStore {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str) -> Option<bool>;

    /// Write a string value atomically.
    fn put_string(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Write a boolean value atomically.
    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), StorageError>;

    /// Erase every key in the namespace.
    fn clear(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Bus probe (driven adapter: domain → I2C)
// ───────────────────────────────────────────────────────────────

/// A single addressed presence probe on the peripheral bus.
///
/// Implementations perform one bus transaction and report its raw outcome;
/// retries and classification belong to the health cache.
pub trait BusProbe {
    fn probe(&mut self, address: u8) -> ProbeCode;
}

// ───────────────────────────────────────────────────────────────
// Actuator engine (driven adapter: domain → command interpreter)
// ───────────────────────────────────────────────────────────────

/// The external command-language engine that drives panels, holos and
/// logic displays. The gateway only checks command shape.
pub trait ActuatorEngine {
    fn process_command(&mut self, command: &str);
}

// ───────────────────────────────────────────────────────────────
// Safety gate and power control
// ───────────────────────────────────────────────────────────────

/// Decides whether a command is suppressed in the current operating mode.
pub trait SafetyGate {
    fn is_suppressed(&self, command: &str) -> bool;

    /// Corrective action shown to the operator when a command is blocked.
    fn hint(&self) -> &'static str;
}

/// Protective low-power mode toggled by the sleep/wake operations.
pub trait PowerControl: SafetyGate {
    fn enter_sleep(&mut self);

    fn wake(&mut self);

    fn is_sleeping(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Flash writer (driven adapter: domain → OTA partition)
// ───────────────────────────────────────────────────────────────

/// Streams a firmware image into the inactive boot partition.
pub trait FlashWriter {
    /// Open a write session for an image of `total_size` bytes.
    fn begin(&mut self, total_size: u32) -> Result<(), FlashError>;

    /// Write the next chunk. Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, FlashError>;

    /// Verify the image and mark it bootable.
    fn finalize(&mut self) -> Result<(), FlashError>;

    /// Drop an open session without committing.
    fn abort(&mut self);
}

/// Opaque flash failure; the controller only needs pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashError;

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flash operation failed")
    }
}

// ───────────────────────────────────────────────────────────────
// Status indicator (driven adapter: domain → logic displays)
// ───────────────────────────────────────────────────────────────

/// Visual feedback for firmware updates on the dome's logic displays.
pub trait StatusIndicator {
    /// Show upload progress, `0.0..=1.0`.
    fn show_progress(&mut self, fraction: f32);

    /// Show a distinct failure pattern.
    fn show_failure(&mut self);

    /// Return the displays to their normal sequence.
    fn reset(&mut self);
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → SoC)
// ───────────────────────────────────────────────────────────────

/// Clock, memory counters and lifecycle hooks of the SoC.
pub trait SystemPort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    fn free_heap(&self) -> u32;

    /// Whether the web filesystem is currently mounted.
    fn filesystem_mounted(&self) -> bool;

    /// Unmount filesystems that could be written while flashing.
    fn release_filesystems(&mut self);

    /// Restart the device. Called only by the deferred reboot.
    fn reboot(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Broadcast transport (driven adapter: domain → live channel)
// ───────────────────────────────────────────────────────────────

/// The network layer's set of live-channel subscribers.
pub trait Broadcaster {
    fn subscriber_count(&self) -> usize;

    /// Send one text frame to every subscriber.
    fn broadcast(&mut self, frame: &str);

    /// Drop connections that have closed.
    fn cleanup(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every port the service needs for one call, borrowed from the caller.
pub struct Ports<'a> {
    pub store: &'a mut dyn PreferenceStore,
    pub bus: &'a mut dyn BusProbe,
    pub delay: &'a mut dyn DelayNs,
    pub engine: &'a mut dyn ActuatorEngine,
    pub power: &'a mut dyn PowerControl,
    pub flash: &'a mut dyn FlashWriter,
    pub indicator: &'a mut dyn StatusIndicator,
    pub system: &'a mut dyn SystemPort,
    pub transport: &'a mut dyn Broadcaster,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`PreferenceStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
