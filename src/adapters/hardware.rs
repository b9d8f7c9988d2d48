//! System adapter: uptime, heap, filesystems, restart.
//!
//! [`HostSystem`] implements [`SystemPort`] for simulation and host runs;
//! its free-heap figure follows a slow synthetic decay so dashboards show
//! a moving value. On target, [`EspSystem`] reads the real allocator and
//! restarts the chip, and [`open_bus`] brings up the I2C master used for
//! health probes.

use log::info;

use super::time::MonotonicClock;
use crate::app::ports::SystemPort;

/// Synthetic heap at boot (bytes).
const SIM_HEAP_BASE: u32 = 307_200;
/// Synthetic heap loss per minute of uptime (bytes).
const SIM_HEAP_DECAY_PER_MIN: u32 = 512;
/// The synthetic heap never drops below this.
const SIM_HEAP_FLOOR: u32 = 65_536;

/// Host-side [`SystemPort`].
pub struct HostSystem {
    clock: MonotonicClock,
    mounted: bool,
    reboots: u32,
}

impl HostSystem {
    pub fn new() -> Self {
        Self {
            clock: MonotonicClock::new(),
            mounted: true,
            reboots: 0,
        }
    }

    /// Restarts requested so far; the host process keeps running.
    pub fn reboots(&self) -> u32 {
        self.reboots
    }
}

impl Default for HostSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Free heap after `uptime_ms` under the synthetic model.
pub fn simulated_free_heap(uptime_ms: u64) -> u32 {
    let minutes = (uptime_ms / 60_000).min(u64::from(u32::MAX)) as u32;
    SIM_HEAP_BASE
        .saturating_sub(minutes.saturating_mul(SIM_HEAP_DECAY_PER_MIN))
        .max(SIM_HEAP_FLOOR)
}

impl SystemPort for HostSystem {
    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }

    fn free_heap(&self) -> u32 {
        simulated_free_heap(self.uptime_ms())
    }

    fn filesystem_mounted(&self) -> bool {
        self.mounted
    }

    fn release_filesystems(&mut self) {
        if self.mounted {
            info!("filesystems released (simulation)");
        }
        self.mounted = false;
    }

    fn reboot(&mut self) {
        self.reboots = self.reboots.saturating_add(1);
        info!("reboot requested (simulation): #{}", self.reboots);
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{EspSystem, open_bus};

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::gpio::{InputPin, OutputPin};
    use esp_idf_hal::i2c::{I2c, I2cConfig, I2cDriver};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::units::Hertz;

    use super::MonotonicClock;
    use crate::app::ports::SystemPort;
    use crate::diagnostics::I2cProbe;
    use crate::pins;

    /// On-target [`SystemPort`].
    pub struct EspSystem {
        clock: MonotonicClock,
        mounted: bool,
    }

    impl EspSystem {
        /// `mounted`: whether the web filesystem came up at boot.
        pub fn new(mounted: bool) -> Self {
            Self {
                clock: MonotonicClock::new(),
                mounted,
            }
        }
    }

    impl SystemPort for EspSystem {
        fn uptime_ms(&self) -> u64 {
            self.clock.uptime_ms()
        }

        fn free_heap(&self) -> u32 {
            unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
        }

        fn filesystem_mounted(&self) -> bool {
            self.mounted
        }

        fn release_filesystems(&mut self) {
            if self.mounted {
                let ret = unsafe { esp_idf_svc::sys::esp_vfs_spiffs_unregister(core::ptr::null()) };
                if ret != esp_idf_svc::sys::ESP_OK {
                    log::warn!("SPIFFS unmount failed: {ret}");
                }
                self.mounted = false;
            }
        }

        fn reboot(&mut self) {
            unsafe { esp_idf_svc::sys::esp_restart() };
        }
    }

    /// Bring up the I2C master on the board's bus pins.
    pub fn open_bus<'d>(
        i2c: impl Peripheral<P = impl I2c> + 'd,
        sda: impl Peripheral<P = impl InputPin + OutputPin> + 'd,
        scl: impl Peripheral<P = impl InputPin + OutputPin> + 'd,
    ) -> anyhow::Result<I2cProbe<I2cDriver<'d>>> {
        let config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
        let driver = I2cDriver::new(i2c, sda, scl, &config)?;
        log::info!(
            "I2C master up (SDA {}, SCL {}, {} Hz)",
            pins::I2C_SDA_GPIO,
            pins::I2C_SCL_GPIO,
            pins::I2C_FREQ_HZ
        );
        Ok(I2cProbe::new(driver))
    }
}
