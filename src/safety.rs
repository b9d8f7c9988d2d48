//! Protective power mode.
//!
//! `POST /api/sleep` parks the dome: panels close, holos and logics go dark
//! and the supervisor suppresses every actuator command until
//! `POST /api/wake`. It is the default [`SafetyGate`] the command gateway
//! consults before forwarding anything to the actuator engine.
//!
//! ## Lifecycle
//!
//! 1. `enter_sleep()` latches the mode and logs the transition once.
//! 2. While sleeping, `is_suppressed()` is true for every command.
//! 3. `wake()` clears the latch; commands flow again on the next request.

use log::info;

use crate::app::ports::{PowerControl, SafetyGate};

/// Hint returned with every command blocked by sleep mode.
pub const WAKE_HINT: &str = "POST /api/wake";

/// Sleep/wake supervisor.
#[derive(Debug, Default)]
pub struct PowerSupervisor {
    sleeping: bool,
    /// Completed sleep cycles since boot.
    sleep_count: u32,
}

impl PowerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleep_count(&self) -> u32 {
        self.sleep_count
    }
}

impl SafetyGate for PowerSupervisor {
    fn is_suppressed(&self, _command: &str) -> bool {
        self.sleeping
    }

    fn hint(&self) -> &'static str {
        WAKE_HINT
    }
}

impl PowerControl for PowerSupervisor {
    fn enter_sleep(&mut self) {
        if !self.sleeping {
            info!("POWER: entering protective sleep");
            self.sleep_count = self.sleep_count.saturating_add(1);
        }
        self.sleeping = true;
    }

    fn wake(&mut self) {
        if self.sleeping {
            info!("POWER: waking");
        }
        self.sleeping = false;
    }

    fn is_sleeping(&self) -> bool {
        self.sleeping
    }
}
