//! Deferred one-shot actions.
//!
//! Network handlers must answer before the device restarts, so a reboot is
//! never performed inline. Handlers [`schedule`](DeferredReboot::schedule)
//! it and the loop tick [`poll`](DeferredReboot::poll)s the deadline.
//!
//! ```text
//!  handler ──schedule(now, delay)──▶ DeferredReboot ◀──poll(now)── tick
//!                                          │
//!                                          └── fires exactly once ──▶ SystemPort::reboot()
//! ```

use log::info;

/// A reboot deadline re-evaluated every tick.
#[derive(Debug, Default)]
pub struct DeferredReboot {
    deadline_ms: Option<u64>,
    /// Times `schedule` was called since boot.
    requests: u32,
    fired: bool,
}

impl DeferredReboot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the reboot `delay_ms` from `now_ms`. An earlier pending deadline
    /// is kept.
    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64) {
        if self.fired {
            return;
        }
        let at = now_ms.saturating_add(delay_ms);
        self.deadline_ms = Some(self.deadline_ms.map_or(at, |d| d.min(at)));
        self.requests = self.requests.saturating_add(1);
        info!("Reboot scheduled in {delay_ms} ms");
    }

    pub fn is_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Returns `true` exactly once, on the first poll at or past the deadline.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(at) if now_ms >= at => {
                self.deadline_ms = None;
                self.fired = true;
                true
            }
            _ => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
