//! Interrupt-fed remote link telemetry.
//!
//! The droid remote's receive interrupt stamps every good packet. The main
//! loop never gets a "link lost" callback; it infers link state from how
//! long ago the last signal arrived.
//!
//! ```text
//! ┌─────────────┐  record_signal()  ┌────────────────┐  snapshot()  ┌──────────┐
//! │  Radio ISR  │──────────────────▶│ SignalCounter  │─────────────▶│ Gateway  │
//! └─────────────┘  (critical sect.) └────────────────┘ (crit. sect.)└──────────┘
//! ```
//!
//! Both sides touch the counter only inside a short critical section, so
//! the timestamp and burst count are always read as a consistent pair.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::Serialize;

/// Signal counter owned by the remote receiver ISR.
pub static REMOTE_SIGNAL: SignalCounter = SignalCounter::new();

/// Point-in-time copy of the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalStats {
    /// Uptime (ms) of the most recent signal, `None` before the first.
    pub last_signal_ms: Option<u64>,
    /// Signals received since boot.
    pub burst_count: u32,
}

/// Remote link state derived from signal age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Nothing received since boot.
    NeverSeen,
    Up,
    /// Last signal older than the staleness window.
    Stale,
}

impl LinkState {
    pub fn is_up(self) -> bool {
        self == Self::Up
    }
}

/// ISR-shared signal timestamp and count.
pub struct SignalCounter {
    inner: Mutex<CriticalSectionRawMutex, Cell<SignalStats>>,
}

impl SignalCounter {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(SignalStats {
                last_signal_ms: None,
                burst_count: 0,
            })),
        }
    }

    /// Record one received signal. Safe to call from interrupt context.
    pub fn record_signal(&self, now_ms: u64) {
        self.inner.lock(|cell| {
            let mut stats = cell.get();
            stats.last_signal_ms = Some(now_ms);
            stats.burst_count = stats.burst_count.wrapping_add(1);
            cell.set(stats);
        });
    }

    pub fn snapshot(&self) -> SignalStats {
        self.inner.lock(Cell::get)
    }

    /// Link state at `now_ms` given a staleness window.
    pub fn link_state(&self, now_ms: u64, stale_after_ms: u64) -> LinkState {
        link_state_of(self.snapshot(), now_ms, stale_after_ms)
    }
}

impl Default for SignalCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure link-state rule, shared by the live counter and tests.
pub fn link_state_of(stats: SignalStats, now_ms: u64, stale_after_ms: u64) -> LinkState {
    match stats.last_signal_ms {
        None => LinkState::NeverSeen,
        Some(t) if now_ms.saturating_sub(t) > stale_after_ms => LinkState::Stale,
        Some(_) => LinkState::Up,
    }
}
