//! Forced-rescan rate limiting.
//!
//! A deep bus sweep probes 126 addresses and stalls the loop for its
//! duration, so `GET /api/health?scan=1` is throttled with a token bucket
//! (`burster`). An exhausted bucket degrades the request to a normal TTL
//! refresh rather than failing it.

use core::time::Duration;

use burster::Limiter;

/// Token bucket for forced rescans.
pub struct ScanLimiter {
    bucket: burster::TokenBucket<fn() -> Duration>,
    denied: u32,
}

impl ScanLimiter {
    /// `per_sec` rescans per second, with an equal burst.
    pub fn new(per_sec: u64) -> Self {
        Self::with_clock(per_sec, platform_now)
    }

    /// Limiter driven by a caller-supplied clock (tests).
    pub fn with_clock(per_sec: u64, clock: fn() -> Duration) -> Self {
        let rate = per_sec.max(1);
        Self {
            bucket: burster::TokenBucket::new_with_time_provider(rate, rate, clock),
            denied: 0,
        }
    }

    /// Consume one rescan token; `false` when exhausted.
    pub fn try_acquire(&mut self) -> bool {
        let ok = self.bucket.try_consume(1).is_ok();
        if !ok {
            self.denied = self.denied.saturating_add(1);
            log::debug!("forced rescan throttled ({} so far)", self.denied);
        }
        ok
    }

    /// Rescans denied since boot.
    pub fn denied(&self) -> u32 {
        self.denied
    }
}

// ── Platform time for the bucket ─────────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
