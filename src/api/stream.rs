//! Live-channel push scheduling.
//!
//! The `BroadcastHub` decides *when* something is pushed to live-channel
//! subscribers; the service decides *what*. With no subscribers the hub
//! does no work at all, not even advancing its timers.
//!
//! | Kind   | Cadence                           |
//! |--------|-----------------------------------|
//! | state  | every `state_interval_ms`         |
//! | health | every `health_interval_ms`        |
//! | log    | each tick, every new line         |
//! | ota    | immediately, per progress step    |

use crate::app::events::Envelope;
use crate::app::ports::Broadcaster;
use crate::config::GatewayConfig;
use crate::log_capture::Console;

/// Pushes due on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub state: bool,
    pub health: bool,
}

/// Push scheduler for the live channel.
pub struct BroadcastHub {
    state_interval_ms: u64,
    health_interval_ms: u64,
    last_state_ms: Option<u64>,
    last_health_ms: Option<u64>,
    /// Sequence id of the last log line pushed.
    log_cursor: u32,
    frames_sent: u32,
}

impl BroadcastHub {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            state_interval_ms: config.state_interval_ms.max(100),
            health_interval_ms: config.health_interval_ms.max(100),
            last_state_ms: None,
            last_health_ms: None,
            log_cursor: 0,
            frames_sent: 0,
        }
    }

    /// Which periodic pushes are due at `now_ms`. Marks them as sent.
    pub fn poll(&mut self, now_ms: u64, subscribers: usize) -> Due {
        if subscribers == 0 {
            return Due::default();
        }
        Due {
            state: Self::take_due(&mut self.last_state_ms, self.state_interval_ms, now_ms),
            health: Self::take_due(&mut self.last_health_ms, self.health_interval_ms, now_ms),
        }
    }

    fn take_due(last: &mut Option<u64>, interval: u64, now_ms: u64) -> bool {
        let due = last.is_none_or(|t| now_ms.saturating_sub(t) >= interval);
        if due {
            *last = Some(now_ms);
        }
        due
    }

    /// Log lines finalised since the last flush, oldest first. Lines that
    /// were overwritten before they could be flushed are skipped.
    pub fn drain_logs(&mut self, console: &Console, subscribers: usize) -> Vec<String> {
        if subscribers == 0 {
            return Vec::new();
        }
        console.with(|ring| {
            let total = ring.total_count();
            let oldest_retained = total.saturating_sub(ring.line_count() as u32);
            let start = self.log_cursor.max(oldest_retained) + 1;
            self.log_cursor = total;
            (start..=total)
                .filter_map(|seq| ring.get_by_sequence(seq))
                .map(|l| l.text().into_owned())
                .collect()
        })
    }

    /// Serialise and send one envelope to every subscriber.
    pub fn publish(&mut self, transport: &mut dyn Broadcaster, envelope: &Envelope<'_>) {
        if transport.subscriber_count() == 0 {
            return;
        }
        match serde_json::to_string(envelope) {
            Ok(frame) => {
                transport.broadcast(&frame);
                self.frames_sent = self.frames_sent.wrapping_add(1);
            }
            Err(e) => log::warn!("broadcast serialisation failed: {e}"),
        }
    }

    /// Push update progress immediately.
    pub fn on_progress(&mut self, transport: &mut dyn Broadcaster, fraction: f32) {
        self.publish(
            transport,
            &Envelope::Ota {
                progress: fraction.clamp(0.0, 1.0),
            },
        );
    }

    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }
}
