//! Outbound live-channel messages.
//!
//! Every frame pushed to subscribers is an [`Envelope`] serialised as
//! `{"type": "...", ...}`. The web UI dispatches on `type`.

use serde::Serialize;

use crate::diagnostics::HealthReport;

/// A frame for live-channel subscribers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope<'a> {
    /// Periodic state summary.
    State { data: &'a StateSnapshot },
    /// Periodic health report.
    Health { data: &'a HealthReport },
    /// One captured console line.
    Log { line: &'a str },
    /// Firmware upload progress as a fraction of the declared size.
    Ota { progress: f32 },
}

/// Compact device state for `/api/state` and the `state` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub wifi_enabled: bool,
    pub remote_enabled: bool,
    /// Only reported when a droid remote is fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_connected: Option<bool>,
    /// Seconds since boot.
    pub uptime: u64,
    pub free_heap: u32,
    pub sleeping: bool,
    pub ota_in_progress: bool,
}
