//! Gateway configuration parameters
//!
//! All tunable parameters of the management plane, resolved once at
//! startup. Values can be loaded from a JSON document shipped on the web
//! filesystem; anything missing falls back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::prefs::PreferenceSchema;

/// Optional hardware gadgets, resolved once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// A droid remote receiver is fitted.
    pub droid_remote: bool,
    /// A sound module is fitted.
    pub sound_module: bool,
}

/// Core gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    // --- Auth ---
    /// Shared secret for write operations. `None` leaves writes open.
    pub api_token: Option<String>,

    // --- Health probing ---
    /// Health cache validity (milliseconds)
    pub health_ttl_ms: u64,
    /// Probe attempts per monitored peripheral per refresh
    pub probe_attempts: u8,
    /// Delay between probe attempts (milliseconds)
    pub probe_retry_delay_ms: u32,
    /// Forced rescans allowed per second, and burst size
    pub forced_scans_per_sec: u64,

    // --- Live channel ---
    /// State broadcast interval (milliseconds)
    pub state_interval_ms: u64,
    /// Health broadcast interval (milliseconds)
    pub health_interval_ms: u64,

    // --- Remote link ---
    /// Signal age after which the remote link counts as down (milliseconds)
    pub link_stale_ms: u64,

    // --- Commands ---
    /// Longest accepted actuator command (bytes)
    pub max_command_len: usize,

    // --- Lifecycle ---
    /// Delay before an operator-requested reboot (milliseconds)
    pub reboot_delay_ms: u64,
    /// Delay before rebooting into a new image (milliseconds)
    pub update_reboot_delay_ms: u64,
    /// Upload silence after which a receiving session is dropped (milliseconds)
    pub upload_idle_ms: u64,

    // --- Gadgets & settings ---
    pub capabilities: Capabilities,
    /// Allow-listed operator settings.
    pub preferences: PreferenceSchema,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            // Auth
            api_token: None,

            // Health probing
            health_ttl_ms: 3_000,
            probe_attempts: 3,
            probe_retry_delay_ms: 2,
            forced_scans_per_sec: 1,

            // Live channel
            state_interval_ms: 1_000,  // 1 Hz
            health_interval_ms: 10_000, // 0.1 Hz

            // Remote link
            link_stale_ms: 5_000,

            // Commands
            max_command_len: 64,

            // Lifecycle
            reboot_delay_ms: 500,
            update_reboot_delay_ms: 1_000,
            upload_idle_ms: 30_000,

            capabilities: Capabilities::default(),
            preferences: PreferenceSchema::default(),
        }
    }
}

impl GatewayConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The configured API token, treating an empty string as unset.
    pub fn effective_token(&self) -> Option<&str> {
        self.api_token.as_deref().filter(|t| !t.is_empty())
    }
}
