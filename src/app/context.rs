//! Owned gateway state.
//!
//! Everything the route handlers and the loop tick share lives here,
//! created once at startup and passed by `&mut`. No globals besides the
//! ISR-fed [`SignalCounter`].

use log::info;

use crate::api::auth::AuthGuard;
use crate::api::channels::UploadQueue;
use crate::api::ota::UpdateController;
use crate::api::ratelimit::ScanLimiter;
use crate::api::stream::BroadcastHub;
use crate::config::{Capabilities, GatewayConfig};
use crate::diagnostics::{HealthCache, HealthEnvironment, HealthReport};
use crate::log_capture::Console;
use crate::prefs::PreferenceProxy;
use crate::scheduler::DeferredReboot;
use crate::telemetry::{LinkState, REMOTE_SIGNAL, SignalCounter};

use super::commands::CommandGateway;
use super::events::StateSnapshot;
use super::ports::{Ports, PreferenceStore};

/// Preference holding the API token; wins over the config file.
pub const TOKEN_PREF_KEY: &str = "apitoken";

/// Per-upload bookkeeping on the callback side of the queue. Only
/// authorised chunks touch it.
#[derive(Debug, Default, Clone, Copy)]
pub struct UploadIntake {
    /// A chunk did not fit the queue.
    pub overflowed: bool,
    /// The last chunk has been seen.
    pub final_seen: bool,
    /// Completion response already produced.
    pub answered: bool,
}

/// Shared mutable state of the management plane.
pub struct GatewayContext {
    pub config: GatewayConfig,
    pub capabilities: Capabilities,
    pub console: Console,
    pub auth: AuthGuard,
    pub health: HealthCache,
    pub scan_limiter: ScanLimiter,
    /// A forced rescan was granted; the next tick runs it.
    pub rescan_requested: bool,
    /// A reader found the cache stale; the next tick refreshes it.
    pub refresh_requested: bool,
    pub commands: CommandGateway,
    pub update: UpdateController,
    pub uploads: UploadQueue,
    pub intake: UploadIntake,
    pub hub: BroadcastHub,
    pub reboot: DeferredReboot,
    pub remote: &'static SignalCounter,
}

impl GatewayContext {
    /// Build the context. The API token comes from the `apitoken`
    /// preference when set, else from `config`.
    pub fn new(config: GatewayConfig, console: Console, store: &dyn PreferenceStore) -> Self {
        let stored = store
            .get_string(TOKEN_PREF_KEY)
            .filter(|t| !t.is_empty());
        let auth = match stored.as_deref() {
            Some(token) => {
                info!("API token loaded from preferences");
                AuthGuard::new(Some(token))
            }
            None => AuthGuard::new(config.effective_token()),
        };

        Self {
            capabilities: config.capabilities,
            auth,
            health: HealthCache::new(&config),
            scan_limiter: ScanLimiter::new(config.forced_scans_per_sec),
            rescan_requested: false,
            refresh_requested: false,
            commands: CommandGateway::new(config.max_command_len),
            update: UpdateController::new(),
            uploads: UploadQueue::new(),
            intake: UploadIntake::default(),
            hub: BroadcastHub::new(&config),
            reboot: DeferredReboot::new(),
            remote: &REMOTE_SIGNAL,
            console,
            config,
        }
    }

    /// Read the remote link from a different counter (tests).
    #[must_use]
    pub fn with_signal_source(mut self, counter: &'static SignalCounter) -> Self {
        self.remote = counter;
        self
    }

    /// Swap the rescan limiter (tests drive it with a fixed clock).
    #[must_use]
    pub fn with_scan_limiter(mut self, limiter: ScanLimiter) -> Self {
        self.scan_limiter = limiter;
        self
    }

    pub fn prefs(&self) -> PreferenceProxy<'_> {
        PreferenceProxy::new(&self.config.preferences, &self.console)
    }

    fn wifi_enabled(store: &dyn PreferenceStore) -> bool {
        store.get_bool("wifi").unwrap_or(true)
    }

    fn remote_enabled(&self, store: &dyn PreferenceStore) -> bool {
        self.capabilities.droid_remote && store.get_bool("remote").unwrap_or(false)
    }

    fn sound_enabled(&self, store: &dyn PreferenceStore) -> bool {
        self.capabilities.sound_module
            && store.get_string("msound").is_some_and(|v| v != "0")
    }

    /// Remote link state, `None` when no remote is fitted.
    pub fn link_state(&self, now_ms: u64) -> Option<LinkState> {
        self.capabilities
            .droid_remote
            .then(|| self.remote.link_state(now_ms, self.config.link_stale_ms))
    }

    pub fn state_snapshot(&self, ports: &Ports<'_>) -> StateSnapshot {
        let now = ports.system.uptime_ms();
        StateSnapshot {
            wifi_enabled: Self::wifi_enabled(&*ports.store),
            remote_enabled: self.remote_enabled(&*ports.store),
            remote_connected: self.link_state(now).map(LinkState::is_up),
            uptime: now / 1_000,
            free_heap: ports.system.free_heap(),
            sleeping: ports.power.is_sleeping(),
            ota_in_progress: self.update.is_receiving(),
        }
    }

    /// Queue a TTL refresh for the next tick when the cache is stale.
    pub fn request_health(&mut self, now_ms: u64) {
        if !self.health.is_fresh(now_ms) {
            self.refresh_requested = true;
        }
    }

    /// Health report from cached data. Never probes.
    pub fn health_report(&self, ports: &Ports<'_>) -> HealthReport {
        let now = ports.system.uptime_ms();
        let remote_enabled = self.remote_enabled(&*ports.store);
        self.health.report(&HealthEnvironment {
            sound_enabled: self.sound_enabled(&*ports.store),
            wifi_enabled: Self::wifi_enabled(&*ports.store),
            remote_enabled,
            link: if remote_enabled { self.link_state(now) } else { None },
            filesystem_mounted: ports.system.filesystem_mounted(),
            free_heap: ports.system.free_heap(),
            uptime_ms: now,
            refresh_pending: self.rescan_requested || self.refresh_requested,
        })
    }
}
