//! Hardware health probing and fault classification.
//!
//! The dome's servo controllers sit on a shared I2C bus that is prone to
//! loose cables and brown-outs. [`HealthCache`] probes them on a TTL so the
//! web API and the live channel can report health without hammering the
//! bus; [`build_diagnostics`] turns the cached results into a list of
//! faults with remediation hints.
//!
//! Readers never probe inline. A reader that finds the cache stale asks
//! for a refresh and the loop tick runs [`HealthCache::refresh`]; that is
//! the only path to the bus. Peripherals not yet probed are reported as
//! pending, never as missing.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};
use serde::Serialize;

use crate::app::ports::BusProbe;
use crate::config::GatewayConfig;
use crate::pins::{MONITORED_PERIPHERALS, MonitoredPeripheral, SCAN_FIRST_ADDR, SCAN_LAST_ADDR};
use crate::telemetry::LinkState;

const MONITORED: usize = MONITORED_PERIPHERALS.len();

/// Max devices reported by a deep scan (whole 7-bit space).
pub const MAX_SCAN_DEVICES: usize = 128;

// ───────────────────────────────────────────────────────────────
// Probe result codes
// ───────────────────────────────────────────────────────────────

/// Outcome of a single addressed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCode {
    Ok,
    BufferOverflow,
    AddressNack,
    DataNack,
    #[default]
    Other,
    Timeout,
}

impl ProbeCode {
    /// Map an Arduino-style `endTransmission()` status byte.
    pub fn from_wire_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::BufferOverflow,
            2 => Self::AddressNack,
            3 => Self::DataNack,
            5 => Self::Timeout,
            _ => Self::Other,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<ErrorKind> for ProbeCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => Self::DataNack,
            ErrorKind::NoAcknowledge(_) => Self::AddressNack,
            ErrorKind::Overrun => Self::BufferOverflow,
            _ => Self::Other,
        }
    }
}

/// [`BusProbe`] over any `embedded-hal` I2C bus: a zero-length write.
pub struct I2cProbe<T> {
    bus: T,
}

impl<T: I2c> I2cProbe<T> {
    pub fn new(bus: T) -> Self {
        Self { bus }
    }

    pub fn into_inner(self) -> T {
        self.bus
    }
}

impl<T: I2c> BusProbe for I2cProbe<T> {
    fn probe(&mut self, address: u8) -> ProbeCode {
        match self.bus.write(address, &[]) {
            Ok(()) => ProbeCode::Ok,
            Err(e) => e.kind().into(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Cached state
// ───────────────────────────────────────────────────────────────

/// Tally of probe outcomes since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeHistogram {
    pub ok: u32,
    pub buffer_overflow: u32,
    pub address_nack: u32,
    pub data_nack: u32,
    pub other: u32,
    pub timeout: u32,
}

impl ProbeHistogram {
    pub fn record(&mut self, code: ProbeCode) {
        let slot = match code {
            ProbeCode::Ok => &mut self.ok,
            ProbeCode::BufferOverflow => &mut self.buffer_overflow,
            ProbeCode::AddressNack => &mut self.address_nack,
            ProbeCode::DataNack => &mut self.data_nack,
            ProbeCode::Other => &mut self.other,
            ProbeCode::Timeout => &mut self.timeout,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Health of one monitored peripheral, as of the last refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeripheralHealth {
    pub ok: bool,
    pub last_code: ProbeCode,
    pub last_ok_ms: Option<u64>,
    pub last_fail_ms: Option<u64>,
    /// Failed refreshes in a row; reset by a successful one.
    pub consecutive_failures: u32,
}

impl PeripheralHealth {
    /// At least one refresh has probed this peripheral.
    pub fn is_probed(&self) -> bool {
        self.last_ok_ms.is_some() || self.last_fail_ms.is_some()
    }

    fn is_missing(&self) -> bool {
        self.is_probed() && !self.ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Monitored addresses only.
    #[default]
    Quick,
    /// Full sweep of the address space.
    Deep,
}

/// Bus-wide scan bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ScanCache {
    pub last_scan_ms: Option<u64>,
    pub mode: ScanMode,
    pub devices: heapless::Vec<u8, MAX_SCAN_DEVICES>,
    pub histogram: ProbeHistogram,
    /// Non-ok probe attempts since boot.
    pub probe_failures: u32,
}

/// TTL-cached prober for the monitored peripherals.
pub struct HealthCache {
    ttl_ms: u64,
    attempts: u8,
    retry_delay_ms: u32,
    peripherals: [PeripheralHealth; MONITORED],
    scan: ScanCache,
}

impl HealthCache {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            ttl_ms: config.health_ttl_ms,
            attempts: config.probe_attempts.max(1),
            retry_delay_ms: config.probe_retry_delay_ms,
            peripherals: [PeripheralHealth::default(); MONITORED],
            scan: ScanCache::default(),
        }
    }

    /// Whether a non-forced refresh at `now_ms` would be a no-op.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        self.scan
            .last_scan_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < self.ttl_ms)
    }

    /// Re-probe the monitored peripherals unless the cache is still fresh.
    ///
    /// `force` bypasses the TTL and adds a deep sweep of the bus. Returns
    /// `true` when the bus was actually probed.
    pub fn refresh(
        &mut self,
        bus: &mut dyn BusProbe,
        delay: &mut dyn DelayNs,
        now_ms: u64,
        force: bool,
    ) -> bool {
        if !force && self.is_fresh(now_ms) {
            return false;
        }

        let mut found: heapless::Vec<u8, MAX_SCAN_DEVICES> = heapless::Vec::new();

        for (target, health) in MONITORED_PERIPHERALS.iter().zip(self.peripherals.iter_mut()) {
            let code = probe_with_retry(
                bus,
                delay,
                target.address,
                self.attempts,
                self.retry_delay_ms,
                &mut self.scan,
            );
            health.last_code = code;
            if code.is_ok() {
                health.ok = true;
                health.last_ok_ms = Some(now_ms);
                health.consecutive_failures = 0;
                let _ = found.push(target.address);
            } else {
                if health.ok || health.consecutive_failures == 0 {
                    log::warn!("{} (0x{:02X}) not responding: {:?}", target.name, target.address, code);
                }
                health.ok = false;
                health.last_fail_ms = Some(now_ms);
                health.consecutive_failures = health.consecutive_failures.saturating_add(1);
            }
        }

        if force {
            // Absent addresses always NACK; the sweep is not tallied.
            found.clear();
            for addr in SCAN_FIRST_ADDR..=SCAN_LAST_ADDR {
                if bus.probe(addr).is_ok() {
                    let _ = found.push(addr);
                }
            }
            self.scan.mode = ScanMode::Deep;
        } else {
            self.scan.mode = ScanMode::Quick;
        }

        self.scan.devices = found;
        self.scan.last_scan_ms = Some(now_ms);
        log::debug!(
            "health refresh ({:?}): {} device(s), {} probe failure(s) total",
            self.scan.mode,
            self.scan.devices.len(),
            self.scan.probe_failures
        );
        true
    }

    pub fn scan(&self) -> &ScanCache {
        &self.scan
    }

    pub fn peripherals(&self) -> &[PeripheralHealth] {
        &self.peripherals
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralHealth> {
        MONITORED_PERIPHERALS
            .iter()
            .position(|p| p.name == name)
            .map(|i| &self.peripherals[i])
    }

    /// Milliseconds since the last refresh, `None` before the first.
    pub fn age_ms(&self, now_ms: u64) -> Option<u64> {
        self.scan.last_scan_ms.map(|t| now_ms.saturating_sub(t))
    }

    /// Assemble the health report from cached data. Never probes.
    pub fn report(&self, env: &HealthEnvironment) -> HealthReport {
        let peripherals = MONITORED_PERIPHERALS
            .iter()
            .zip(self.peripherals.iter())
            .map(|(p, h)| PeripheralReport {
                name: p.name,
                address: hex_address(p.address),
                health: *h,
            })
            .collect();

        HealthReport {
            peripherals,
            sound: env.sound_enabled,
            wifi: env.wifi_enabled,
            remote: env.link.is_some_and(LinkState::is_up),
            remote_enabled: env.remote_enabled,
            spiffs: env.filesystem_mounted,
            free_heap: env.free_heap,
            uptime_secs: env.uptime_ms / 1_000,
            i2c_devices: self.scan.devices.iter().map(|a| hex_address(*a)).collect(),
            scan_mode: self.scan.mode,
            scan_age_ms: self.age_ms(env.uptime_ms),
            scan_pending: env.refresh_pending,
            histogram: self.scan.histogram,
            probe_failures: self.scan.probe_failures,
            diagnostics: build_diagnostics(&MONITORED_PERIPHERALS, &self.peripherals, env.link),
        }
    }
}

fn probe_with_retry(
    bus: &mut dyn BusProbe,
    delay: &mut dyn DelayNs,
    address: u8,
    attempts: u8,
    retry_delay_ms: u32,
    scan: &mut ScanCache,
) -> ProbeCode {
    let mut code = ProbeCode::Other;
    for attempt in 0..attempts {
        if attempt > 0 {
            delay.delay_ms(retry_delay_ms);
        }
        code = bus.probe(address);
        scan.histogram.record(code);
        if code.is_ok() {
            break;
        }
        scan.probe_failures = scan.probe_failures.saturating_add(1);
    }
    code
}

fn hex_address(addr: u8) -> String {
    format!("0x{addr:02x}")
}

// ───────────────────────────────────────────────────────────────
// Fault classification
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One derived fault with its remediation hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub code: &'static str,
    pub severity: Severity,
    pub hint: &'static str,
}

/// Ordered fault list. Never empty: a clean bill of health is reported
/// as a single `healthy` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    pub faults: Vec<Fault>,
}

impl Diagnostics {
    pub fn is_healthy(&self) -> bool {
        self.faults.iter().all(|f| f.code == FAULT_HEALTHY)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.faults.iter().any(|f| f.code == code)
    }
}

pub const FAULT_HEALTHY: &str = "healthy";
pub const FAULT_ALL_MISSING: &str = "i2c_all_missing";
pub const FAULT_INTERMITTENT: &str = "i2c_intermittent";
pub const FAULT_LINK_STALE: &str = "remote_link_stale";
pub const FAULT_PENDING: &str = "health_pending";

/// Derive faults from cached peripheral health. Pure.
///
/// `link` is `None` when no droid remote is fitted or enabled.
pub fn build_diagnostics(
    monitored: &[MonitoredPeripheral],
    health: &[PeripheralHealth],
    link: Option<LinkState>,
) -> Diagnostics {
    let mut faults = Vec::new();
    let pairs = || monitored.iter().zip(health.iter());

    let critical_total = pairs().filter(|(p, _)| p.critical).count();
    let critical_missing = pairs().filter(|(p, h)| p.critical && h.is_missing()).count();

    if pairs().any(|(p, h)| p.critical && !h.is_probed()) {
        faults.push(Fault {
            code: FAULT_PENDING,
            severity: Severity::Info,
            hint: "Peripherals not probed yet: the next refresh will report them",
        });
    }

    if critical_total > 0 && critical_missing == critical_total {
        faults.push(Fault {
            code: FAULT_ALL_MISSING,
            severity: Severity::Critical,
            hint: "No servo controllers respond: check I2C power, SDA/SCL wiring and pull-ups",
        });
    } else {
        for (p, _) in pairs().filter(|(p, h)| p.critical && h.is_missing()) {
            faults.push(Fault {
                code: p.fault_code,
                severity: Severity::Critical,
                hint: p.missing_hint,
            });
        }
    }

    if pairs().any(|(_, h)| h.consecutive_failures >= 2) {
        faults.push(Fault {
            code: FAULT_INTERMITTENT,
            severity: Severity::Warning,
            hint: "Repeated probe failures: reseat I2C connectors and check for brown-outs",
        });
    }

    if link == Some(LinkState::Stale) {
        faults.push(Fault {
            code: FAULT_LINK_STALE,
            severity: Severity::Warning,
            hint: "No signal from the droid remote: check its battery and pairing",
        });
    }

    if faults.is_empty() {
        faults.push(Fault {
            code: FAULT_HEALTHY,
            severity: Severity::Info,
            hint: "All monitored systems nominal",
        });
    }

    Diagnostics { faults }
}

// ───────────────────────────────────────────────────────────────
// Health report
// ───────────────────────────────────────────────────────────────

/// Non-bus inputs to the health report, gathered by the service.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthEnvironment {
    pub sound_enabled: bool,
    pub wifi_enabled: bool,
    pub remote_enabled: bool,
    pub link: Option<LinkState>,
    pub filesystem_mounted: bool,
    pub free_heap: u32,
    pub uptime_ms: u64,
    /// A refresh or rescan is queued for the next tick.
    pub refresh_pending: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeripheralReport {
    pub name: &'static str,
    pub address: String,
    #[serde(flatten)]
    pub health: PeripheralHealth,
}

/// Health payload for `/api/health` and the `health` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub peripherals: Vec<PeripheralReport>,
    #[serde(rename = "sound_module")]
    pub sound: bool,
    pub wifi: bool,
    /// Remote link currently up.
    pub remote: bool,
    pub remote_enabled: bool,
    pub spiffs: bool,
    #[serde(rename = "freeHeap")]
    pub free_heap: u32,
    #[serde(rename = "uptime")]
    pub uptime_secs: u64,
    pub i2c_devices: Vec<String>,
    pub scan_mode: ScanMode,
    pub scan_age_ms: Option<u64>,
    /// The data above predates a refresh that has been requested.
    pub scan_pending: bool,
    pub histogram: ProbeHistogram,
    pub probe_failures: u32,
    pub diagnostics: Diagnostics,
}
