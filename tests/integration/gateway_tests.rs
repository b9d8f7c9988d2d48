//! Integration tests for the request → route table → ports pipeline.
//!
//! These run on the host and drive the gateway exactly as the network
//! layer and the main loop would, against the mock device.

use crate::mock_hw::{Harness, MockBus};

use core::time::Duration;

use astrogate::api::codec::Request;
use astrogate::api::ratelimit::ScanLimiter;
use astrogate::app::context::GatewayContext;
use astrogate::app::ports::{PowerControl, PreferenceStore};
use astrogate::config::{Capabilities, GatewayConfig};
use astrogate::log_capture::Console;
use astrogate::telemetry::SignalCounter;

// ── Commands ──────────────────────────────────────────────────

#[test]
fn ten_char_command_forwarded_then_blocked_while_sleeping() {
    let mut h = Harness::new();
    let cmd = ":OP00:CL01";
    assert_eq!(cmd.len(), 10);

    let r = h.handle(Request::post("/api/cmd").param("cmd", cmd));
    assert_eq!(r.code(), 200);
    assert_eq!(r.body, r#"{"ok":true}"#);
    assert_eq!(h.dev.engine.commands, vec![cmd]);
    assert_eq!(h.console().count_matching("[API] cmd: :OP00:CL01"), 1);

    assert!(h.handle(Request::post("/api/sleep")).is_ok());
    let r = h.handle(Request::post("/api/cmd").param("cmd", cmd));
    assert_eq!(r.code(), 423);
    let body = r.body_json().unwrap();
    assert_eq!(body["error"], "blocked");
    assert_eq!(body["hint"], "POST /api/wake");
    assert_eq!(h.dev.engine.commands.len(), 1, "blocked command must not be forwarded");
    assert_eq!(h.console().count_matching("[BLOCKED] cmd: :OP00:CL01"), 1);

    assert!(h.handle(Request::post("/api/wake")).is_ok());
    assert!(h.handle(Request::post("/api/cmd").param("cmd", cmd)).is_ok());
    assert_eq!(h.dev.engine.commands.len(), 2);
}

#[test]
fn malformed_commands_are_rejected_without_forwarding() {
    let mut h = Harness::new();

    let r = h.handle(Request::post("/api/cmd"));
    assert_eq!(r.code(), 400);
    assert_eq!(r.body_json().unwrap()["error"], "missing cmd param");

    let long = "x".repeat(65);
    for bad in ["", "tab\there", long.as_str()] {
        let r = h.handle(Request::post("/api/cmd").param("cmd", bad));
        assert_eq!(r.code(), 400, "{bad:?} must be rejected");
    }
    assert!(h.dev.engine.commands.is_empty());
}

#[test]
fn live_channel_frames_are_commands_with_ws_tag() {
    let mut h = Harness::with_token("s3cret");
    h.frame("@0T1", Some("s3cret")).unwrap();
    assert_eq!(h.dev.engine.commands, vec!["@0T1"]);
    assert_eq!(h.console().count_matching("[WS] cmd: @0T1"), 1);

    assert!(h.frame("@0T2", None).is_err());
    assert!(h.frame("@0T2", Some("nope")).is_err());
    assert_eq!(h.dev.engine.commands.len(), 1);
}

// ── Routing ───────────────────────────────────────────────────

#[test]
fn unknown_route_and_wrong_method_are_404() {
    let mut h = Harness::new();
    assert_eq!(h.handle(Request::get("/api/nope")).code(), 404);
    assert_eq!(h.handle(Request::get("/api/cmd")).code(), 404);
    assert_eq!(h.handle(Request::post("/api/state")).code(), 404);
}

#[test]
fn state_reports_device_summary() {
    let mut h = Harness::new();
    h.dev.system.now_ms = 42_500;
    h.dev.system.heap = 123_456;

    let body = h.handle(Request::get("/api/state")).body_json().unwrap();
    assert_eq!(body["wifiEnabled"], true);
    assert_eq!(body["remoteEnabled"], false);
    assert!(body.get("remoteConnected").is_none(), "no remote fitted");
    assert_eq!(body["uptime"], 42);
    assert_eq!(body["freeHeap"], 123_456);
    assert_eq!(body["sleeping"], false);
    assert_eq!(body["otaInProgress"], false);
}

// ── Health ────────────────────────────────────────────────────

#[test]
fn health_reads_the_cache_and_tick_refreshes_it() {
    let mut h = Harness::new();

    let body = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert!(body["scan_age_ms"].is_null(), "nothing probed before the first tick");
    assert_eq!(body["scan_pending"], true);
    assert_eq!(body["diagnostics"][0]["code"], "health_pending");
    assert!(
        body["diagnostics"]
            .as_array()
            .unwrap()
            .iter()
            .all(|d| d["code"] != "i2c_all_missing"),
        "unprobed peripherals are not missing"
    );
    assert_eq!(h.dev.bus.probes, 0, "readers never probe");

    h.tick();
    let probes = h.dev.bus.probes;
    assert_eq!(probes, 2);

    let body = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert_eq!(body["scan_mode"], "quick");
    assert_eq!(body["scan_pending"], false);
    assert_eq!(body["i2c_devices"], serde_json::json!(["0x40", "0x41"]));
    assert_eq!(body["diagnostics"][0]["code"], "healthy");
    assert_eq!(body["peripherals"][0]["name"], "panels");
    assert_eq!(body["peripherals"][0]["ok"], true);

    // Nobody reads and nobody listens: the bus stays quiet past the TTL.
    h.advance(1_000);
    h.advance(3_000);
    assert_eq!(h.dev.bus.probes, probes);

    // A stale read asks for a refresh, which the next tick runs.
    let body = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert_eq!(body["scan_pending"], true);
    assert_eq!(h.dev.bus.probes, probes);
    h.tick();
    assert_eq!(h.dev.bus.probes, probes + 2);
    h.tick();
    assert_eq!(h.dev.bus.probes, probes + 2, "request consumed");
}

#[test]
fn scan_flag_queues_a_deep_sweep_for_the_next_tick() {
    let mut h = Harness::new();
    h.handle(Request::get("/api/health"));
    h.tick();
    let before = h.dev.bus.probes;
    h.dev.bus.present.push(0x70);

    let body = h
        .handle(Request::get("/api/health").param("scan", "1"))
        .body_json()
        .unwrap();
    assert_eq!(body["scan_mode"], "quick");
    assert_eq!(body["scan_pending"], true, "cached data predates the sweep");
    assert_eq!(body["i2c_devices"], serde_json::json!(["0x40", "0x41"]));
    assert_eq!(h.dev.bus.probes, before);

    h.advance(10);
    assert!(h.dev.bus.probes >= before + 2 + 126);
    let body = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert_eq!(body["scan_mode"], "deep");
    assert_eq!(body["scan_pending"], false);
    assert_eq!(body["i2c_devices"], serde_json::json!(["0x40", "0x41", "0x70"]));
}

fn frozen_clock() -> Duration {
    Duration::from_secs(10)
}

#[test]
fn exhausted_scan_limiter_degrades_to_ttl_refresh() {
    let mut h = Harness::with_context(|store| {
        GatewayContext::new(GatewayConfig::default(), Console::detached(), store)
            .with_scan_limiter(ScanLimiter::with_clock(1, frozen_clock))
    });
    h.tick();

    let scan = Request::get("/api/health").param("scan", "1");
    assert!(h.handle(scan.clone()).is_ok());
    h.advance(10);
    let after_deep = h.dev.bus.probes;

    // Bucket is empty and the clock never moves: the second request is
    // answered from cache and queues nothing.
    assert!(h.handle(scan).is_ok());
    assert!(!h.svc.context().rescan_requested);
    assert!(!h.svc.context().refresh_requested, "cache is still fresh");
    assert_eq!(h.svc.context().scan_limiter.denied(), 1);
    h.advance(10);
    assert_eq!(h.dev.bus.probes, after_deep, "still inside the TTL");
}

#[test]
fn pending_rescan_flag_runs_on_next_tick() {
    let mut h = Harness::new();
    h.tick();
    h.svc.context_mut().rescan_requested = true;
    h.tick();
    assert!(!h.svc.context().rescan_requested, "flag consumed");
    let body = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert_eq!(body["scan_mode"], "deep");
}

#[test]
fn missing_panels_reported_as_specific_fault() {
    let mut h = Harness::new();
    h.dev.bus = MockBus::with(&[0x41]);
    h.handle(Request::get("/api/health"));
    h.tick();
    let body = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert_eq!(body["diagnostics"][0]["code"], "panels_missing");
    assert_eq!(body["peripherals"][0]["ok"], false);
    assert_eq!(body["peripherals"][0]["last_code"], "address_nack");
    assert!(body["probe_failures"].as_u64().unwrap() >= 3);
}

#[test]
fn stale_remote_link_becomes_a_fault() {
    static LINK: SignalCounter = SignalCounter::new();
    let config = GatewayConfig {
        capabilities: Capabilities {
            droid_remote: true,
            sound_module: false,
        },
        ..GatewayConfig::default()
    };
    let mut h = Harness::with_context(|store| {
        GatewayContext::new(config, Console::detached(), store).with_signal_source(&LINK)
    });
    h.dev.store.put_bool("remote", true).unwrap();

    LINK.record_signal(1_000);
    h.dev.system.now_ms = 2_000;
    h.handle(Request::get("/api/health"));
    h.tick();
    let state = h.handle(Request::get("/api/state")).body_json().unwrap();
    assert_eq!(state["remoteEnabled"], true);
    assert_eq!(state["remoteConnected"], true);

    h.dev.system.now_ms = 10_000;
    let health = h.handle(Request::get("/api/health")).body_json().unwrap();
    assert_eq!(health["remote"], false);
    assert_eq!(health["diagnostics"][0]["code"], "remote_link_stale");
}

// ── Logs ──────────────────────────────────────────────────────

#[test]
fn logs_route_returns_retained_lines_oldest_first() {
    let mut h = Harness::new();
    h.handle(Request::post("/api/cmd").param("cmd", "A"));
    h.handle(Request::post("/api/cmd").param("cmd", "B"));

    let body = h.handle(Request::get("/api/logs")).body_json().unwrap();
    let lines: Vec<&str> = body["lines"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    let a = lines.iter().position(|l| *l == "[API] cmd: A").unwrap();
    let b = lines.iter().position(|l| *l == "[API] cmd: B").unwrap();
    assert!(a < b);

    let total = body["total"].as_u64().unwrap();
    let since = h
        .handle(Request::get("/api/logs").param("since", &total.to_string()))
        .body_json()
        .unwrap();
    assert!(since["lines"].as_array().unwrap().is_empty());
}

// ── Preferences ───────────────────────────────────────────────

#[test]
fn pref_write_then_read_preserves_order_and_types() {
    let mut h = Harness::new();
    assert!(h.handle(Request::post("/api/pref").param("key", "devname").param("val", "R2-D2")).is_ok());
    assert!(h.handle(Request::post("/api/pref").param("key", " wifi ").param("val", "true")).is_ok());
    assert!(h.handle(Request::post("/api/pref").param("key", "pass").param("val", "hunter22")).is_ok());

    let r = h.handle(Request::get("/api/pref").param("keys", "wifi,devname,pass"));
    assert_eq!(r.body, r#"{"wifi":true,"devname":"R2-D2","pass":"********"}"#);
    assert_eq!(h.console().count_matching("hunter22"), 0, "sensitive value must not be logged");
    assert_eq!(h.console().count_matching("[API] pref: pass = ********"), 1);
}

#[test]
fn pref_rejections_leave_store_unchanged() {
    let mut h = Harness::new();
    h.handle(Request::post("/api/pref").param("key", "devname").param("val", "R2"));
    let before = h.dev.store.len();

    let r = h.handle(Request::post("/api/pref").param("key", "evil").param("val", "1"));
    assert_eq!(r.code(), 400);
    let r = h.handle(Request::post("/api/pref").param("key", "devname").param("val", &"x".repeat(33)));
    assert_eq!(r.code(), 400);
    let r = h.handle(Request::post("/api/pref").param("key", "devname"));
    assert_eq!(r.code(), 400);

    assert_eq!(h.dev.store.len(), before);
    assert_eq!(h.dev.store.get_string("devname").as_deref(), Some("R2"));

    let r = h.handle(Request::get("/api/pref").param("keys", "devname,evil"));
    assert_eq!(r.code(), 400);
    assert_eq!(h.handle(Request::get("/api/pref")).code(), 400);
}

#[test]
fn clear_key_erases_everything() {
    let mut h = Harness::new();
    h.handle(Request::post("/api/pref").param("key", "devname").param("val", "R2"));
    h.handle(Request::post("/api/pref").param("key", "ap").param("val", "1"));
    assert!(h.handle(Request::post("/api/pref").param("key", "_clear").param("val", "")).is_ok());
    assert!(h.dev.store.is_empty());
    assert_eq!(h.console().count_matching("Factory reset"), 1);
}

#[test]
fn pref_reboot_flag_defers_the_restart() {
    let mut h = Harness::new();
    let r = h.handle(
        Request::post("/api/pref")
            .param("key", "devname")
            .param("val", "R2")
            .param("reboot", "1"),
    );
    assert!(r.is_ok());
    assert_eq!(h.dev.system.reboots, 0, "never inline");

    h.advance(100);
    assert_eq!(h.dev.system.reboots, 0);
    h.advance(500);
    assert_eq!(h.dev.system.reboots, 1);
    h.advance(5_000);
    assert_eq!(h.dev.system.reboots, 1, "fires once");
}

#[test]
fn stored_token_overrides_config() {
    let mut dev_store = astrogate::adapters::nvs::MemoryStore::new();
    dev_store.put_string("apitoken", "from-nvs").unwrap();
    let config = GatewayConfig {
        api_token: Some("from-config".into()),
        ..GatewayConfig::default()
    };
    let mut h = Harness::with_context(|_| GatewayContext::new(config, Console::detached(), &dev_store));

    let r = h.handle(Request::post("/api/cmd").param("cmd", "X").param("token", "from-config"));
    assert_eq!(r.code(), 401);
    let r = h.handle(Request::post("/api/cmd").param("cmd", "X").param("token", "from-nvs"));
    assert_eq!(r.code(), 200);
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn reboot_route_answers_then_restarts_on_a_later_tick() {
    let mut h = Harness::new();
    let r = h.handle(Request::post("/api/reboot"));
    assert_eq!(r.body_json().unwrap()["msg"], "rebooting");
    assert_eq!(h.dev.system.reboots, 0);
    h.advance(499);
    assert_eq!(h.dev.system.reboots, 0);
    h.advance(1);
    assert_eq!(h.dev.system.reboots, 1);
}

#[test]
fn sleep_and_wake_toggle_power_mode() {
    let mut h = Harness::new();
    h.handle(Request::post("/api/sleep"));
    assert!(h.dev.power.is_sleeping());
    let state = h.handle(Request::get("/api/state")).body_json().unwrap();
    assert_eq!(state["sleeping"], true);
    h.handle(Request::post("/api/wake"));
    assert!(!h.dev.power.is_sleeping());
}

// ── Live channel ──────────────────────────────────────────────

#[test]
fn no_subscribers_means_no_frames() {
    let mut h = Harness::new();
    h.handle(Request::post("/api/cmd").param("cmd", "X"));
    for _ in 0..20 {
        h.advance(1_000);
    }
    assert!(h.dev.transport.frames.is_empty());
    assert_eq!(h.dev.transport.cleanups, 20, "cleanup runs every tick");
    assert_eq!(h.dev.bus.probes, 0, "no readers and no listeners, no probing");
}

#[test]
fn subscribers_get_state_health_and_logs_on_cadence() {
    let mut h = Harness::new();
    h.dev.transport.subscribers = 1;
    h.handle(Request::post("/api/cmd").param("cmd", "PING"));

    h.tick();
    assert_eq!(h.dev.transport.of_type("state").len(), 1);
    assert_eq!(h.dev.transport.of_type("health").len(), 1);
    let logs = h.dev.transport.of_type("log");
    assert!(logs.iter().any(|f| f["line"] == "[API] cmd: PING"));

    h.advance(1_000);
    assert_eq!(h.dev.transport.of_type("state").len(), 2);
    assert_eq!(h.dev.transport.of_type("health").len(), 1);

    h.advance(9_000);
    assert_eq!(h.dev.transport.of_type("health").len(), 2);
    let health = h.dev.transport.of_type("health");
    assert_eq!(health[1]["data"]["scan_mode"], "deep", "health cadence forces a rescan");
}
