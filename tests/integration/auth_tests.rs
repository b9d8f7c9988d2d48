//! Integration tests for write authorisation across the route table.

use crate::mock_hw::Harness;

use astrogate::api::codec::{Request, TOKEN_HEADER};
use astrogate::app::ports::{PowerControl, PreferenceStore};

const OPEN_WARNING: &str = "[AUTH] WARNING: no API token configured";

#[test]
fn open_gateway_allows_writes_and_warns_once() {
    let mut h = Harness::new();
    for i in 0..10 {
        let r = h.handle(Request::post("/api/cmd").param("cmd", &format!(":SE{i:02}")));
        assert_eq!(r.code(), 200, "write #{i} must succeed");
    }
    assert_eq!(h.dev.engine.commands.len(), 10);
    assert_eq!(h.console().count_matching(OPEN_WARNING), 1);
    assert_eq!(h.console().count_matching("API token"), 1, "one open-mode warning in total");
}

#[test]
fn wrong_token_is_rejected_without_state_change() {
    let mut h = Harness::with_token("s3cret");
    h.dev.store.put_string("devname", "R2").unwrap();

    let attempts = [
        Request::post("/api/cmd").param("cmd", ":OP00"),
        Request::post("/api/pref").param("key", "devname").param("val", "BB8"),
        Request::post("/api/pref").param("key", "_clear").param("val", ""),
        Request::post("/api/sleep"),
        Request::post("/api/reboot"),
    ];
    for req in attempts {
        let r = h.handle(req.clone().header(TOKEN_HEADER, "wrong"));
        assert_eq!(r.code(), 401, "{} with wrong token", req.path);
        let r = h.handle(req.clone());
        assert_eq!(r.code(), 401, "{} without token", req.path);
    }

    assert!(h.dev.engine.commands.is_empty());
    assert_eq!(h.dev.store.get_string("devname").as_deref(), Some("R2"));
    assert!(!h.dev.power.is_sleeping());
    assert_eq!(h.svc.context().reboot.requests(), 0);
    assert_eq!(h.console().count_matching(OPEN_WARNING), 0);
}

#[test]
fn header_or_body_token_is_accepted() {
    let mut h = Harness::with_token("s3cret");
    let r = h.handle(Request::post("/api/cmd").param("cmd", "A").header("x-ap-token", "s3cret"));
    assert_eq!(r.code(), 200);
    let r = h.handle(Request::post("/api/cmd").param("cmd", "B").param("token", "s3cret"));
    assert_eq!(r.code(), 200);
    assert_eq!(h.dev.engine.commands, vec!["A", "B"]);
}

#[test]
fn reads_need_no_token() {
    let mut h = Harness::with_token("s3cret");
    assert_eq!(h.handle(Request::get("/api/state")).code(), 200);
    assert_eq!(h.handle(Request::get("/api/health")).code(), 200);
    assert_eq!(h.handle(Request::get("/api/logs")).code(), 200);
    assert_eq!(h.handle(Request::get("/api/pref").param("keys", "devname")).code(), 200);
}

#[test]
fn empty_configured_token_leaves_gateway_open() {
    let mut h = Harness::with_token("");
    assert_eq!(h.handle(Request::post("/api/wake")).code(), 200);
    assert_eq!(h.console().count_matching(OPEN_WARNING), 1);
}
