//! Integration tests for JSON configuration and the preference schema.

use crate::mock_hw::Harness;

use astrogate::api::codec::Request;
use astrogate::config::GatewayConfig;
use astrogate::prefs::PreferenceSchema;

#[test]
fn custom_schema_replaces_the_allow_list() {
    let config = GatewayConfig::from_json(
        r#"{
            "max_command_len": 8,
            "preferences": [
                {"key": "domecolor", "type": "string", "max_len": 7},
                {"key": "quiet", "type": "bool"}
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(config.preferences.len(), 2);
    assert_eq!(config.health_ttl_ms, 3_000, "unspecified fields keep defaults");

    let mut h = Harness::with_config(config);
    assert!(h.handle(Request::post("/api/pref").param("key", "domecolor").param("val", "#00ff00")).is_ok());
    assert!(h.handle(Request::post("/api/pref").param("key", "quiet").param("val", "1")).is_ok());
    assert_eq!(
        h.handle(Request::post("/api/pref").param("key", "devname").param("val", "R2")).code(),
        400,
        "default keys are no longer allowed"
    );

    let r = h.handle(Request::get("/api/pref").param("keys", "quiet,domecolor"));
    assert_eq!(r.body, r##"{"quiet":true,"domecolor":"#00ff00"}"##);

    assert_eq!(h.handle(Request::post("/api/cmd").param("cmd", "123456789")).code(), 400);
    assert_eq!(h.handle(Request::post("/api/cmd").param("cmd", "12345678")).code(), 200);
}

#[test]
fn schema_with_bad_key_is_rejected() {
    assert!(PreferenceSchema::from_json(r#"[{"key": "this_key_is_far_too_long", "type": "string"}]"#).is_err());
    assert!(PreferenceSchema::from_json(r#"[{"key": "_clear", "type": "bool"}]"#).is_err());
    assert!(GatewayConfig::from_json(r#"{"preferences": [{"key": "", "type": "bool"}]}"#).is_err());
}

#[test]
fn broadcast_intervals_come_from_config() {
    let config = GatewayConfig {
        state_interval_ms: 250,
        ..GatewayConfig::default()
    };
    let mut h = Harness::with_config(config);
    h.dev.transport.subscribers = 1;
    h.tick();
    h.advance(250);
    h.advance(250);
    assert_eq!(h.dev.transport.of_type("state").len(), 3);
}
