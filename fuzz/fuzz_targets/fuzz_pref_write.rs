//! Fuzz target: `PreferenceProxy::write` / `read`
//!
//! Interprets the input as `key=value` and writes it through the default
//! allow-list into an in-memory store.
//!
//! Invariants checked:
//! - No panics under any key or value
//! - Keys outside the allow-list never reach the store
//! - Values over the entry's length limit are refused
//! - Sensitive values never read back in clear
//!
//! cargo fuzz run fuzz_pref_write

#![no_main]

use astrogate::adapters::nvs::MemoryStore;
use astrogate::log_capture::Console;
use astrogate::prefs::{PrefValue, PreferenceProxy, PreferenceSchema, WriteOutcome};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (key, value) = text.split_once('=').unwrap_or((text, ""));

    let schema = PreferenceSchema::default();
    let console = Console::detached();
    let proxy = PreferenceProxy::new(&schema, &console);
    let mut store = MemoryStore::new();

    match proxy.write(&mut store, key, value) {
        Ok(WriteOutcome::Cleared) => assert!(store.is_empty()),
        Ok(WriteOutcome::Stored { key }) => {
            let entry = schema.entry(&key).expect("stored key is allow-listed");
            assert!(value.len() <= entry.max_len);
            let readout = proxy.read(&store, &key).expect("allow-listed key reads");
            if entry.sensitive && !value.is_empty() {
                assert_eq!(readout.get(&key), Some(&PrefValue::Str("********".into())));
            }
        }
        Err(_) => assert!(store.is_empty()),
    }
});
