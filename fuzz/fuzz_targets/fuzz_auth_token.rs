//! Fuzz target: `AuthGuard::check_token`
//!
//! Splits the input into a secret and a candidate token.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A guard built from a non-empty secret accepts the candidate ONLY when
//!   it equals the secret
//! - An empty secret leaves the guard open
//!
//! cargo fuzz run fuzz_auth_token

#![no_main]

use astrogate::api::auth::AuthGuard;
use astrogate::log_capture::Console;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (secret, candidate) = text.split_once('\0').unwrap_or((text, ""));

    let console = Console::detached();
    let guard = AuthGuard::new(Some(secret));

    if secret.is_empty() {
        assert!(guard.is_open());
        assert!(guard.check_token(Some(candidate), &console).is_ok());
        return;
    }

    let accepted = guard.check_token(Some(candidate), &console).is_ok();
    assert_eq!(accepted, candidate == secret);
    assert!(guard.check_token(None, &console).is_err());
});
