//! Write authorisation, shared-secret token.
//!
//! Every mutating route and every live-channel frame passes through
//! [`AuthGuard::check_write_auth`]:
//!
//! 1. No secret configured: allow, and warn once per process that the
//!    API is open.
//! 2. Secret configured: the request must carry the token in the
//!    `X-AP-Token` header or the `token` body field.
//! 3. The supplied token is checked with `HMAC-SHA256` verification, so
//!    timing reveals nothing beyond pass/fail.
//!
//! Crypto is handled by the `hmac-sha256` crate: pure Rust, no_std,
//! constant-time verification, identical on ESP-IDF and host targets.

use core::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use super::codec::Request;
use crate::console_line;
use crate::error::GatewayError;
use crate::log_capture::Console;

/// Fixed message authenticated under the secret.
const TOKEN_DOMAIN: &[u8] = b"astrogate-write-token-v1";

/// Gate for mutating operations.
pub struct AuthGuard {
    /// `HMAC-SHA256(secret, TOKEN_DOMAIN)`, `None` when open.
    expected: Option<[u8; 32]>,
    warned_open: AtomicBool,
}

impl AuthGuard {
    /// Build a guard; an empty secret counts as none.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            expected: secret
                .filter(|s| !s.is_empty())
                .map(|s| hmac_sha256::HMAC::mac(TOKEN_DOMAIN, s.as_bytes())),
            warned_open: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.expected.is_none()
    }

    /// Decide whether `request` may mutate state.
    pub fn check_write_auth(&self, request: &Request, console: &Console) -> Result<(), GatewayError> {
        self.check_token(request.token(), console)
    }

    /// Same decision for a bare token (live-channel frames).
    pub fn check_token(&self, token: Option<&str>, console: &Console) -> Result<(), GatewayError> {
        let Some(expected) = &self.expected else {
            if !self.warned_open.swap(true, Ordering::Relaxed) {
                console_line!(
                    console,
                    "[AUTH] WARNING: no API token configured, write endpoints are open"
                );
            }
            return Ok(());
        };

        match token {
            Some(t) if verify_token(expected, t) => Ok(()),
            Some(_) => {
                warn!("auth: token mismatch");
                Err(GatewayError::Unauthorized)
            }
            None => {
                warn!("auth: write request without token");
                Err(GatewayError::Unauthorized)
            }
        }
    }
}

/// Constant-time comparison of `candidate` against the expected tag.
fn verify_token(expected: &[u8; 32], candidate: &str) -> bool {
    hmac_sha256::HMAC::verify(TOKEN_DOMAIN, candidate.as_bytes(), expected)
}
