//! Request/response model for the management API.
//!
//! The network layer decodes HTTP and live-channel traffic into a
//! [`Request`] and writes back whatever [`Response`] the dispatch table
//! returns. Bodies are serialised from typed values with `serde_json`.
//!
//! ```text
//!  HTTP / WS ──▶ Request { method, path, params, headers } ──▶ ROUTES
//!                                                                │
//!  HTTP / WS ◀── Response { status, content_type, body } ◀───────┘
//! ```

use serde::Serialize;
use serde_json::json;

use crate::error::{GatewayError, Status};

/// Header carrying the write-authorisation token.
pub const TOKEN_HEADER: &str = "X-AP-Token";

/// Body/query field carrying the write-authorisation token.
pub const TOKEN_PARAM: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A decoded inbound request. Query and form parameters share one list.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    /// Add a query/form parameter.
    #[must_use]
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First value of parameter `name`.
    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The write token from the header, else from the body field.
    pub fn token(&self) -> Option<&str> {
        self.header_value(TOKEN_HEADER)
            .or_else(|| self.param_value(TOKEN_PARAM))
    }

    /// Whether `name` was sent as `"1"`.
    pub fn flag(&self, name: &str) -> bool {
        self.param_value(name) == Some("1")
    }
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    /// `200` with a JSON body.
    pub fn json(value: &impl Serialize) -> Self {
        Self::json_with(Status::Ok, value)
    }

    pub fn json_with(status: Status, value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => {
                log::warn!("response serialisation failed: {e}");
                Self::text(Status::Failure, "serialisation failed")
            }
        }
    }

    /// `200 {"ok":true}`.
    pub fn ok() -> Self {
        Self::json(&json!({ "ok": true }))
    }

    pub fn text(status: Status, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::json_with(Status::NotFound, &json!({ "error": "not found" }))
    }

    pub fn code(&self) -> u16 {
        self.status.code()
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Parse the body back into JSON (tests, logging).
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

impl From<GatewayError> for Response {
    fn from(err: GatewayError) -> Self {
        let body = match &err {
            GatewayError::SafetyBlocked { hint } => json!({ "error": "blocked", "hint": hint }),
            other => json!({ "error": other.to_string() }),
        };
        Self::json_with(err.status(), &body)
    }
}
