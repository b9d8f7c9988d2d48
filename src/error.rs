//! Unified error types for the gateway.
//!
//! A single `GatewayError` enum that every component converts into, so the
//! dispatch table can map any failure to one response code. Sub-errors are
//! `Copy` where they carry no owned data, mirroring how they are matched in
//! handlers and tests.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level gateway error
// ---------------------------------------------------------------------------

/// Every fallible operation in the management plane funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Malformed, oversized or disallowed input. Nothing was mutated.
    Validation(ValidationError),
    /// Missing or incorrect API token. Nothing was mutated.
    Unauthorized,
    /// The device is in a protective mode that suppresses the request.
    SafetyBlocked { hint: &'static str },
    /// A firmware update session failed.
    Update(UpdateError),
    /// The persistent store rejected a write.
    Storage(StorageError),
}

impl GatewayError {
    /// Response code reported to the caller.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::InvalidInput,
            Self::Unauthorized => Status::Unauthorized,
            Self::SafetyBlocked { .. } => Status::Blocked,
            Self::Update(_) | Self::Storage(_) => Status::Failure,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::SafetyBlocked { .. } => write!(f, "blocked: device is sleeping"),
            Self::Update(e) => write!(f, "update: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A required request parameter is absent.
    MissingParam(&'static str),
    /// Command string is empty.
    EmptyCommand,
    /// Command string exceeds the maximum length.
    CommandTooLong,
    /// Command contains a byte outside printable ASCII.
    NonPrintable,
    /// Preference key is empty after trimming.
    EmptyKey,
    /// Preference key exceeds the store's key bound.
    KeyTooLong,
    /// Preference key is not in the allow-list.
    KeyNotAllowed,
    /// Preference value exceeds the key's declared length.
    ValueTooLong,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParam(name) => write!(f, "missing {name} param"),
            Self::EmptyCommand => write!(f, "empty command"),
            Self::CommandTooLong => write!(f, "command too long"),
            Self::NonPrintable => write!(f, "command must be printable ASCII"),
            Self::EmptyKey => write!(f, "empty key"),
            Self::KeyTooLong => write!(f, "key too long"),
            Self::KeyNotAllowed => write!(f, "key not allowed"),
            Self::ValueTooLong => write!(f, "value too long"),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Firmware update errors
// ---------------------------------------------------------------------------

/// Session-fatal update failures. The running firmware is never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// The flash writer refused to open a session of the declared size.
    BeginFailed,
    /// A chunk write failed or wrote fewer bytes than given.
    WriteFailed,
    /// Image verification or boot-partition commit failed.
    FinalizeFailed,
    /// A second upload began while one was still receiving.
    Conflict,
    /// The chunk queue overflowed before the loop could drain it.
    QueueOverflow,
    /// The client disconnected or stopped sending mid-upload.
    Abandoned,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginFailed => write!(f, "flash begin failed"),
            Self::WriteFailed => write!(f, "flash write failed"),
            Self::FinalizeFailed => write!(f, "image finalize failed"),
            Self::Conflict => write!(f, "conflicting upload session"),
            Self::QueueOverflow => write!(f, "upload queue overflow"),
            Self::Abandoned => write!(f, "upload abandoned"),
        }
    }
}

impl From<UpdateError> for GatewayError {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

impl From<StorageError> for GatewayError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Response codes
// ---------------------------------------------------------------------------

/// Response codes of the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    InvalidInput,
    Unauthorized,
    NotFound,
    Blocked,
    Failure,
}

impl Status {
    /// HTTP status code used on the wire.
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::InvalidInput => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Blocked => 423,
            Self::Failure => 500,
        }
    }
}
