//! Actuator command gateway.
//!
//! Operator commands arrive over HTTP (`POST /api/cmd`) and over the live
//! channel. The gateway checks their *shape* only: the command language
//! belongs to the external actuator engine.
//!
//! 1. Non-empty, at most `max_len` bytes, printable ASCII.
//! 2. The safety gate may suppress it: logged `[BLOCKED]`, not forwarded.
//! 3. Otherwise logged with its origin tag and handed to the engine.

use crate::console_line;
use crate::error::{GatewayError, ValidationError};
use crate::log_capture::Console;

use super::ports::{ActuatorEngine, SafetyGate};

/// Where a command came from; shown as its log tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// `POST /api/cmd`
    Api,
    /// Live-channel text frame.
    Socket,
}

impl CommandOrigin {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Api => "[API]",
            Self::Socket => "[WS]",
        }
    }
}

/// Check command shape. Returns the command unchanged on success.
pub fn validate_command(cmd: &str, max_len: usize) -> Result<&str, ValidationError> {
    if cmd.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    if cmd.len() > max_len {
        return Err(ValidationError::CommandTooLong);
    }
    if !cmd.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(ValidationError::NonPrintable);
    }
    Ok(cmd)
}

/// Validates and forwards actuator commands.
pub struct CommandGateway {
    max_len: usize,
    forwarded: u32,
    blocked: u32,
}

impl CommandGateway {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            forwarded: 0,
            blocked: 0,
        }
    }

    pub fn submit<G: SafetyGate + ?Sized>(
        &mut self,
        cmd: &str,
        origin: CommandOrigin,
        gate: &G,
        engine: &mut dyn ActuatorEngine,
        console: &Console,
    ) -> Result<(), GatewayError> {
        let cmd = validate_command(cmd, self.max_len)?;

        if gate.is_suppressed(cmd) {
            console_line!(console, "[BLOCKED] cmd: {}", cmd);
            self.blocked = self.blocked.saturating_add(1);
            return Err(GatewayError::SafetyBlocked { hint: gate.hint() });
        }

        console_line!(console, "{} cmd: {}", origin.tag(), cmd);
        engine.process_command(cmd);
        self.forwarded = self.forwarded.saturating_add(1);
        Ok(())
    }

    pub fn forwarded(&self) -> u32 {
        self.forwarded
    }

    pub fn blocked(&self) -> u32 {
        self.blocked
    }
}
