//! Chunked firmware update state machine.
//!
//! Flow: Begin → N × Data → Final → completion response → deferred reboot
//!
//! ```text
//!          begin ok            final ok
//!   Idle ───────────▶ Receiving ────────▶ Succeeded
//!     ▲                   │
//!     │   begin err /     │ write err / short write /
//!     │   second begin    │ finalize err / queue overflow /
//!     │                   │ client gone / upload stalled
//!     │                   ▼
//!     └── next begin ── Failed  (further data ignored)
//! ```
//!
//! The controller never touches the running image; every failure is
//! session-fatal but the process keeps running. Flash access goes through
//! the [`FlashWriter`] port so the same logic drives `esp-ota` on target
//! and an in-memory writer in tests.

use log::{info, warn};

use crate::app::ports::{FlashWriter, StatusIndicator, SystemPort};
use crate::console_line;
use crate::error::UpdateError;
use crate::log_capture::Console;

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Receiving,
    Failed(UpdateError),
    Succeeded,
}

/// The single live update session.
pub struct UpdateController {
    phase: UpdatePhase,
    bytes_written: u32,
    declared_total: u32,
    /// Final step processed for the current session.
    finished: bool,
}

impl UpdateController {
    pub fn new() -> Self {
        Self {
            phase: UpdatePhase::Idle,
            bytes_written: 0,
            declared_total: 0,
            finished: false,
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn is_receiving(&self) -> bool {
        self.phase == UpdatePhase::Receiving
    }

    pub fn bytes_written(&self) -> u32 {
        self.bytes_written
    }

    pub fn declared_total(&self) -> u32 {
        self.declared_total
    }

    /// The Final step has been processed and the phase is settled.
    pub fn is_settled(&self) -> bool {
        self.finished && matches!(self.phase, UpdatePhase::Failed(_) | UpdatePhase::Succeeded)
    }

    /// Open a session. A second begin while receiving fails the active
    /// session and aborts its flash write.
    pub fn begin(
        &mut self,
        name: &str,
        total: u32,
        flash: &mut dyn FlashWriter,
        system: &mut dyn SystemPort,
        indicator: &mut dyn StatusIndicator,
        console: &Console,
    ) -> Result<(), UpdateError> {
        if self.is_receiving() {
            flash.abort();
            self.phase = UpdatePhase::Failed(UpdateError::Conflict);
            self.finished = false;
            console_line!(console, "Update: conflicting upload {} rejected", name);
            return Err(UpdateError::Conflict);
        }

        console_line!(console, "Update: {}", name);
        system.release_filesystems();
        indicator.reset();

        self.bytes_written = 0;
        self.declared_total = total;
        self.finished = false;

        if let Err(e) = flash.begin(total) {
            warn!("OTA: begin failed: {e}");
            self.phase = UpdatePhase::Failed(UpdateError::BeginFailed);
            return Err(UpdateError::BeginFailed);
        }
        self.phase = UpdatePhase::Receiving;
        info!("OTA: begin ({total} bytes)");
        Ok(())
    }

    /// Write the next piece. Returns the new progress fraction when the
    /// declared total is known; `Ok(None)` when the piece was ignored.
    pub fn write(
        &mut self,
        data: &[u8],
        flash: &mut dyn FlashWriter,
        indicator: &mut dyn StatusIndicator,
    ) -> Result<Option<f32>, UpdateError> {
        if self.phase != UpdatePhase::Receiving {
            return Ok(None);
        }
        if data.is_empty() {
            return Ok(self.progress());
        }

        match flash.write(data) {
            Ok(n) if n == data.len() => {}
            Ok(n) => {
                warn!("OTA: short write ({n} of {} bytes)", data.len());
                return Err(self.fail(UpdateError::WriteFailed, flash));
            }
            Err(e) => {
                warn!("OTA: write failed: {e}");
                return Err(self.fail(UpdateError::WriteFailed, flash));
            }
        }

        self.bytes_written = self.bytes_written.saturating_add(data.len() as u32);
        let progress = self.progress();
        if let Some(p) = progress {
            indicator.show_progress(p);
        }
        Ok(progress)
    }

    /// Process the Final step.
    pub fn finish(&mut self, flash: &mut dyn FlashWriter, console: &Console) -> Result<(), UpdateError> {
        self.finished = true;
        match self.phase {
            UpdatePhase::Failed(e) => {
                console_line!(console, "Update aborted");
                Err(e)
            }
            UpdatePhase::Idle | UpdatePhase::Succeeded => {
                // Final without a begin for this session.
                console_line!(console, "Update aborted");
                self.phase = UpdatePhase::Failed(UpdateError::BeginFailed);
                Err(UpdateError::BeginFailed)
            }
            UpdatePhase::Receiving => {
                console_line!(console, "Update complete: {} bytes", self.bytes_written);
                if let Err(e) = flash.finalize() {
                    warn!("OTA: finalize failed: {e}");
                    console_line!(console, "Update FAILED");
                    self.phase = UpdatePhase::Failed(UpdateError::FinalizeFailed);
                    return Err(UpdateError::FinalizeFailed);
                }
                console_line!(console, "Update Success. Rebooting...");
                self.phase = UpdatePhase::Succeeded;
                Ok(())
            }
        }
    }

    /// Fail the session from outside the normal flow (queue overflow).
    pub fn fail(&mut self, err: UpdateError, flash: &mut dyn FlashWriter) -> UpdateError {
        if self.phase == UpdatePhase::Receiving {
            flash.abort();
        }
        self.phase = UpdatePhase::Failed(err);
        err
    }

    fn progress(&self) -> Option<f32> {
        (self.declared_total > 0)
            .then(|| (self.bytes_written as f32 / self.declared_total as f32).min(1.0))
    }
}

impl Default for UpdateController {
    fn default() -> Self {
        Self::new()
    }
}

// ── ESP-IDF flash writer ──────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::EspOtaWriter;

#[cfg(target_os = "espidf")]
mod esp {
    use log::warn;

    use crate::app::ports::{FlashError, FlashWriter};

    /// [`FlashWriter`] over the inactive OTA partition via `esp-ota`.
    #[derive(Default)]
    pub struct EspOtaWriter {
        update: Option<esp_ota::OtaUpdate>,
    }

    impl EspOtaWriter {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl FlashWriter for EspOtaWriter {
        fn begin(&mut self, _total_size: u32) -> Result<(), FlashError> {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                FlashError
            })?;
            self.update = Some(update);
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, FlashError> {
            let update = self.update.as_mut().ok_or(FlashError)?;
            update.write(data).map_err(|e| {
                warn!("esp-ota write failed: {:?}", e);
                FlashError
            })?;
            Ok(data.len())
        }

        fn finalize(&mut self) -> Result<(), FlashError> {
            let update = self.update.take().ok_or(FlashError)?;
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                FlashError
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                FlashError
            })
        }

        fn abort(&mut self) {
            // esp-ota aborts automatically when OtaUpdate is dropped
            self.update.take();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
