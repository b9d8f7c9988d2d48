//! Gateway service, the hexagonal core.
//!
//! [`GatewayService`] owns the [`GatewayContext`] and is driven from two
//! sides: network callbacks (requests, live-channel frames, upload chunks)
//! and the periodic loop [`tick`](GatewayService::tick). Callbacks only
//! validate, enqueue and answer; probes, flash writes, reboots and pushes
//! happen in the tick. The health cache is refreshed only when a reader
//! asked for it, a forced rescan is pending or a health broadcast is due.
//!
//! ```text
//!  HTTP / WS ──▶ ┌────────────────────────────┐ ──▶ Broadcaster
//!                │       GatewayService       │
//!  upload  ────▶ │ ROUTES · UploadQueue · Hub │ ──▶ FlashWriter
//!                └────────────────────────────┘
//!                      ▲ tick(ports)
//! ```

use log::{debug, info, warn};

use crate::api::channels::{UploadEvent, UploadQueue};
use crate::api::codec::{Request, Response};
use crate::api::engine;
use crate::api::ota::UpdatePhase;
use crate::config::GatewayConfig;
use crate::console_line;
use crate::error::{GatewayError, Status, UpdateError};
use crate::log_capture::Console;

use super::commands::CommandOrigin;
use super::context::{GatewayContext, UploadIntake};
use super::events::Envelope;
use super::ports::{Ports, PreferenceStore};

/// One piece of a multipart firmware upload, as the web server delivers it.
#[derive(Debug, Clone, Copy)]
pub struct UploadChunk<'a> {
    pub filename: &'a str,
    /// Byte offset of `data` in the upload; `0` marks the first chunk.
    pub index: usize,
    pub data: &'a [u8],
    pub is_final: bool,
    /// Declared upload size, `0` when unknown.
    pub total: u32,
}

// ───────────────────────────────────────────────────────────────
// GatewayService
// ───────────────────────────────────────────────────────────────

pub struct GatewayService {
    ctx: GatewayContext,
    tick_count: u64,
    /// Uptime of the last drained upload event.
    upload_seen_ms: u64,
}

impl GatewayService {
    /// Build the service; reads the stored API token from `store`.
    pub fn new(config: GatewayConfig, console: Console, store: &dyn PreferenceStore) -> Self {
        Self::from_context(GatewayContext::new(config, console, store))
    }

    pub fn from_context(ctx: GatewayContext) -> Self {
        debug!("gateway auth: {}", if ctx.auth.is_open() { "open" } else { "token" });
        info!(
            "gateway ready: {} route(s), {} preference key(s)",
            engine::ROUTES.len(),
            ctx.config.preferences.len()
        );
        Self {
            ctx,
            tick_count: 0,
            upload_seen_ms: 0,
        }
    }

    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GatewayContext {
        &mut self.ctx
    }

    pub fn console(&self) -> &Console {
        &self.ctx.console
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Network side ──────────────────────────────────────────

    /// Answer one HTTP request.
    pub fn handle(&mut self, request: &Request, ports: &mut Ports<'_>) -> Response {
        engine::dispatch(&mut self.ctx, ports, request)
    }

    /// Handle one inbound live-channel text frame as a command.
    pub fn handle_frame(
        &mut self,
        text: &str,
        token: Option<&str>,
        ports: &mut Ports<'_>,
    ) -> Result<(), GatewayError> {
        let ctx = &mut self.ctx;
        ctx.auth.check_token(token, &ctx.console)?;
        ctx.commands.submit(
            text,
            CommandOrigin::Socket,
            &*ports.power,
            &mut *ports.engine,
            &ctx.console,
        )
    }

    /// Accept one upload chunk. Never blocks: the bytes are queued for
    /// the next tick.
    ///
    /// Every chunk carries its own credentials. An unauthorised chunk is
    /// answered at once and leaves the intake and the queue untouched, so
    /// it cannot disturb another client's upload.
    pub fn upload_chunk(&mut self, request: &Request, chunk: UploadChunk<'_>) -> Option<Response> {
        let ctx = &mut self.ctx;

        if let Err(e) = ctx.auth.check_write_auth(request, &ctx.console) {
            if chunk.index == 0 {
                console_line!(ctx.console, "Update: {} rejected (unauthorized)", chunk.filename);
            }
            return Some(e.into());
        }

        if chunk.index == 0 {
            ctx.intake = UploadIntake::default();
            push_or_flag(&ctx.uploads, &mut ctx.intake, UploadEvent::begin(chunk.filename, chunk.total));
        }

        if chunk.is_final {
            ctx.intake.final_seen = true;
        }
        if ctx.intake.overflowed {
            return None;
        }

        if UploadQueue::pieces_for(chunk.data.len()) > ctx.uploads.free_slots()
            || ctx.uploads.push_data(chunk.data).is_err()
        {
            warn!("upload queue full, dropping session");
            ctx.intake.overflowed = true;
            return None;
        }
        if chunk.is_final {
            push_or_flag(&ctx.uploads, &mut ctx.intake, UploadEvent::Final);
        }
        None
    }

    /// The uploading client disconnected. A session still receiving is
    /// failed on the next tick; nobody is left to answer. Disconnects of
    /// unauthorised clients are ignored.
    pub fn upload_aborted(&mut self, request: &Request) {
        let ctx = &mut self.ctx;
        if ctx.intake.answered || ctx.auth.check_write_auth(request, &ctx.console).is_err() {
            return;
        }
        push_or_flag(&ctx.uploads, &mut ctx.intake, UploadEvent::Abort);
        ctx.intake.answered = true;
    }

    /// The response for a finished upload, once the tick has settled it.
    /// `None` while chunks are still queued or being written. Produced at
    /// most once per upload.
    pub fn upload_completion(&mut self, ports: &mut Ports<'_>) -> Option<Response> {
        let ctx = &mut self.ctx;
        if ctx.intake.answered {
            return None;
        }
        if !ctx.uploads.is_empty() || !ctx.update.is_settled() {
            return None;
        }

        ctx.intake.answered = true;
        match ctx.update.phase() {
            UpdatePhase::Succeeded => {
                ctx.reboot
                    .schedule(ports.system.uptime_ms(), ctx.config.update_reboot_delay_ms);
                Some(Response::text(Status::Ok, "Update OK - Rebooting..."))
            }
            phase => {
                debug!("upload settled in {phase:?}");
                ports.indicator.show_failure();
                Some(Response::text(Status::Failure, "Update FAILED"))
            }
        }
    }

    // ── Loop side ─────────────────────────────────────────────

    /// One pass of the periodic loop.
    pub fn tick(&mut self, ports: &mut Ports<'_>) {
        self.tick_count = self.tick_count.wrapping_add(1);
        let now = ports.system.uptime_ms();

        self.drain_uploads(now, ports);

        if self.ctx.reboot.poll(now) {
            console_line!(self.ctx.console, "Rebooting...");
            ports.system.reboot();
        }

        ports.transport.cleanup();
        let subscribers = ports.transport.subscriber_count();
        let due = self.ctx.hub.poll(now, subscribers);

        let force = core::mem::take(&mut self.ctx.rescan_requested) || due.health;
        let requested = core::mem::take(&mut self.ctx.refresh_requested);
        if force || requested {
            self.ctx
                .health
                .refresh(&mut *ports.bus, &mut *ports.delay, now, force);
        }

        if due.state {
            let snapshot = self.ctx.state_snapshot(ports);
            self.ctx
                .hub
                .publish(&mut *ports.transport, &Envelope::State { data: &snapshot });
        }
        if due.health {
            let report = self.ctx.health_report(ports);
            self.ctx
                .hub
                .publish(&mut *ports.transport, &Envelope::Health { data: &report });
        }
        for line in self.ctx.hub.drain_logs(&self.ctx.console, subscribers) {
            self.ctx
                .hub
                .publish(&mut *ports.transport, &Envelope::Log { line: &line });
        }
    }

    fn drain_uploads(&mut self, now: u64, ports: &mut Ports<'_>) {
        let ctx = &mut self.ctx;
        while let Some(event) = ctx.uploads.pop() {
            self.upload_seen_ms = now;
            match event {
                UploadEvent::Begin { name, total } => {
                    let _ = ctx.update.begin(
                        &name,
                        total,
                        &mut *ports.flash,
                        &mut *ports.system,
                        &mut *ports.indicator,
                        &ctx.console,
                    );
                }
                UploadEvent::Data(piece) => {
                    if let Ok(Some(p)) = ctx.update.write(&piece, &mut *ports.flash, &mut *ports.indicator) {
                        ctx.hub.on_progress(&mut *ports.transport, p);
                    }
                }
                UploadEvent::Final => {
                    let _ = ctx.update.finish(&mut *ports.flash, &ctx.console);
                }
                UploadEvent::Abort => {
                    if ctx.update.is_receiving() {
                        ctx.update.fail(UpdateError::Abandoned, &mut *ports.flash);
                        console_line!(ctx.console, "Update aborted: client disconnected");
                        ports.indicator.show_failure();
                    }
                }
            }
        }

        let idle = now.saturating_sub(self.upload_seen_ms);
        if ctx.update.is_receiving() && !ctx.intake.final_seen && idle >= ctx.config.upload_idle_ms {
            warn!("upload idle for {idle} ms, dropping session");
            ctx.update.fail(UpdateError::Abandoned, &mut *ports.flash);
            console_line!(ctx.console, "Update aborted: upload stalled");
            ports.indicator.show_failure();
        }

        if ctx.intake.overflowed {
            if !matches!(ctx.update.phase(), UpdatePhase::Failed(_)) {
                ctx.update.fail(UpdateError::QueueOverflow, &mut *ports.flash);
            }
            if ctx.intake.final_seen && !ctx.update.is_settled() {
                let _ = ctx.update.finish(&mut *ports.flash, &ctx.console);
            }
        }
    }
}

/// Queue one event; on overflow flag the upload.
fn push_or_flag(queue: &UploadQueue, intake: &mut UploadIntake, event: UploadEvent) {
    if queue.push(event).is_err() {
        warn!("upload queue full, dropping session");
        intake.overflowed = true;
    }
}
