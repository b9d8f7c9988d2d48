//! Route table and request dispatch.
//!
//! Each route is a plain `fn` pointer in a static table; the network layer
//! hands every decoded [`Request`] to [`dispatch`]. Write routes pass the
//! [`AuthGuard`](super::auth::AuthGuard) before their handler runs, so a
//! rejected request never reaches state.
//!
//! Firmware upload and the live channel are streamed and enter through
//! `GatewayService::upload_chunk` and `GatewayService::handle_frame`.

use serde::Serialize;
use serde_json::json;

use super::codec::{Method, Request, Response};
use crate::app::commands::CommandOrigin;
use crate::app::context::GatewayContext;
use crate::app::ports::Ports;
use crate::console_line;
use crate::error::{GatewayError, ValidationError};

/// Who may call a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

pub type Handler = fn(&mut GatewayContext, &mut Ports<'_>, &Request) -> Result<Response, GatewayError>;

pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub access: Access,
    pub handler: Handler,
}

pub static ROUTES: &[Route] = &[
    Route { method: Method::Post, path: "/api/cmd", access: Access::Write, handler: post_cmd },
    Route { method: Method::Get, path: "/api/state", access: Access::Read, handler: get_state },
    Route { method: Method::Get, path: "/api/health", access: Access::Read, handler: get_health },
    Route { method: Method::Get, path: "/api/logs", access: Access::Read, handler: get_logs },
    Route { method: Method::Get, path: "/api/pref", access: Access::Read, handler: get_pref },
    Route { method: Method::Post, path: "/api/pref", access: Access::Write, handler: post_pref },
    Route { method: Method::Post, path: "/api/reboot", access: Access::Write, handler: post_reboot },
    Route { method: Method::Post, path: "/api/sleep", access: Access::Write, handler: post_sleep },
    Route { method: Method::Post, path: "/api/wake", access: Access::Write, handler: post_wake },
];

/// Find the route for `request`, authorise it and run its handler.
pub fn dispatch(ctx: &mut GatewayContext, ports: &mut Ports<'_>, request: &Request) -> Response {
    let Some(route) = ROUTES
        .iter()
        .find(|r| r.method == request.method && r.path == request.path)
    else {
        log::debug!("no route for {:?} {}", request.method, request.path);
        return Response::not_found();
    };

    if route.access == Access::Write {
        if let Err(e) = ctx.auth.check_write_auth(request, &ctx.console) {
            return e.into();
        }
    }

    (route.handler)(ctx, ports, request).unwrap_or_else(Response::from)
}

fn required<'r>(request: &'r Request, name: &'static str) -> Result<&'r str, ValidationError> {
    request.param_value(name).ok_or(ValidationError::MissingParam(name))
}

// ── Commands ──────────────────────────────────────────────────

fn post_cmd(ctx: &mut GatewayContext, ports: &mut Ports<'_>, req: &Request) -> Result<Response, GatewayError> {
    let cmd = required(req, "cmd")?;
    ctx.commands
        .submit(cmd, CommandOrigin::Api, &*ports.power, &mut *ports.engine, &ctx.console)?;
    Ok(Response::ok())
}

// ── Status ────────────────────────────────────────────────────

fn get_state(ctx: &mut GatewayContext, ports: &mut Ports<'_>, _req: &Request) -> Result<Response, GatewayError> {
    Ok(Response::json(&ctx.state_snapshot(ports)))
}

fn get_health(ctx: &mut GatewayContext, ports: &mut Ports<'_>, req: &Request) -> Result<Response, GatewayError> {
    // The probe itself runs on the next tick; readers only see the cache.
    if req.flag("scan") && ctx.scan_limiter.try_acquire() {
        ctx.rescan_requested = true;
    } else {
        ctx.request_health(ports.system.uptime_ms());
    }
    Ok(Response::json(&ctx.health_report(ports)))
}

#[derive(Serialize)]
struct LogsBody {
    total: u32,
    lines: Vec<String>,
}

fn get_logs(ctx: &mut GatewayContext, _ports: &mut Ports<'_>, req: &Request) -> Result<Response, GatewayError> {
    let since = req
        .param_value("since")
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let body = ctx.console.with(|ring| LogsBody {
        total: ring.total_count(),
        lines: ring
            .iter()
            .filter(|l| l.seq() > since)
            .map(|l| l.text().into_owned())
            .collect(),
    });
    Ok(Response::json(&body))
}

// ── Preferences ───────────────────────────────────────────────

fn get_pref(ctx: &mut GatewayContext, ports: &mut Ports<'_>, req: &Request) -> Result<Response, GatewayError> {
    let keys = required(req, "keys")?;
    let readout = ctx.prefs().read(&*ports.store, keys)?;
    Ok(Response::json(&readout))
}

fn post_pref(ctx: &mut GatewayContext, ports: &mut Ports<'_>, req: &Request) -> Result<Response, GatewayError> {
    let (Some(key), Some(val)) = (req.param_value("key"), req.param_value("val")) else {
        return Err(ValidationError::MissingParam("key/val").into());
    };
    ctx.prefs().write(&mut *ports.store, key, val)?;
    if req.flag("reboot") {
        ctx.reboot
            .schedule(ports.system.uptime_ms(), ctx.config.reboot_delay_ms);
    }
    Ok(Response::ok())
}

// ── Lifecycle ─────────────────────────────────────────────────

fn post_reboot(ctx: &mut GatewayContext, ports: &mut Ports<'_>, _req: &Request) -> Result<Response, GatewayError> {
    console_line!(ctx.console, "[API] Reboot requested");
    ctx.reboot
        .schedule(ports.system.uptime_ms(), ctx.config.reboot_delay_ms);
    Ok(Response::json(&json!({ "ok": true, "msg": "rebooting" })))
}

fn post_sleep(ctx: &mut GatewayContext, ports: &mut Ports<'_>, _req: &Request) -> Result<Response, GatewayError> {
    ports.power.enter_sleep();
    console_line!(ctx.console, "[API] Sleep: commands suppressed");
    Ok(Response::ok())
}

fn post_wake(ctx: &mut GatewayContext, ports: &mut Ports<'_>, _req: &Request) -> Result<Response, GatewayError> {
    ports.power.wake();
    console_line!(ctx.console, "[API] Wake: commands enabled");
    Ok(Response::ok())
}
