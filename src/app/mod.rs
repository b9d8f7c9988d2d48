//! Application core: gateway state and domain logic, no I/O.
//!
//! Route handlers and the loop tick share one [`context::GatewayContext`].
//! Everything the core does not own is reached through the port traits in
//! [`ports`], keeping this layer testable without real peripherals.

pub mod commands;
pub mod context;
pub mod events;
pub mod ports;
pub mod service;
