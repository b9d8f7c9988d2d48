//! AstroPixels dome gateway library.
//!
//! The management and telemetry plane of the dome controller: captured
//! console, health diagnostics, write authorisation, allow-listed
//! preferences, actuator command forwarding, chunked firmware update and
//! the live channel. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod log_capture;
pub mod pins;
pub mod prefs;
pub mod safety;
pub mod scheduler;
pub mod telemetry;

// Concrete port implementations; target-specific parts are cfg-gated inside.
pub mod adapters;
