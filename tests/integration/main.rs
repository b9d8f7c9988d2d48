//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the mock device. All tests run on the host with no real
//! hardware required.

mod auth_tests;
mod config_tests;
mod gateway_tests;
mod update_flow_tests;
