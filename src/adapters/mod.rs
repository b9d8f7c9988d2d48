//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements        | Connects to                 |
//! |------------|-------------------|-----------------------------|
//! | `hardware` | SystemPort        | ESP32 heap, SPIFFS, restart |
//! |            | BusProbe (target) | ESP-IDF I2C master          |
//! | `log_sink` | `log::Log`        | Captured console            |
//! | `nvs`      | PreferenceStore   | NVS / in-memory store       |
//! | `time`     | DelayNs           | ESP32 system timer          |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
