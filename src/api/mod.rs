//! Management API: request model, route table and the streamed surfaces.
//!
//! | Module      | Role                                           |
//! |-------------|------------------------------------------------|
//! | `codec`     | `Request` / `Response` model                   |
//! | `engine`    | static route table and dispatch                |
//! | `auth`      | write authorisation (HMAC token check)         |
//! | `ratelimit` | forced-rescan token bucket                     |
//! | `channels`  | bounded upload queue                           |
//! | `ota`       | firmware update state machine                  |
//! | `stream`    | live-channel push scheduling                   |

pub mod auth;
pub mod channels;
pub mod codec;
pub mod engine;
pub mod ota;
pub mod ratelimit;
pub mod stream;
