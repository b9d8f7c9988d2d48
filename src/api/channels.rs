//! Upload queue between network callbacks and the loop tick.
//!
//! Upload callbacks run on the network stack's context and must not block
//! on flash. They copy each chunk into a bounded `embassy-sync` channel;
//! the loop tick drains it and performs the writes, one bounded piece
//! per write.
//!
//! ```text
//! ┌──────────────┐  UploadEvent  ┌──────────────┐  FlashWriter  ┌───────────┐
//! │ HTTP upload  │──────────────▶│  Loop tick   │──────────────▶│ OTA slot  │
//! │ callback     │   (bounded)   │  (sync)      │               │           │
//! └──────────────┘               └──────────────┘               └───────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

/// Bytes carried by one queued data piece.
pub const UPLOAD_PIECE_LEN: usize = 1024;

/// Queue depth (pieces).
pub const UPLOAD_QUEUE_DEPTH: usize = 16;

/// Longest upload filename kept for the log.
pub const UPLOAD_NAME_LEN: usize = 64;

/// One step of a chunked firmware upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// First chunk arrived: open a session for `total` bytes.
    Begin {
        name: String<UPLOAD_NAME_LEN>,
        total: u32,
    },
    Data(Vec<u8, UPLOAD_PIECE_LEN>),
    /// Last chunk arrived.
    Final,
    /// The client went away before the last chunk.
    Abort,
}

impl UploadEvent {
    pub fn begin(name: &str, total: u32) -> Self {
        let mut n = String::new();
        for c in name.chars() {
            if n.push(c).is_err() {
                break;
            }
        }
        Self::Begin { name: n, total }
    }
}

/// The queue was full; the event was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

/// Bounded upload queue.
pub struct UploadQueue {
    channel: Channel<CriticalSectionRawMutex, UploadEvent, UPLOAD_QUEUE_DEPTH>,
}

impl UploadQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    pub fn push(&self, event: UploadEvent) -> Result<(), QueueFull> {
        self.channel.try_send(event).map_err(|_| QueueFull)
    }

    /// Split `data` into pieces and queue them in order. Stops at the
    /// first piece that does not fit.
    pub fn push_data(&self, data: &[u8]) -> Result<(), QueueFull> {
        for piece in data.chunks(UPLOAD_PIECE_LEN) {
            // `chunks` never yields more than UPLOAD_PIECE_LEN bytes.
            let buf = Vec::from_slice(piece).map_err(|_| QueueFull)?;
            self.push(UploadEvent::Data(buf))?;
        }
        Ok(())
    }

    /// Free slots needed to queue `data`.
    pub fn pieces_for(len: usize) -> usize {
        len.div_ceil(UPLOAD_PIECE_LEN)
    }

    pub fn free_slots(&self) -> usize {
        UPLOAD_QUEUE_DEPTH - self.channel.len()
    }

    pub fn pop(&self) -> Option<UploadEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new()
    }
}
