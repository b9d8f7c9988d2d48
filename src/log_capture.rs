//! Serial log capture.
//!
//! Every byte written to the console is forwarded to the real serial sink
//! and accumulated into a fixed ring of lines that the web API and the live
//! channel can read back. Lines carry a monotonic sequence number so a
//! reader can resume from where it left off and detect lines that were
//! overwritten by wraparound.
//!
//! ```text
//!  write(bytes) ──▶ serial sink (always)
//!        │
//!        └──▶ line accumulator ──\n / full──▶ ring[LINES]  (seq 1, 2, 3 …)
//! ```

use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Lines retained by the default console (~6 KB of text).
pub const LOG_CAPTURE_MAX_LINES: usize = 50;

/// Maximum bytes in one captured line. Longer output is split.
pub const LOG_CAPTURE_LINE_LEN: usize = 120;

/// One captured line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogLine {
    seq: u32,
    text: heapless::Vec<u8, LOG_CAPTURE_LINE_LEN>,
}

impl LogLine {
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The line text. Multi-byte sequences cut at a split boundary are
    /// rendered with the replacement character.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

/// Fixed-capacity ring of captured lines with a tee to the primary sink.
///
/// Single writer: all appends must come from one context at a time. The
/// [`Console`] handle provides that serialisation when shared.
pub struct LogRingBuffer<W, const LINES: usize = LOG_CAPTURE_MAX_LINES> {
    sink: W,
    ring: [LogLine; LINES],
    /// Next slot to overwrite.
    write_idx: usize,
    /// Lines ever stored; also the sequence id of the newest line.
    total: u32,
    pending: heapless::Vec<u8, LOG_CAPTURE_LINE_LEN>,
}

impl<W: Write, const LINES: usize> LogRingBuffer<W, LINES> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            ring: core::array::from_fn(|_| LogLine::default()),
            write_idx: 0,
            total: 0,
            pending: heapless::Vec::new(),
        }
    }

    /// Tee `bytes` to the sink and capture them line by line.
    pub fn append(&mut self, bytes: &[u8]) {
        // Serial output is best-effort; a stalled UART must not lose the
        // captured copy.
        let _ = self.sink.write_all(bytes);

        for &b in bytes {
            match b {
                b'\n' => self.finish_line(),
                b'\r' => {}
                _ => {
                    // `pending` is flushed as soon as it fills, so this
                    // push always has room.
                    let _ = self.pending.push(b);
                    if self.pending.is_full() {
                        self.finish_line();
                    }
                }
            }
        }
    }

    /// Number of lines currently retrievable: `min(total, LINES)`.
    pub fn line_count(&self) -> usize {
        (self.total as usize).min(LINES)
    }

    /// Total lines ever stored.
    pub fn total_count(&self) -> u32 {
        self.total
    }

    pub const fn capacity(&self) -> usize {
        LINES
    }

    /// The `index`-th oldest retained line (0 = oldest).
    pub fn get_by_index(&self, index: usize) -> Option<&LogLine> {
        let count = self.line_count();
        if index >= count {
            return None;
        }
        let slot = (self.write_idx + LINES - count + index) % LINES;
        Some(&self.ring[slot])
    }

    /// The line with sequence id `seq`, if it has not been overwritten.
    pub fn get_by_sequence(&self, seq: u32) -> Option<&LogLine> {
        if seq == 0 || seq > self.total || (self.total - seq) as usize >= LINES {
            return None;
        }
        Some(&self.ring[(seq as usize - 1) % LINES])
    }

    /// Iterate retained lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        (0..self.line_count()).filter_map(|i| self.get_by_index(i))
    }

    fn finish_line(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.total = self.total.wrapping_add(1);
        let slot = &mut self.ring[self.write_idx];
        slot.seq = self.total;
        slot.text.clear();
        // Same capacity on both sides.
        let _ = slot.text.extend_from_slice(&self.pending);
        self.pending.clear();
        self.write_idx = (self.write_idx + 1) % LINES;
    }
}

// ───────────────────────────────────────────────────────────────
// Shared console handle
// ───────────────────────────────────────────────────────────────

type SharedRing = LogRingBuffer<Box<dyn Write + Send>>;

/// Cloneable handle to the captured serial console.
///
/// Gateway components write operator-visible records here; the
/// [`CaptureLogger`](crate::adapters::log_sink::CaptureLogger) routes `log`
/// records into the same stream.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<SharedRing>>,
}

impl Console {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogRingBuffer::new(Box::new(sink)))),
        }
    }

    /// Console whose serial side is discarded (tests, headless hosts).
    pub fn detached() -> Self {
        Self::new(std::io::sink())
    }

    /// Write raw bytes.
    pub fn write_bytes(&self, bytes: &[u8]) {
        self.with_mut(|ring| ring.append(bytes));
    }

    /// Write one formatted line followed by a newline.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        let mut text = args.to_string();
        text.push('\n');
        self.write_bytes(text.as_bytes());
    }

    /// Run `f` with read access to the ring.
    pub fn with<T>(&self, f: impl FnOnce(&SharedRing) -> T) -> T {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn with_mut<T>(&self, f: impl FnOnce(&mut SharedRing) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn total_count(&self) -> u32 {
        self.with(LogRingBuffer::total_count)
    }

    /// Copy of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.with(|ring| ring.iter().map(|l| l.text().into_owned()).collect())
    }

    /// Text of line `seq`, if still retained.
    pub fn line_by_sequence(&self, seq: u32) -> Option<String> {
        self.with(|ring| ring.get_by_sequence(seq).map(|l| l.text().into_owned()))
    }

    /// Number of retained lines containing `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        self.with(|ring| ring.iter().filter(|l| l.text().contains(needle)).count())
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("total", &self.total_count())
            .finish_non_exhaustive()
    }
}

/// Shorthand for [`Console::line`]: `console_line!(console, "fmt", args)`.
#[macro_export]
macro_rules! console_line {
    ($console:expr, $($arg:tt)*) => {
        $console.line(format_args!($($arg)*))
    };
}
