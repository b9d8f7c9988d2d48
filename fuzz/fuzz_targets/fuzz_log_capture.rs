//! Fuzz target: `LogRingBuffer::append`
//!
//! Feeds arbitrary console output, split at a fuzz-chosen point, into a
//! small ring.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - `line_count() == min(total_count(), capacity)`
//! - Stored lines are non-empty and never contain `\n` or `\r`
//! - Retained sequence ids are contiguous and end at `total_count()`
//!
//! cargo fuzz run fuzz_log_capture

#![no_main]

use astrogate::log_capture::LogRingBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&cut, rest)) = data.split_first() else {
        return;
    };
    let at = usize::from(cut).min(rest.len());

    let mut ring = LogRingBuffer::<Vec<u8>, 16>::new(Vec::new());
    ring.append(&rest[..at]);
    ring.append(&rest[at..]);

    let total = ring.total_count();
    assert_eq!(ring.line_count(), (total as usize).min(16));

    let mut prev = None;
    for line in ring.iter() {
        let text = line.text();
        assert!(!text.is_empty());
        assert!(!text.contains('\n') && !text.contains('\r'));
        if let Some(p) = prev {
            assert_eq!(line.seq(), p + 1);
        }
        prev = Some(line.seq());
    }
    assert_eq!(prev.unwrap_or(0), total);
});
