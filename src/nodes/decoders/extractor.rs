//! Event extraction from the raw capture byte stream
//!
//! The capture device emits 8-byte records at arbitrary offsets:
//!
//! ```text
//! byte 0..3  marker (0x11, level, 0x01)
//! byte 3     unused
//! byte 4..8  timestamp, u32 little-endian, 0.1 µs ticks
//! ```
//!
//! The scanner walks the buffer one byte at a time looking for a marker,
//! so it resynchronizes after garbage or a dropped byte. A record cut off
//! by the end of a chunk is kept and completed by the next chunk.

use super::types::{Bit, CaptureRecord, RECORD_LEN, RECORD_MARKERS};
use std::ops::ControlFlow;
use tracing::trace;

/// What to do with a record given the retained session history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Same level as the last retained record: not a transition
    Noise,
    /// Past the capture horizon: stop extracting for this cycle
    BeyondHorizon,
    /// Keep the record; `reset` means the timestamp went backwards and the
    /// session must be cleared first
    Retain { reset: bool },
}

/// Decide whether a record is kept.
///
/// The noise check runs before the regression check. A regressing record
/// is always below the horizon, since every retained timestamp is.
pub fn admit(
    last_level: Option<Bit>,
    last_timestamp: Option<u32>,
    record: &CaptureRecord,
    horizon: u32,
) -> Admission {
    if last_level == Some(record.level) {
        return Admission::Noise;
    }

    let reset = last_timestamp.is_some_and(|last| record.timestamp < last);

    if record.timestamp > horizon {
        return Admission::BeyondHorizon;
    }

    Admission::Retain { reset }
}

/// Append a retained transition to the waveform history.
///
/// Every transition after the first is preceded by a copy of the previous
/// level at the new timestamp, so the history draws as explicit steps.
pub fn record_transition(
    levels: &mut Vec<Bit>,
    timestamps: &mut Vec<u32>,
    record: &CaptureRecord,
) {
    if let Some(&previous) = levels.last() {
        levels.push(previous);
        timestamps.push(record.timestamp);
    }
    levels.push(record.level);
    timestamps.push(record.timestamp);
}

fn starts_with_marker(bytes: &[u8]) -> bool {
    RECORD_MARKERS.iter().any(|marker| bytes.starts_with(marker))
}

/// Whether `tail` (shorter than a record) could be the beginning of one
fn could_start_record(tail: &[u8]) -> bool {
    !tail.is_empty()
        && RECORD_MARKERS
            .iter()
            .any(|marker| tail.iter().zip(marker).all(|(byte, expected)| byte == expected))
}

/// Iterator over the records in a byte buffer
pub struct RecordScanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordScanner<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes not consumed yet. After the iterator is exhausted this is
    /// either empty or an incomplete record at the end of the buffer.
    pub fn remainder(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = CaptureRecord;

    fn next(&mut self) -> Option<CaptureRecord> {
        while self.pos < self.bytes.len() {
            let rest = &self.bytes[self.pos..];

            if rest.len() < RECORD_LEN {
                if could_start_record(rest) {
                    return None;
                }
                self.pos += 1;
                continue;
            }

            if starts_with_marker(rest) {
                let record = CaptureRecord {
                    level: rest[1],
                    timestamp: u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]),
                };
                self.pos += RECORD_LEN;
                return Some(record);
            }

            self.pos += 1;
        }
        None
    }
}

/// Stateful extractor that stitches records split across chunks
#[derive(Debug, Default)]
pub struct EventExtractor {
    pending: Vec<u8>,
}

impl EventExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back from the previous chunk
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Forget any held-back bytes
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Scan `chunk` (after any held-back bytes) and hand each record to
    /// `on_record`. Returning `ControlFlow::Break` stops the scan; the rest
    /// of the buffer is discarded for this cycle.
    ///
    /// Returns the number of records handed out.
    pub fn extract<F>(&mut self, chunk: &[u8], mut on_record: F) -> usize
    where
        F: FnMut(CaptureRecord) -> ControlFlow<()>,
    {
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(chunk);

        let mut scanner = RecordScanner::new(&buffer);
        let mut count = 0;

        for record in scanner.by_ref() {
            count += 1;
            trace!("record: level={} t={}", record.level, record.timestamp);
            if on_record(record).is_break() {
                return count;
            }
        }

        self.pending = scanner.remainder().to_vec();
        count
    }
}
