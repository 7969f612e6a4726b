//! Bitstream synthesis from level transitions
//!
//! Each retained transition closes the interval since the previous one.
//! The interval is cut into nominal bit periods, and every period becomes
//! one bit at the level that held *before* the edge, i.e. the complement
//! of the level the record reports.

use super::types::{Bit, BitTiming, CaptureRecord, DOMINANT, RECESSIVE};

/// Level that held before a transition to `level`
#[inline]
pub fn held_level(level: Bit) -> Bit {
    if level == DOMINANT { RECESSIVE } else { DOMINANT }
}

/// Append the bits of the interval `[last_timestamp, record.timestamp)`.
///
/// Returns the number of bits appended.
pub fn synthesize_interval(
    raw: &mut Vec<Bit>,
    last_timestamp: u32,
    record: &CaptureRecord,
    timing: &BitTiming,
) -> usize {
    let duration = record.timestamp.saturating_sub(last_timestamp);
    let count = timing.bits_in(duration);
    raw.extend(std::iter::repeat_n(held_level(record.level), count));
    count
}

/// Synthesize a whole transition sequence from scratch (first interval
/// measured from 0). Mostly useful for offline analysis and tests.
pub fn synthesize(records: &[CaptureRecord], timing: &BitTiming) -> Vec<Bit> {
    let mut raw = Vec::new();
    let mut last_timestamp = 0;
    for record in records {
        synthesize_interval(&mut raw, last_timestamp, record, timing);
        last_timestamp = record.timestamp;
    }
    raw
}
