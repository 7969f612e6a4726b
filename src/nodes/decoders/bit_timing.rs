//! Real-time placement of synthesized bits
//!
//! The synthesizer assumes a fixed bit period. For display, every bit is
//! given the time window it actually occupied: each interval between two
//! edges is split evenly among the bits counted in it.

use super::types::BitTiming;
use serde::Serialize;
use tracing::trace;

/// Time window of one bit, in ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BitWindow {
    pub start: f64,
    /// `start` plus the full per-bit span, so the windows of one interval
    /// tile it edge to edge: each `end` equals the next window's `start`.
    pub end: f64,
}

impl BitWindow {
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Rebuild bit windows from a session's timestamp history.
///
/// The history is read in disjoint pairs `(t[2i], t[2i + 1])`, which with
/// the level-hold entries are exactly the edge intervals. A trailing
/// unpaired timestamp is ignored, as is any interval too short to hold a
/// bit. The first window always starts at 0.
pub fn reconstruct_bit_windows(timestamps: &[u32], timing: &BitTiming) -> Vec<BitWindow> {
    let mut windows = Vec::new();

    for pair in timestamps.chunks_exact(2) {
        let (t1, t2) = (pair[0], pair[1]);
        let diff = t2.saturating_sub(t1);
        let count = timing.bits_in(diff);
        if count == 0 {
            trace!("no bits between t={} and t={}", t1, t2);
            continue;
        }

        let span = f64::from(diff) / count as f64;
        windows.extend((0..count).map(|k| {
            let start = f64::from(t1) + k as f64 * span;
            BitWindow {
                start,
                end: start + span,
            }
        }));
    }

    if let Some(first) = windows.first_mut() {
        first.start = 0.0;
    }

    windows
}

/// Flatten windows into the `[start, end, start, end, ...]` form a plotter
/// consumes.
pub fn flatten(windows: &[BitWindow]) -> Vec<f64> {
    windows
        .iter()
        .flat_map(|window| [window.start, window.end])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split_of_intervals() {
        let windows = reconstruct_bit_windows(&[0, 40, 40, 100], &BitTiming::default());
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0], BitWindow { start: 0.0, end: 20.0 });
        assert_eq!(windows[1], BitWindow { start: 20.0, end: 40.0 });
        assert_eq!(windows[2], BitWindow { start: 40.0, end: 60.0 });
        assert_eq!(windows[4], BitWindow { start: 80.0, end: 100.0 });
    }

    #[test]
    fn test_uneven_interval_uses_real_span() {
        let windows = reconstruct_bit_windows(&[100, 163], &BitTiming::default());
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, 0.0);
        assert!((windows[1].span() - 21.0).abs() < 1e-9);
        assert!((windows[2].end - 163.0).abs() < 1e-9);
    }

    #[test]
    fn test_windows_tile_each_interval() {
        let windows = reconstruct_bit_windows(&[0, 63, 63, 120], &BitTiming::default());
        assert_eq!(windows.len(), 6);
        for pair in windows.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
        }
        assert!((windows[2].end - 63.0).abs() < 1e-9);
        assert!((windows[5].end - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_window_starts_at_origin() {
        let windows = reconstruct_bit_windows(&[500, 520], &BitTiming::default());
        assert_eq!(windows, vec![BitWindow { start: 0.0, end: 520.0 }]);
    }

    #[test]
    fn test_zero_bit_pair_is_skipped() {
        let windows = reconstruct_bit_windows(&[0, 5, 5, 25], &BitTiming::default());
        assert_eq!(windows, vec![BitWindow { start: 0.0, end: 25.0 }]);
    }

    #[test]
    fn test_unpaired_and_empty_history() {
        assert!(reconstruct_bit_windows(&[], &BitTiming::default()).is_empty());
        assert!(reconstruct_bit_windows(&[40], &BitTiming::default()).is_empty());
    }

    #[test]
    fn test_flatten_pairs() {
        let windows = [
            BitWindow { start: 0.0, end: 20.0 },
            BitWindow { start: 20.0, end: 40.0 },
        ];
        assert_eq!(flatten(&windows), vec![0.0, 20.0, 20.0, 40.0]);
    }
}
