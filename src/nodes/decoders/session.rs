//! Decode session: accumulated capture state and the whole-session decode
//!
//! Ingesting a chunk is the only state transition. Decoding is a pure
//! function of the state and is re-run over the whole session on every
//! cycle; the horizon keeps a session small.

use super::bit_timing::{BitWindow, reconstruct_bit_windows};
use super::destuffer::destuff;
use super::extractor::{Admission, EventExtractor, admit, record_transition};
use super::frame::{Frame, FrameOutcome};
use super::frame_parser::parse_frames;
use super::synthesizer::synthesize_interval;
use super::types::{Bit, BitTiming, CaptureRecord, DecoderConfig};
use serde::Serialize;
use std::ops::ControlFlow;
use tracing::debug;

/// Everything retained since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Line levels with level-hold entries, for waveform display
    pub level_history: Vec<Bit>,
    /// Timestamps matching `level_history`
    pub timestamp_history: Vec<u32>,
    /// Synthesized bits, stuff bits included
    pub raw_bitstream: Vec<Bit>,
    pub last_timestamp: u32,
}

/// What happened while ingesting one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub retained: usize,
    pub noise: usize,
    pub resets: usize,
    pub horizon_reached: bool,
    pub bits_added: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.level_history.is_empty()
    }

    pub fn reset(&mut self) {
        self.level_history.clear();
        self.timestamp_history.clear();
        self.raw_bitstream.clear();
        self.last_timestamp = 0;
    }

    /// Add one retained transition: waveform history plus synthesized bits.
    /// Returns the number of bits added.
    pub fn apply(&mut self, record: &CaptureRecord, timing: &BitTiming) -> usize {
        record_transition(&mut self.level_history, &mut self.timestamp_history, record);
        let bits = synthesize_interval(&mut self.raw_bitstream, self.last_timestamp, record, timing);
        self.last_timestamp = record.timestamp;
        bits
    }

    /// Feed a chunk of capture bytes through the extractor.
    pub fn ingest(
        &mut self,
        extractor: &mut EventExtractor,
        chunk: &[u8],
        config: &DecoderConfig,
    ) -> IngestReport {
        let mut report = IngestReport::default();

        extractor.extract(chunk, |record| {
            let last_level = self.level_history.last().copied();
            let last_timestamp = self.timestamp_history.last().copied();

            match admit(last_level, last_timestamp, &record, config.horizon) {
                Admission::Noise => {
                    report.noise += 1;
                    ControlFlow::Continue(())
                }
                Admission::BeyondHorizon => {
                    debug!(
                        "Timestamp {} beyond horizon {}, stopping extraction",
                        record.timestamp, config.horizon
                    );
                    report.horizon_reached = true;
                    ControlFlow::Break(())
                }
                Admission::Retain { reset } => {
                    if reset {
                        debug!(
                            "Timestamp went back from {} to {}, resetting session",
                            last_timestamp.unwrap_or_default(),
                            record.timestamp
                        );
                        self.reset();
                        report.resets += 1;
                    }
                    report.bits_added += self.apply(&record, &config.timing);
                    report.retained += 1;
                    ControlFlow::Continue(())
                }
            }
        });

        report
    }
}

/// Every output of one decode cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeSnapshot {
    pub cycle: u64,
    pub report: IngestReport,
    pub levels: Vec<Bit>,
    pub timestamps: Vec<u32>,
    pub raw_bits: Vec<Bit>,
    pub destuffed: Vec<Bit>,
    pub stuff_positions: Vec<usize>,
    pub outcomes: Vec<FrameOutcome>,
    pub bit_windows: Vec<BitWindow>,
}

impl DecodeSnapshot {
    /// Frames kept by the parser, complete or truncated
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.outcomes.iter().filter_map(FrameOutcome::frame)
    }
}

/// Decode the whole session from scratch
pub fn decode(state: &SessionState, timing: &BitTiming) -> DecodeSnapshot {
    let destuffed = destuff(&state.raw_bitstream);
    let outcomes = parse_frames(&destuffed.bits);
    let bit_windows = reconstruct_bit_windows(&state.timestamp_history, timing);

    DecodeSnapshot {
        cycle: 0,
        report: IngestReport::default(),
        levels: state.level_history.clone(),
        timestamps: state.timestamp_history.clone(),
        raw_bits: state.raw_bitstream.clone(),
        destuffed: destuffed.bits,
        stuff_positions: destuffed.stuff_positions,
        outcomes,
        bit_windows,
    }
}

/// Session state plus the extractor and raw byte log that go with it
///
/// Once a record past the horizon has been seen the session is frozen:
/// later chunks are still scanned, so a timestamp regression can restart
/// it, but a chunk that retains nothing is left out of the raw log.
#[derive(Debug)]
pub struct DecodeSession {
    config: DecoderConfig,
    extractor: EventExtractor,
    state: SessionState,
    raw_log: Vec<Vec<u8>>,
    frozen: bool,
    cycles: u64,
}

impl DecodeSession {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            extractor: EventExtractor::new(),
            state: SessionState::new(),
            raw_log: Vec::new(),
            frozen: false,
            cycles: 0,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Chunks received since the session started, up to the cycle that
    /// reached the horizon
    pub fn raw_log(&self) -> &[Vec<u8>] {
        &self.raw_log
    }

    /// Whether the horizon has been reached in this session
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Ingest `chunk` (possibly empty) and decode the session
    pub fn decode_cycle(&mut self, chunk: &[u8]) -> DecodeSnapshot {
        self.cycles += 1;

        let report = self.state.ingest(&mut self.extractor, chunk, &self.config);
        if report.resets > 0 {
            self.raw_log.clear();
            self.frozen = false;
        }
        if !chunk.is_empty() && (!self.frozen || report.retained > 0) {
            self.raw_log.push(chunk.to_vec());
        }
        self.frozen |= report.horizon_reached;

        let mut snapshot = decode(&self.state, &self.config.timing);
        snapshot.cycle = self.cycles;
        snapshot.report = report;
        snapshot
    }

    /// Discard everything and start a new session
    pub fn reset(&mut self) {
        self.state.reset();
        self.extractor.clear();
        self.raw_log.clear();
        self.frozen = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::decoders::frame::{FieldName, FieldValue, FrameType};
    use crate::nodes::decoders::test_support::{bits, capture_from_bits, record_bytes, stuff};

    fn records(pairs: &[(Bit, u32)]) -> Vec<u8> {
        pairs
            .iter()
            .flat_map(|&(level, timestamp)| record_bytes(level, timestamp))
            .collect()
    }

    #[test]
    fn test_noise_is_dropped() {
        let mut session = DecodeSession::new(DecoderConfig::default());
        let snapshot = session.decode_cycle(&records(&[(0, 0), (0, 40), (1, 60)]));

        assert_eq!(snapshot.report.noise, 1);
        assert_eq!(snapshot.levels, vec![0, 0, 1]);
        assert_eq!(snapshot.timestamps, vec![0, 60, 60]);
        assert_eq!(snapshot.raw_bits, vec![0, 0, 0]);
    }

    #[test]
    fn test_regression_resets_session() {
        let mut session = DecodeSession::new(DecoderConfig::default());
        session.decode_cycle(&records(&[(0, 0), (1, 100), (0, 200)]));
        assert_eq!(session.state().raw_bitstream.len(), 10);
        assert_eq!(session.raw_log().len(), 1);

        let snapshot = session.decode_cycle(&records(&[(1, 50)]));
        assert_eq!(snapshot.report.resets, 1);
        assert_eq!(snapshot.levels, vec![1]);
        assert_eq!(snapshot.timestamps, vec![50]);
        assert_eq!(snapshot.raw_bits, vec![0, 0, 0]);
        assert_eq!(session.state().last_timestamp, 50);
        assert_eq!(session.raw_log().len(), 1);
    }

    #[test]
    fn test_records_beyond_horizon_are_not_synthesized() {
        let mut session = DecodeSession::new(DecoderConfig::default());
        let snapshot =
            session.decode_cycle(&records(&[(0, 0), (1, 3000), (0, 3151), (1, 3300)]));

        assert!(snapshot.report.horizon_reached);
        assert_eq!(snapshot.report.retained, 2);
        assert_eq!(snapshot.timestamps, vec![0, 3000, 3000]);
        assert_eq!(snapshot.raw_bits.len(), 150);
    }

    #[test]
    fn test_raw_log_stops_growing_once_frozen() {
        let mut session = DecodeSession::new(DecoderConfig::default());
        session.decode_cycle(&records(&[(0, 0), (1, 3000), (0, 3200)]));
        assert!(session.is_frozen());
        assert_eq!(session.raw_log().len(), 1);

        for t in [3400, 3600, 3800] {
            let snapshot = session.decode_cycle(&records(&[(0, t)]));
            assert!(snapshot.report.horizon_reached);
            assert_eq!(snapshot.report.retained, 0);
        }
        assert_eq!(session.raw_log().len(), 1);

        // device restarted its clock: a new session and a new log
        let snapshot = session.decode_cycle(&records(&[(0, 20)]));
        assert_eq!(snapshot.report.resets, 1);
        assert!(!session.is_frozen());
        assert_eq!(session.raw_log().len(), 1);
        assert_eq!(session.raw_log()[0], records(&[(0, 20)]));
    }

    #[test]
    fn test_split_record_completes_next_cycle() {
        let mut session = DecodeSession::new(DecoderConfig::default());
        let bytes = records(&[(0, 0), (1, 40)]);

        let first = session.decode_cycle(&bytes[..11]);
        assert_eq!(first.levels, vec![0]);

        let second = session.decode_cycle(&bytes[11..]);
        assert_eq!(second.levels, vec![0, 0, 1]);
        assert_eq!(second.raw_bits, vec![0, 0]);
        assert_eq!(second.cycle, 2);
    }

    #[test]
    fn test_frame_decoded_from_capture_bytes() {
        let frame = bits(
            "0 00100100011 0 0 0 0001 10100101 \
             000111000000000 1 0 1 1111111 111",
        );
        let capture = capture_from_bits(&stuff(&frame));

        let mut session = DecodeSession::new(DecoderConfig::default());
        let snapshot = session.decode_cycle(&capture);

        assert_eq!(snapshot.destuffed, frame);
        assert!(!snapshot.stuff_positions.is_empty());
        assert_eq!(snapshot.outcomes.len(), 1);
        assert!(snapshot.outcomes[0].is_complete());

        let decoded = snapshot.frames().next().unwrap();
        assert_eq!(decoded.frame_type, FrameType::Standard);
        assert_eq!(decoded.identifier(), Some(0x123));
        assert_eq!(decoded.data(), vec![0xA5]);
        assert_eq!(
            decoded.field(FieldName::Crc),
            Some(&FieldValue::Bits(bits("000111000000000")))
        );
        assert_eq!(snapshot.bit_windows.len(), snapshot.raw_bits.len());
    }

    #[test]
    fn test_decode_is_repeatable() {
        let mut state = SessionState::new();
        let timing = BitTiming::default();
        state.apply(&CaptureRecord::new(0, 0), &timing);
        state.apply(&CaptureRecord::new(1, 100), &timing);

        assert_eq!(decode(&state, &timing), decode(&state, &timing));
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut session = DecodeSession::new(DecoderConfig::default());
        let bytes = records(&[(0, 0), (1, 40)]);
        session.decode_cycle(&bytes[..12]);
        session.reset();

        assert!(session.state().is_empty());
        assert!(session.raw_log().is_empty());

        let snapshot = session.decode_cycle(&[]);
        assert!(snapshot.levels.is_empty());
        assert!(snapshot.outcomes.is_empty());
    }
}
