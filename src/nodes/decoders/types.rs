//! Common decoder types, timing constants and configuration

use serde::Serialize;
use std::time::Duration;

/// Logic level of a single bit: 0 = dominant, 1 = recessive
pub type Bit = u8;

pub const DOMINANT: Bit = 0;
pub const RECESSIVE: Bit = 1;

/// Nominal bit period in ticks (1 tick = 0.1 µs)
pub const BIT_PERIOD_TICKS: u32 = 20;
/// Intervals at or below this many ticks do not produce another bit
pub const EDGE_GUARD_TICKS: u32 = 8;
/// Timestamps beyond this end the extraction for the current cycle
pub const SESSION_HORIZON_TICKS: u32 = 3150;

/// Length of one capture record on the wire
pub const RECORD_LEN: usize = 8;

/// The two 3-byte prefixes a record may start with. Byte 1 doubles as the
/// level indicator.
pub const RECORD_MARKERS: [[u8; 3]; 2] = [[0x11, 0x00, 0x01], [0x11, 0x01, 0x01]];

/// One level transition reported by the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureRecord {
    /// New line level after the transition
    pub level: Bit,
    /// Time of the transition in ticks
    pub timestamp: u32,
}

impl CaptureRecord {
    pub fn new(level: Bit, timestamp: u32) -> Self {
        Self { level, timestamp }
    }
}

/// Bit timing used to turn edge intervals into bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTiming {
    /// Nominal bit period in ticks
    pub bit_period: u32,
    /// Remaining interval (ticks) that still counts as one more bit when exceeded
    pub edge_guard: u32,
}

impl BitTiming {
    pub fn new(bit_period: u32, edge_guard: u32) -> Self {
        Self {
            bit_period,
            edge_guard,
        }
    }

    /// Number of bit periods in an interval of `duration` ticks.
    ///
    /// Repeated subtraction: every time the remaining duration exceeds the
    /// guard, one bit is counted and one period removed.
    pub fn bits_in(&self, duration: u32) -> usize {
        if self.bit_period == 0 {
            return 0;
        }
        let mut remaining = i64::from(duration);
        let mut bits = 0;
        while remaining > i64::from(self.edge_guard) {
            bits += 1;
            remaining -= i64::from(self.bit_period);
        }
        bits
    }
}

impl Default for BitTiming {
    fn default() -> Self {
        Self::new(BIT_PERIOD_TICKS, EDGE_GUARD_TICKS)
    }
}

/// Decoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub timing: BitTiming,
    /// Records with a timestamp above this are not extracted
    pub horizon: u32,
    /// How often the decode poll drains the byte queue
    pub poll_interval: Duration,
}

impl DecoderConfig {
    pub fn new() -> Self {
        Self {
            timing: BitTiming::default(),
            horizon: SESSION_HORIZON_TICKS,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_timing(mut self, timing: BitTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.timing.bit_period == 0 {
            return Err(crate::CanLogicError::InvalidConfig(
                "bit period must be at least one tick".to_string(),
            ));
        }
        if self.timing.edge_guard >= self.timing.bit_period {
            return Err(crate::CanLogicError::InvalidConfig(format!(
                "edge guard ({}) must be shorter than the bit period ({})",
                self.timing.edge_guard, self.timing.bit_period
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(crate::CanLogicError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_in_interval() {
        let timing = BitTiming::default();
        assert_eq!(timing.bits_in(0), 0);
        assert_eq!(timing.bits_in(8), 0);
        assert_eq!(timing.bits_in(9), 1);
        assert_eq!(timing.bits_in(20), 1);
        assert_eq!(timing.bits_in(28), 1);
        assert_eq!(timing.bits_in(29), 2);
        assert_eq!(timing.bits_in(100), 5);
        // slightly fast or slow bit clocks still land on the nominal count
        assert_eq!(timing.bits_in(97), 5);
        assert_eq!(timing.bits_in(104), 5);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = DecoderConfig::default();
        assert_eq!(config.horizon, 3150);
        assert_eq!(config.timing.bit_period, 20);
        assert_eq!(config.timing.edge_guard, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_timing_rejected() {
        let config = DecoderConfig::new().with_timing(BitTiming::new(10, 12));
        assert!(config.validate().is_err());

        let config = DecoderConfig::new().with_timing(BitTiming::new(0, 0));
        assert!(config.validate().is_err());

        let config = DecoderConfig::new().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
