//! CAN bus frame reconstruction from logic-analyzer captures
//!
//! A capture device reports every level change on the bus as an 8-byte
//! record (level plus a 0.1 µs timestamp). This library turns that byte
//! stream back into CAN frames: it extracts the transitions, synthesizes the
//! bitstream at the nominal bit period, removes stuff bits and parses
//! standard and extended frames, keeping enough timing information to draw
//! every field at its real position.
//!
//! # Architecture
//!
//! - **CaptureSource**: reads raw capture bytes and forwards them as chunks
//! - **CanDecoder**: drains the chunks on a fixed poll interval and decodes
//!   the whole session
//! - **Scheduler**: thread-per-node execution over crossbeam channels
//!
//! The decoding stages are plain functions and can be used without the
//! runtime:
//!
//! ```
//! use canlogic::{DecodeSession, DecoderConfig};
//!
//! let mut session = DecodeSession::new(DecoderConfig::default());
//! let snapshot = session.decode_cycle(&[0x11, 0x00, 0x01, 0x00, 0, 0, 0, 0]);
//! assert_eq!(snapshot.levels, vec![0]);
//! assert!(snapshot.outcomes.is_empty());
//! ```

use thiserror::Error;

pub mod nodes;
pub mod runtime;

// Re-export decoder data types
pub use nodes::decoders::{
    Bit, BitTiming, BitWindow, CaptureRecord, DecodeSession, DecodeSnapshot, DecoderCommand,
    DecoderConfig, Destuffed, Field, FieldName, FieldValue, Frame, FrameOutcome, FrameSubtype,
    FrameType, IngestReport, SessionState,
};

// Re-export streaming nodes
pub use nodes::{CanDecoder, CaptureSource};

// Re-export streaming runtime components
pub use runtime::{ProcessNode, Scheduler, WorkError, WorkResult};

#[derive(Error, Debug)]
pub enum CanLogicError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CanLogicError>;
