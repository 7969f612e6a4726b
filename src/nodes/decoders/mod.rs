//! CAN bus decoding
//!
//! Pipeline, per poll cycle:
//!
//! 1. [`extractor`] finds 8-byte transition records in the capture bytes
//! 2. [`synthesizer`] turns edge intervals into raw bits
//! 3. [`destuffer`] removes stuff bits
//! 4. [`frame_parser`] splits the destuffed stream into frames
//! 5. [`bit_timing`] places every raw bit at its real time window
//!
//! [`session`] ties the stages together and [`can_decoder`] runs them as a
//! node on a fixed poll interval.

pub mod bit_timing;
pub mod can_decoder;
pub mod destuffer;
pub mod extractor;
pub mod frame;
pub mod frame_parser;
pub mod session;
pub mod synthesizer;
pub mod types;

// Re-export common types
pub use bit_timing::BitWindow;
pub use destuffer::Destuffed;
pub use frame::{Field, FieldName, FieldValue, Frame, FrameOutcome, FrameSubtype, FrameType};
pub use session::{DecodeSession, DecodeSnapshot, IngestReport, SessionState};
pub use types::{Bit, BitTiming, CaptureRecord, DecoderConfig};

// Re-export decoders
pub use can_decoder::{CanDecoder, DecoderCommand};
