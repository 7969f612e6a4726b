//! CAN frame parser over a destuffed bitstream
//!
//! Frames are parsed back to back from the start of the stream. Header
//! fields must be present in full; a missing header bit aborts the frame
//! and the parse. The tail (CRC, delimiters, EOF, IFS) reads as recessive
//! past the end of the stream, which models the bus going idle.

use super::frame::{FieldName, Frame, FrameOutcome, FrameSubtype, FrameType};
use super::types::{Bit, DOMINANT, RECESSIVE};
use tracing::debug;

/// Header layout of a standard (11-bit identifier) frame
const STANDARD_HEADER: [FieldName; 5] = [
    FieldName::Sof,
    FieldName::Id,
    FieldName::Rtr,
    FieldName::Ide,
    FieldName::R0,
];

/// Header layout of an extended (29-bit identifier) frame
const EXTENDED_HEADER: [FieldName; 8] = [
    FieldName::Sof,
    FieldName::BaseId,
    FieldName::Srr,
    FieldName::Ide,
    FieldName::ExtId,
    FieldName::Rtr,
    FieldName::R0,
    FieldName::R1,
];

/// Offset of the IDE bit from SOF, identical in both layouts
const IDE_OFFSET: usize = 13;

/// Bits that must remain after the data field for the CRC to be attempted
const MIN_CRC_BITS: usize = 5;

/// Cursor over a bitstream with strict and padded reads.
///
/// Padded reads return recessive bits past the end without touching the
/// underlying buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bits: &'a [Bit],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bits: &'a [Bit]) -> Self {
        Self { bits, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Bits left before the end of the real stream
    pub fn remaining(&self) -> usize {
        self.bits.len().saturating_sub(self.pos)
    }

    pub fn peek(&self) -> Option<Bit> {
        self.peek_at(0)
    }

    /// Bit `offset` positions ahead of the cursor, if it exists
    pub fn peek_at(&self, offset: usize) -> Option<Bit> {
        self.bits.get(self.pos + offset).copied()
    }

    /// Bit at an absolute index, recessive past the end
    pub fn bit_or_recessive(&self, index: usize) -> Bit {
        self.bits.get(index).copied().unwrap_or(RECESSIVE)
    }

    pub fn take_bit(&mut self) -> Option<Bit> {
        let bit = self.peek()?;
        self.pos += 1;
        Some(bit)
    }

    /// Take exactly `n` bits, or nothing if fewer remain
    pub fn take(&mut self, n: usize) -> Option<Vec<Bit>> {
        let bits = self.bits.get(self.pos..self.pos + n)?.to_vec();
        self.pos += n;
        Some(bits)
    }

    /// Take `n` bits, filling missing ones with recessive
    pub fn take_padded(&mut self, n: usize) -> Vec<Bit> {
        let bits = (self.pos..self.pos + n)
            .map(|index| self.bit_or_recessive(index))
            .collect();
        self.pos += n;
        bits
    }
}

/// Parse consecutive frames.
///
/// Stops at the first recessive bit where a SOF is expected, at the end of
/// the stream, or after the first frame that did not complete.
pub fn parse_frames(bits: &[Bit]) -> Vec<FrameOutcome> {
    let mut reader = BitReader::new(bits);
    let mut outcomes = Vec::new();

    while reader.peek() == Some(DOMINANT) {
        let outcome = parse_frame(&mut reader);
        let complete = outcome.is_complete();

        match &outcome {
            FrameOutcome::Complete(_) => {}
            FrameOutcome::Partial { frame, reached } => {
                debug!(
                    "Frame at bit {} truncated before {}",
                    frame.start_bit, reached
                );
            }
            FrameOutcome::Error {
                at_bit_index,
                field,
            } => {
                debug!(
                    "Error decoding frame: {} missing at bit {}",
                    field, at_bit_index
                );
            }
        }

        outcomes.push(outcome);
        if !complete {
            break;
        }
    }

    outcomes
}

/// Parse one frame starting at the reader's cursor, which must sit on a SOF.
pub fn parse_frame(reader: &mut BitReader) -> FrameOutcome {
    let start = reader.position();

    let Some(ide) = reader.peek_at(IDE_OFFSET) else {
        return FrameOutcome::Error {
            at_bit_index: start + IDE_OFFSET,
            field: FieldName::Ide,
        };
    };

    let frame_type = if ide == DOMINANT {
        FrameType::Standard
    } else {
        FrameType::Extended
    };
    let mut frame = Frame::new(frame_type, start);

    let rtr = match read_header(reader, &mut frame) {
        Ok(rtr) => rtr,
        Err(field) => {
            return FrameOutcome::Error {
                at_bit_index: reader.len(),
                field,
            };
        }
    };

    let Some(dlc_bits) = reader.take(FieldName::Dlc.width()) else {
        return FrameOutcome::Partial {
            frame,
            reached: FieldName::Dlc,
        };
    };
    frame.push_bits(FieldName::Dlc, dlc_bits);
    let dlc = frame.dlc().unwrap_or(0);

    if rtr == RECESSIVE {
        frame.subtype = Some(FrameSubtype::Remote);
    } else {
        frame.subtype = Some(FrameSubtype::Data);
        for index in 0..dlc {
            let name = FieldName::Data(index);
            match reader.take(name.width()) {
                Some(byte) => frame.push_bits(name, byte),
                None => {
                    return FrameOutcome::Partial {
                        frame,
                        reached: name,
                    };
                }
            }
        }
    }

    if reader.remaining() < MIN_CRC_BITS {
        return FrameOutcome::Partial {
            frame,
            reached: FieldName::Crc,
        };
    }

    let crc = reader.take_padded(FieldName::Crc.width());
    frame.push_bits(FieldName::Crc, crc);

    // CD, ACK and AD are single bits at the head of the 10-bit closing block
    let tail = reader.take_padded(3 + FieldName::Eof.width());
    frame.push_bit(FieldName::CrcDelimiter, tail[0]);
    frame.push_bit(FieldName::Ack, tail[1]);
    frame.push_bit(FieldName::AckDelimiter, tail[2]);
    frame.push_bits(FieldName::Eof, tail[3..].to_vec());

    let ifs = reader.take_padded(FieldName::Ifs.width());
    frame.push_bits(FieldName::Ifs, ifs);

    if reader.position() + FieldName::Idle.width() >= reader.len() {
        let idle = reader.take_padded(FieldName::Idle.width());
        frame.push_bits(FieldName::Idle, idle);
    }

    FrameOutcome::Complete(frame)
}

/// Read the layout-specific header. Returns the RTR bit, or the field that
/// ran past the end of the stream.
fn read_header(reader: &mut BitReader, frame: &mut Frame) -> Result<Bit, FieldName> {
    let layout: &[FieldName] = match frame.frame_type {
        FrameType::Standard => &STANDARD_HEADER,
        FrameType::Extended => &EXTENDED_HEADER,
    };

    let mut rtr = DOMINANT;
    for &name in layout {
        let width = name.width();
        if width == 1 {
            let bit = reader.take_bit().ok_or(name)?;
            if name == FieldName::Rtr {
                rtr = bit;
            }
            frame.push_bit(name, bit);
        } else {
            let bits = reader.take(width).ok_or(name)?;
            frame.push_bits(name, bits);
        }
    }

    Ok(rtr)
}
