//! Decoded CAN frame records
//!
//! A frame is an ordered list of named fields. The order is the order in
//! which the fields appear on the bus, which is what a renderer walks to
//! place them in time.

use super::types::Bit;
use serde::Serialize;
use std::fmt;

/// Identifier layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameType {
    /// 11-bit identifier
    Standard,
    /// 29-bit identifier (base + extension)
    Extended,
}

/// Data or remote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameSubtype {
    Data,
    Remote,
}

/// Closed set of frame fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldName {
    Sof,
    Id,
    BaseId,
    Srr,
    Ide,
    ExtId,
    Rtr,
    R0,
    R1,
    Dlc,
    /// Data byte, numbered from 0
    Data(u8),
    Crc,
    CrcDelimiter,
    Ack,
    AckDelimiter,
    Eof,
    Ifs,
    Idle,
}

impl FieldName {
    /// Width in bits, for fields with a fixed width
    pub fn width(&self) -> usize {
        match self {
            FieldName::Id | FieldName::BaseId => 11,
            FieldName::ExtId => 18,
            FieldName::Dlc | FieldName::Idle => 4,
            FieldName::Data(_) => 8,
            FieldName::Crc => 15,
            FieldName::Eof => 7,
            FieldName::Ifs => 3,
            FieldName::Sof
            | FieldName::Srr
            | FieldName::Ide
            | FieldName::Rtr
            | FieldName::R0
            | FieldName::R1
            | FieldName::CrcDelimiter
            | FieldName::Ack
            | FieldName::AckDelimiter => 1,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldName::Sof => write!(f, "SOF"),
            FieldName::Id => write!(f, "ID"),
            FieldName::BaseId => write!(f, "BASE ID"),
            FieldName::Srr => write!(f, "SRR"),
            FieldName::Ide => write!(f, "IDE"),
            FieldName::ExtId => write!(f, "EXT ID"),
            FieldName::Rtr => write!(f, "RTR"),
            FieldName::R0 => write!(f, "r0"),
            FieldName::R1 => write!(f, "r1"),
            FieldName::Dlc => write!(f, "DLC"),
            FieldName::Data(n) => write!(f, "Data{}", n),
            FieldName::Crc => write!(f, "CRC"),
            FieldName::CrcDelimiter => write!(f, "CD"),
            FieldName::Ack => write!(f, "ACK"),
            FieldName::AckDelimiter => write!(f, "AD"),
            FieldName::Eof => write!(f, "EOF"),
            FieldName::Ifs => write!(f, "IFS"),
            FieldName::Idle => write!(f, "IDLE"),
        }
    }
}

/// Value of a field: a single bit or a bit vector, MSB first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bit(Bit),
    Bits(Vec<Bit>),
}

impl FieldValue {
    pub fn bits(&self) -> &[Bit] {
        match self {
            FieldValue::Bit(bit) => std::slice::from_ref(bit),
            FieldValue::Bits(bits) => bits,
        }
    }

    /// Interpret the bits MSB first. Fields wider than 64 bits keep the low 64.
    pub fn to_u64(&self) -> u64 {
        self.bits()
            .iter()
            .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit & 1))
    }

    /// Hex text for multi-bit fields, the bit itself for single bits
    pub fn to_hex(&self) -> String {
        match self {
            FieldValue::Bit(bit) => bit.to_string(),
            FieldValue::Bits(bits) if bits.is_empty() => "0x00".to_string(),
            FieldValue::Bits(_) => format!("0x{:02X}", self.to_u64()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for bit in self.bits() {
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: FieldName,
    pub value: FieldValue,
}

/// One decoded (possibly truncated) frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub frame_type: FrameType,
    /// Unknown while the frame was cut off before its DLC
    pub subtype: Option<FrameSubtype>,
    /// Index of the SOF bit in the destuffed bitstream
    pub start_bit: usize,
    fields: Vec<Field>,
}

impl Frame {
    pub fn new(frame_type: FrameType, start_bit: usize) -> Self {
        Self {
            frame_type,
            subtype: None,
            start_bit,
            fields: Vec::new(),
        }
    }

    pub(crate) fn push_bit(&mut self, name: FieldName, bit: Bit) {
        self.fields.push(Field {
            name,
            value: FieldValue::Bit(bit),
        });
    }

    pub(crate) fn push_bits(&mut self, name: FieldName, bits: Vec<Bit>) {
        self.fields.push(Field {
            name,
            value: FieldValue::Bits(bits),
        });
    }

    /// Fields in bus order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: FieldName) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Number of destuffed bits covered by the decoded fields
    pub fn bit_len(&self) -> usize {
        self.fields.iter().map(|field| field.value.bits().len()).sum()
    }

    /// The identifier: 11 bits for standard frames, BaseID followed by
    /// ExtID for extended frames.
    pub fn identifier(&self) -> Option<u32> {
        match self.frame_type {
            FrameType::Standard => self.field(FieldName::Id).map(|id| id.to_u64() as u32),
            FrameType::Extended => {
                let base = self.field(FieldName::BaseId)?.to_u64();
                let ext = self.field(FieldName::ExtId)?.to_u64();
                Some(((base << 18) | ext) as u32)
            }
        }
    }

    /// Data length code (0-15)
    pub fn dlc(&self) -> Option<u8> {
        self.field(FieldName::Dlc).map(|dlc| dlc.to_u64() as u8)
    }

    /// Decoded data bytes in order
    pub fn data(&self) -> Vec<u8> {
        self.fields
            .iter()
            .filter(|field| matches!(field.name, FieldName::Data(_)))
            .map(|field| field.value.to_u64() as u8)
            .collect()
    }

    pub fn is_remote(&self) -> bool {
        self.subtype == Some(FrameSubtype::Remote)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.frame_type)?;
        if let Some(subtype) = self.subtype {
            write!(f, " {:?}", subtype)?;
        }
        if let Some(id) = self.identifier() {
            write!(f, " ID=0x{:X}", id)?;
        }
        if let Some(dlc) = self.dlc() {
            write!(f, " DLC={}", dlc)?;
        }
        let data = self.data();
        if !data.is_empty() {
            write!(f, " [")?;
            for (i, byte) in data.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:02X}", byte)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Result of parsing one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FrameOutcome {
    /// Every field through IFS was decoded (missing tail bits read as recessive)
    Complete(Frame),
    /// The bitstream ended before `reached`; `frame` holds the fields before it
    Partial { frame: Frame, reached: FieldName },
    /// A header field could not be read; the frame was discarded
    Error { at_bit_index: usize, field: FieldName },
}

impl FrameOutcome {
    /// The frame, if one was kept
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            FrameOutcome::Complete(frame) | FrameOutcome::Partial { frame, .. } => Some(frame),
            FrameOutcome::Error { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FrameOutcome::Complete(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(text: &str) -> Vec<Bit> {
        text.bytes().map(|b| b - b'0').collect()
    }

    #[test]
    fn test_field_value_conversions() {
        let value = FieldValue::Bits(bits("00100100011"));
        assert_eq!(value.to_u64(), 0x123);
        assert_eq!(value.to_hex(), "0x123");
        assert_eq!(value.to_string(), "00100100011");

        assert_eq!(FieldValue::Bit(1).to_hex(), "1");
        assert_eq!(FieldValue::Bits(Vec::new()).to_hex(), "0x00");
        assert_eq!(FieldValue::Bits(bits("0101")).to_hex(), "0x05");
    }

    #[test]
    fn test_extended_identifier_joins_base_and_extension() {
        let mut frame = Frame::new(FrameType::Extended, 0);
        frame.push_bits(FieldName::BaseId, bits("10000000001"));
        frame.push_bits(FieldName::ExtId, bits("000000000000000011"));
        assert_eq!(frame.identifier(), Some((0x401 << 18) | 0x3));
    }

    #[test]
    fn test_frame_accessors() {
        let mut frame = Frame::new(FrameType::Standard, 4);
        frame.push_bit(FieldName::Sof, 0);
        frame.push_bits(FieldName::Id, bits("11001010000"));
        frame.push_bits(FieldName::Dlc, bits("0010"));
        frame.push_bits(FieldName::Data(0), bits("10100101"));
        frame.push_bits(FieldName::Data(1), bits("00001111"));
        frame.subtype = Some(FrameSubtype::Data);

        assert_eq!(frame.identifier(), Some(0x650));
        assert_eq!(frame.dlc(), Some(2));
        assert_eq!(frame.data(), vec![0xA5, 0x0F]);
        assert_eq!(frame.bit_len(), 1 + 11 + 4 + 16);
        assert!(!frame.is_remote());
        assert_eq!(frame.to_string(), "Standard Data ID=0x650 DLC=2 [A5 0F]");
    }

    #[test]
    fn test_field_names_display_like_the_bus_labels() {
        assert_eq!(FieldName::BaseId.to_string(), "BASE ID");
        assert_eq!(FieldName::Data(3).to_string(), "Data3");
        assert_eq!(FieldName::CrcDelimiter.to_string(), "CD");
        assert_eq!(FieldName::Crc.width(), 15);
    }
}
