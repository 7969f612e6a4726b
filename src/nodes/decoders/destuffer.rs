//! Bit destuffing
//!
//! After five identical bits the transmitter inserts one extra bit. The
//! destuffer tracks the current run length and drops the bit that follows
//! any run of five, whatever its value, recording its index in the raw
//! bitstream.
//!
//! The rule is applied across the whole stream, including the CRC
//! delimiter, ACK, EOF and IFS regions that the bus itself never stuffs.

use super::types::Bit;
use serde::Serialize;

/// Run length after which the next bit is a stuff bit
pub const STUFF_RUN: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Destuffed {
    /// Bitstream with stuff bits removed
    pub bits: Vec<Bit>,
    /// Indices (in the raw bitstream) of the removed bits
    pub stuff_positions: Vec<usize>,
}

pub fn destuff(raw: &[Bit]) -> Destuffed {
    let Some((&first, rest)) = raw.split_first() else {
        return Destuffed::default();
    };

    let mut bits = Vec::with_capacity(raw.len());
    let mut stuff_positions = Vec::new();
    bits.push(first);

    let mut last = first;
    let mut run = 1;

    for (offset, &bit) in rest.iter().enumerate() {
        let index = offset + 1;
        if run == STUFF_RUN {
            stuff_positions.push(index);
            run = 1;
        } else if bit == last {
            run += 1;
            bits.push(bit);
        } else {
            run = 1;
            bits.push(bit);
        }
        last = bit;
    }

    Destuffed {
        bits,
        stuff_positions,
    }
}
