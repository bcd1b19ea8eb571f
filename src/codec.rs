//! Serialized register layout for persistence and cross-process merging.
//!
//! Byte layout (all multi-byte integers little-endian):
//!
//! ```text
//! +-------+---------+---+-------+------+---------------------------+
//! | magic | version | p | width | mode | payload                   |
//! | "HL"  |   u8    | u8|  u8   |  u8  |                           |
//! +-------+---------+---+-------+------+---------------------------+
//! ```
//!
//! - dense payload: `m` raw register bytes, one per register;
//! - sparse payload: `u32` entry count, `u32` stream length, then the
//!   delta + varint encoded `(index, rank)` stream.
//!
//! Decoding validates every field and the full payload and reports
//! [`HllError::MalformedEncoding`] on any inconsistency; it never panics on
//! arbitrary input.

use crate::config::{Config, HashWidth};
use crate::dense::DenseRegisters;
use crate::error::HllError;
use crate::sketch::Registers;
use crate::sparse::SparseRegisters;

const MAGIC: [u8; 2] = *b"HL";
const VERSION: u8 = 1;
const MODE_SPARSE: u8 = 0;
const MODE_DENSE: u8 = 1;
const HEADER_LEN: usize = 5;

/// Append a LEB128 varint.
#[inline]
pub(crate) fn write_varint(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Read a LEB128 varint at `*pos`, advancing it. Returns `None` on a
/// truncated or overlong encoding.
#[inline]
pub(crate) fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let mut value: u32 = 0;
    for shift in 0..5 {
        let &byte = bytes.get(*pos)?;
        *pos += 1;
        let bits = u32::from(byte & 0x7f);
        // The 5th byte may only carry the top 4 bits of a u32.
        if shift == 4 && byte > 0x0f {
            return None;
        }
        value |= bits << (shift * 7);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

/// Serialize a register store with its self-describing header.
pub(crate) fn encode(config: Config, registers: &Registers) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(config.precision());
    buf.push(config.width().bits());

    match registers {
        Registers::Sparse(sparse) => {
            buf.push(MODE_SPARSE);
            let (stream, entries) = sparse.encoded_snapshot();
            buf.extend_from_slice(&(entries as u32).to_le_bytes());
            buf.extend_from_slice(&(stream.len() as u32).to_le_bytes());
            buf.extend_from_slice(&stream);
        }
        Registers::Dense(dense) => {
            buf.push(MODE_DENSE);
            buf.extend_from_slice(dense.registers());
        }
    }

    buf
}

/// Deserialize a register store, validating header and payload.
pub(crate) fn decode(bytes: &[u8]) -> Result<(Config, Registers), HllError> {
    if bytes.len() < HEADER_LEN + 1 {
        return Err(HllError::MalformedEncoding("truncated header"));
    }
    if bytes[0..2] != MAGIC {
        return Err(HllError::MalformedEncoding("bad magic"));
    }
    if bytes[2] != VERSION {
        return Err(HllError::MalformedEncoding("unsupported version"));
    }
    let precision = bytes[3];
    let width = match bytes[4] {
        32 => HashWidth::W32,
        64 => HashWidth::W64,
        _ => return Err(HllError::MalformedEncoding("bad hash width")),
    };
    let config = Config::new(precision, width)
        .map_err(|_| HllError::MalformedEncoding("precision out of range"))?;

    let mode = bytes[HEADER_LEN];
    let payload = &bytes[HEADER_LEN + 1..];
    let registers = match mode {
        MODE_SPARSE => Registers::Sparse(decode_sparse(config, payload)?),
        MODE_DENSE => Registers::Dense(decode_dense(config, payload)?),
        _ => return Err(HllError::MalformedEncoding("bad mode tag")),
    };

    Ok((config, registers))
}

fn decode_dense(config: Config, payload: &[u8]) -> Result<DenseRegisters, HllError> {
    if payload.len() != config.registers() {
        return Err(HllError::MalformedEncoding("dense payload length mismatch"));
    }
    if payload.iter().any(|&rank| rank > config.max_rank()) {
        return Err(HllError::MalformedEncoding("register rank out of range"));
    }
    Ok(DenseRegisters::from_registers(config, payload.to_vec()))
}

fn decode_sparse(config: Config, payload: &[u8]) -> Result<SparseRegisters, HllError> {
    if payload.len() < 8 {
        return Err(HllError::MalformedEncoding("truncated sparse payload"));
    }
    let entries = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let stream_len = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;
    let stream = &payload[8..];
    if stream.len() != stream_len {
        return Err(HllError::MalformedEncoding("sparse stream length mismatch"));
    }
    if entries > config.registers() {
        return Err(HllError::MalformedEncoding("sparse entry count exceeds m"));
    }

    let mut pairs = Vec::with_capacity(entries);
    let mut pos = 0;
    let mut prev_index: Option<u32> = None;
    for _ in 0..entries {
        let delta = read_varint(stream, &mut pos)
            .ok_or(HllError::MalformedEncoding("bad index delta varint"))?;
        let rank = read_varint(stream, &mut pos)
            .ok_or(HllError::MalformedEncoding("bad rank varint"))?;

        let index = match prev_index {
            // Later deltas are gaps between distinct indices, so zero would
            // mean a duplicate.
            Some(_) if delta == 0 => {
                return Err(HllError::MalformedEncoding("duplicate sparse index"))
            }
            Some(prev) => prev
                .checked_add(delta)
                .ok_or(HllError::MalformedEncoding("sparse index overflow"))?,
            None => delta,
        };
        if index as usize >= config.registers() {
            return Err(HllError::MalformedEncoding("sparse index out of range"));
        }
        if rank == 0 || rank > u32::from(config.max_rank()) {
            return Err(HllError::MalformedEncoding("sparse rank out of range"));
        }
        prev_index = Some(index);
        pairs.push((index, rank as u8));
    }
    if pos != stream.len() {
        return Err(HllError::MalformedEncoding("trailing sparse bytes"));
    }

    Ok(SparseRegisters::from_sorted_entries(config, &pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(127)]
    #[test_case(128)]
    #[test_case(16_383)]
    #[test_case(16_384)]
    #[test_case(u32::MAX)]
    fn test_varint_round_trip(value: u32) {
        let mut buf = Vec::new();
        write_varint(&mut buf, value);
        let mut pos = 0;
        assert_eq!(read_varint(&buf, &mut pos), Some(value));
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_varint_rejects_truncation() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        let mut pos = 0;
        assert_eq!(read_varint(&buf[..1], &mut pos), None);
    }

    #[test]
    fn test_varint_rejects_overlong() {
        // Five continuation bytes never terminate a u32.
        let buf = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let mut pos = 0;
        assert_eq!(read_varint(&buf, &mut pos), None);

        // 5th byte carrying more than the top 4 bits overflows.
        let buf = [0xff, 0xff, 0xff, 0xff, 0x1f];
        let mut pos = 0;
        assert_eq!(read_varint(&buf, &mut pos), None);
    }
}
