// crates/matecv-core/src/codec/varint.rs
//
// 7-bit encoded string length: low groups first, high bit set on every byte
// but the last. Lengths are non-negative i32 values, so at most 5 bytes.

use crate::error::{FormatError, Result};

pub const MAX_LEN_BYTES: usize = 5;

pub fn write_len(len: usize, out: &mut Vec<u8>) {
    let mut v = len as u64;
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

/// Read a length prefix starting at `*pos`, advancing past it.
pub fn read_len(bytes: &[u8], pos: &mut usize) -> Result<usize> {
    let start = *pos;
    let mut len: u64 = 0;

    for k in 0..MAX_LEN_BYTES {
        let Some(&b) = bytes.get(start + k) else {
            return Err(FormatError::UnexpectedEof { offset: start + k, need: 1 });
        };
        len |= u64::from(b & 0x7F) << (7 * k);
        if b & 0x80 == 0 {
            if len > i32::MAX as u64 {
                return Err(FormatError::Varint("string length exceeds i32::MAX"));
            }
            *pos = start + k + 1;
            return Ok(len as usize);
        }
    }
    Err(FormatError::Varint("string length prefix longer than 5 bytes"))
}
