// crates/matecv-core/src/codec/comstr.rs
//
// Length-prefixed string: 7-bit encoded byte count, then that many UTF-8 bytes.
// No terminator.

use crate::codec::reader::Reader;
use crate::codec::varint;
use crate::error::{FormatError, Result};

pub fn encode_into(s: &str, out: &mut Vec<u8>) {
    varint::write_len(s.len(), out);
    out.extend_from_slice(s.as_bytes());
}

pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 2);
    encode_into(s, &mut out);
    out
}

pub fn read(r: &mut Reader<'_>) -> Result<String> {
    let len = r.take_len()?;
    let offset = r.offset();
    let raw = r.take_exact(len)?;
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|_| FormatError::InvalidUtf8 { offset })
}

/// Decode a single encoded string occupying the whole of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut r = Reader::new(bytes);
    read(&mut r)
}
