// crates/matecv-core/src/codec/mod.rs

pub mod comstr;
pub mod reader;
pub mod varint;

use crate::error::{FormatError, Result};

pub use reader::Reader;

/// A field that knows its own wire layout. Records are described by
/// decoding/encoding their fields in order through this trait.
pub trait Codec: Sized {
    fn decode(r: &mut Reader<'_>) -> Result<Self>;
    fn encode(&self, out: &mut Vec<u8>) -> Result<()>;
}

impl Codec for String {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        comstr::read(r)
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        comstr::encode_into(self, out);
        Ok(())
    }
}

impl Codec for i32 {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        r.take_i32()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Codec for f32 {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        r.take_f32()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

/// A top-level file schema: a fixed magic followed by a body.
///
/// `parse` ignores bytes past the end of the body; `build` always emits the
/// canonical encoding of the current field values, so derived header fields
/// (lengths, hashes) are recomputed rather than carried over.
pub trait Record: Sized {
    const MAGIC: &'static [u8];

    fn decode_body(r: &mut Reader<'_>) -> Result<Self>;
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()>;

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.expect_magic(Self::MAGIC)?;
        Self::decode_body(&mut r)
    }

    fn build(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(Self::MAGIC);
        self.encode_body(&mut out)?;
        Ok(out)
    }
}

/// Decode elements until one satisfies `is_terminal`. The terminal element is
/// kept as the last item of the result.
pub fn repeat_until<T, F>(r: &mut Reader<'_>, is_terminal: F) -> Result<Vec<T>>
where
    T: Codec,
    F: Fn(&T) -> bool,
{
    let mut items = Vec::new();
    loop {
        let item = T::decode(r)?;
        let done = is_terminal(&item);
        items.push(item);
        if done {
            return Ok(items);
        }
    }
}

/// Encode a sentinel-terminated sequence. The sentinel must be present
/// exactly once, in last position.
pub fn encode_terminated<T, F>(
    items: &[T],
    is_terminal: F,
    what: &'static str,
    out: &mut Vec<u8>,
) -> Result<()>
where
    T: Codec,
    F: Fn(&T) -> bool,
{
    let terminals = items.iter().filter(|it| is_terminal(*it)).count();
    match items.last() {
        Some(last) if terminals == 1 && is_terminal(last) => {}
        _ => return Err(FormatError::MissingSentinel(what)),
    }
    for it in items {
        it.encode(out)?;
    }
    Ok(())
}

/// Index the sentinel sits at, scanning from the tail. Appends one if the
/// sequence has none.
pub fn sentinel_index<T, F>(items: &mut Vec<T>, is_terminal: F, make: impl FnOnce() -> T) -> usize
where
    F: Fn(&T) -> bool,
{
    let found = items.iter().rposition(is_terminal);
    match found {
        Some(idx) => idx,
        None => {
            items.push(make());
            items.len() - 1
        }
    }
}
