// crates/matecv-core/src/codec/reader.rs

use crate::codec::varint;
use crate::error::{FormatError, Result};

/// Cursor over a borrowed byte slice. Every read is bounds-checked and
/// reports the offset it failed at.
pub struct Reader<'a> {
    b: &'a [u8],
    i: usize,
}

impl<'a> Reader<'a> {
    pub fn new(b: &'a [u8]) -> Self {
        Self { b, i: 0 }
    }

    pub fn offset(&self) -> usize {
        self.i
    }

    pub fn is_eof(&self) -> bool {
        self.i == self.b.len()
    }

    pub fn take_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .i
            .checked_add(n)
            .filter(|&end| end <= self.b.len())
            .ok_or(FormatError::UnexpectedEof { offset: self.i, need: n })?;
        let s = &self.b[self.i..end];
        self.i = end;
        Ok(s)
    }

    pub fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take_exact(1)?[0])
    }

    pub fn take_i32(&mut self) -> Result<i32> {
        let s = self.take_exact(4)?;
        Ok(i32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub fn take_f32(&mut self) -> Result<f32> {
        let s = self.take_exact(4)?;
        Ok(f32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    /// String length prefix; see `varint::read_len`.
    pub fn take_len(&mut self) -> Result<usize> {
        varint::read_len(self.b, &mut self.i)
    }

    /// Consume `magic` or fail. A short buffer whose bytes still agree with
    /// the magic prefix is reported as truncation rather than a mismatch.
    pub fn expect_magic(&mut self, magic: &'static [u8]) -> Result<()> {
        let have = &self.b[self.i..];
        let n = have.len().min(magic.len());
        if have[..n] != magic[..n] {
            return Err(FormatError::BadMagic { expected: magic });
        }
        self.take_exact(magic.len())?;
        Ok(())
    }
}
