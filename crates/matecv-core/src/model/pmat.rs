// crates/matecv-core/src/model/pmat.rs

use crate::codec::{Codec, Reader, Record};
use crate::error::Result;

pub const PMAT_MAGIC: &[u8] = b"\x0fCM3D2_PMATERIAL";

/// Property-map file (`.pmat`).
///
/// Layout:
/// MAGIC
/// version:i32
/// hash:i32           (str_hash(material_name), recomputed on build)
/// material_name:str
/// render_queue:f32
/// [optional] shader:str
#[derive(Clone, Debug, PartialEq)]
pub struct Pmat {
    pub version: i32,
    pub material_name: String,
    pub render_queue: f32,
    /// `None` means the field is absent from the file; `Some("")` is an
    /// encoded empty string.
    pub shader: Option<String>,
}

impl Record for Pmat {
    const MAGIC: &'static [u8] = PMAT_MAGIC;

    fn decode_body(r: &mut Reader<'_>) -> Result<Self> {
        let version = r.take_i32()?;
        let _hash = r.take_i32()?;
        let material_name = String::decode(r)?;
        let render_queue = r.take_f32()?;

        // The shader is absent only when the file ends right here; a partial
        // string is truncation.
        let shader = if r.is_eof() { None } else { Some(String::decode(r)?) };

        Ok(Self { version, material_name, render_queue, shader })
    }

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        self.version.encode(out)?;
        self.hash().encode(out)?;
        self.material_name.encode(out)?;
        self.render_queue.encode(out)?;
        if let Some(shader) = &self.shader {
            shader.encode(out)?;
        }
        Ok(())
    }
}

impl Pmat {
    pub const DEFAULT_VERSION: i32 = 1000;

    pub fn create(material_name: &str, render_queue: f32, shader: Option<&str>) -> Self {
        Self {
            version: Self::DEFAULT_VERSION,
            material_name: material_name.to_string(),
            render_queue,
            shader: shader.map(str::to_string),
        }
    }

    /// Hash written into the header for the current material name.
    pub fn hash(&self) -> i32 {
        str_hash(&self.material_name)
    }
}

/// `h = 31*h + code_point` over Unicode scalar values with 32-bit wraparound,
/// reinterpreted as signed.
pub fn str_hash(s: &str) -> i32 {
    let mut h: u32 = 0;
    for c in s.chars() {
        h = h.wrapping_mul(31).wrapping_add(c as u32);
    }
    // ((h + 2^31) & 0xFFFF_FFFF) - 2^31
    (i64::from(h.wrapping_add(0x8000_0000)) - 0x8000_0000) as i32
}
