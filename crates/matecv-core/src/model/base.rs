use crate::codec::{Codec, Reader};
use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Codec for Vec2 {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self { x: r.take_f32()?, y: r.take_f32()? })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.x.encode(out)?;
        self.y.encode(out)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl From<[f32; 4]> for Vec4 {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl Codec for Vec4 {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            x: r.take_f32()?,
            y: r.take_f32()?,
            z: r.take_f32()?,
            w: r.take_f32()?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        for v in [self.x, self.y, self.z, self.w] {
            v.encode(out)?;
        }
        Ok(())
    }
}
