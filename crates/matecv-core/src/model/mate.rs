// crates/matecv-core/src/model/mate.rs

use crate::codec::{self, Codec, Reader, Record};
use crate::error::{FormatError, Result};
use crate::model::base::{Vec2, Vec4};

pub const MATE_MAGIC: &[u8] = b"\x0eCM3D2_MATERIAL";

const TAG_TEX: &str = "tex";
const TAG_COL: &str = "col";
const TAG_VEC: &str = "vec";
const TAG_FLOAT: &str = "f";
const TAG_END: &str = "end";

const TEX_2D: &str = "tex2d";
const TEX_CUBE: &str = "cube";
const TEX_RT: &str = "texRT";
const TEX_NULL: &str = "null";

/// Material file (`.mate`).
///
/// Layout:
/// MAGIC
/// version:i32
/// mate_name:str
/// material.name:str
/// material.shader:str
/// material.shader_filename:str
/// properties: repeated { tag:str, payload by tag } until tag == "end"
#[derive(Clone, Debug, PartialEq)]
pub struct Mate {
    pub version: i32,
    pub mate_name: String,
    pub material: Material,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader: String,
    pub shader_filename: String,
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Tex { name: String, texture: Texture },
    Color { name: String, value: Vec4 },
    Vector { name: String, value: Vec4 },
    Float { name: String, value: f32 },
    End,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Texture {
    Tex2d(TexFile),
    Cube(TexFile),
    RenderTarget { name: String, path: String },
    Null,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TexFile {
    pub name: String,
    pub path: String,
    pub offset: Vec2,
    pub scale: Vec2,
}

impl Property {
    pub fn tag(&self) -> &'static str {
        match self {
            Property::Tex { .. } => TAG_TEX,
            Property::Color { .. } => TAG_COL,
            Property::Vector { .. } => TAG_VEC,
            Property::Float { .. } => TAG_FLOAT,
            Property::End => TAG_END,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Property::End)
    }

    /// Property name; `None` for the end marker.
    pub fn name(&self) -> Option<&str> {
        match self {
            Property::Tex { name, .. }
            | Property::Color { name, .. }
            | Property::Vector { name, .. }
            | Property::Float { name, .. } => Some(name),
            Property::End => None,
        }
    }
}

impl Codec for Property {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let tag = String::decode(r)?;
        let prop = match tag.as_str() {
            TAG_TEX => Property::Tex { name: String::decode(r)?, texture: Texture::decode(r)? },
            TAG_COL => Property::Color { name: String::decode(r)?, value: Vec4::decode(r)? },
            TAG_VEC => Property::Vector { name: String::decode(r)?, value: Vec4::decode(r)? },
            TAG_FLOAT => Property::Float { name: String::decode(r)?, value: r.take_f32()? },
            TAG_END => Property::End,
            _ => return Err(FormatError::UnknownTag { field: "property", tag }),
        };
        Ok(prop)
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        codec::comstr::encode_into(self.tag(), out);
        match self {
            Property::Tex { name, texture } => {
                name.encode(out)?;
                texture.encode(out)
            }
            Property::Color { name, value } | Property::Vector { name, value } => {
                name.encode(out)?;
                value.encode(out)
            }
            Property::Float { name, value } => {
                name.encode(out)?;
                value.encode(out)
            }
            Property::End => Ok(()),
        }
    }
}

impl Texture {
    pub fn kind(&self) -> &'static str {
        match self {
            Texture::Tex2d(_) => TEX_2D,
            Texture::Cube(_) => TEX_CUBE,
            Texture::RenderTarget { .. } => TEX_RT,
            Texture::Null => TEX_NULL,
        }
    }
}

impl Codec for Texture {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let kind = String::decode(r)?;
        let tex = match kind.as_str() {
            TEX_2D => Texture::Tex2d(TexFile::decode(r)?),
            TEX_CUBE => Texture::Cube(TexFile::decode(r)?),
            TEX_RT => Texture::RenderTarget { name: String::decode(r)?, path: String::decode(r)? },
            TEX_NULL => Texture::Null,
            _ => return Err(FormatError::UnknownTag { field: "texture", tag: kind }),
        };
        Ok(tex)
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        codec::comstr::encode_into(self.kind(), out);
        match self {
            Texture::Tex2d(f) | Texture::Cube(f) => f.encode(out),
            Texture::RenderTarget { name, path } => {
                name.encode(out)?;
                path.encode(out)
            }
            Texture::Null => Ok(()),
        }
    }
}

impl Codec for TexFile {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            name: String::decode(r)?,
            path: String::decode(r)?,
            offset: Vec2::decode(r)?,
            scale: Vec2::decode(r)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.name.encode(out)?;
        self.path.encode(out)?;
        self.offset.encode(out)?;
        self.scale.encode(out)
    }
}

impl Codec for Material {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            name: String::decode(r)?,
            shader: String::decode(r)?,
            shader_filename: String::decode(r)?,
            properties: codec::repeat_until(r, Property::is_end)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.name.encode(out)?;
        self.shader.encode(out)?;
        self.shader_filename.encode(out)?;
        codec::encode_terminated(&self.properties, Property::is_end, "property", out)
    }
}

impl Record for Mate {
    const MAGIC: &'static [u8] = MATE_MAGIC;

    fn decode_body(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            version: r.take_i32()?,
            mate_name: String::decode(r)?,
            material: Material::decode(r)?,
        })
    }

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        self.version.encode(out)?;
        self.mate_name.encode(out)?;
        self.material.encode(out)
    }
}

impl Mate {
    pub const DEFAULT_VERSION: i32 = 1000;

    /// Empty material holding only the end marker.
    pub fn create(mate_name: &str, shader: &str, shader_filename: &str, material_name: &str) -> Self {
        Self {
            version: Self::DEFAULT_VERSION,
            mate_name: mate_name.to_string(),
            material: Material {
                name: material_name.to_string(),
                shader: shader.to_string(),
                shader_filename: shader_filename.to_string(),
                properties: vec![Property::End],
            },
        }
    }

    /// Insert `prop` immediately before the end marker, appending a marker
    /// first if the list has none.
    pub fn add_property(&mut self, prop: Property) {
        if prop.is_end() {
            codec::sentinel_index(&mut self.material.properties, Property::is_end, || Property::End);
            return;
        }
        let props = &mut self.material.properties;
        let idx = codec::sentinel_index(props, Property::is_end, || Property::End);
        props.insert(idx, prop);
    }

    pub fn add_tex2d(&mut self, name: &str, file: &str, path: &str, offset: Vec2, scale: Vec2) {
        self.add_property(Property::Tex {
            name: name.to_string(),
            texture: Texture::Tex2d(TexFile {
                name: file.to_string(),
                path: path.to_string(),
                offset,
                scale,
            }),
        });
    }

    pub fn add_cube(&mut self, name: &str, file: &str, path: &str, offset: Vec2, scale: Vec2) {
        self.add_property(Property::Tex {
            name: name.to_string(),
            texture: Texture::Cube(TexFile {
                name: file.to_string(),
                path: path.to_string(),
                offset,
                scale,
            }),
        });
    }

    pub fn add_texrt(&mut self, name: &str, rt_name: &str, rt_path: &str) {
        self.add_property(Property::Tex {
            name: name.to_string(),
            texture: Texture::RenderTarget { name: rt_name.to_string(), path: rt_path.to_string() },
        });
    }

    pub fn add_texnull(&mut self, name: &str) {
        self.add_property(Property::Tex { name: name.to_string(), texture: Texture::Null });
    }

    pub fn add_color(&mut self, name: &str, color: impl Into<Vec4>) {
        self.add_property(Property::Color { name: name.to_string(), value: color.into() });
    }

    pub fn add_vector(&mut self, name: &str, vector: impl Into<Vec4>) {
        self.add_property(Property::Vector { name: name.to_string(), value: vector.into() });
    }

    pub fn add_float(&mut self, name: &str, value: f32) {
        self.add_property(Property::Float { name: name.to_string(), value });
    }
}
