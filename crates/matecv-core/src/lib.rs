pub mod error;

pub mod codec;
pub mod model;
pub mod replace;

pub use crate::codec::Record;
pub use crate::error::{FormatError, Result};
pub use crate::model::{str_hash, Command, Mate, Material, Menu, Pmat, Property, TexFile, Texture, Vec2, Vec4};
pub use crate::replace::BinaryReplacer;
