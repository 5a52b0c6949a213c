pub mod base;
pub mod mate;
pub mod menu;
pub mod pmat;

pub use base::{Vec2, Vec4};
pub use mate::{Mate, Material, Property, TexFile, Texture};
pub use menu::{Command, Menu};
pub use pmat::{str_hash, Pmat};
