use thiserror::Error;

pub type Result<T> = std::result::Result<T, FormatError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic: expected {expected:?}")]
    BadMagic { expected: &'static [u8] },

    #[error("unexpected eof at offset {offset} (need {need} bytes)")]
    UnexpectedEof { offset: usize, need: usize },

    #[error("varint: {0}")]
    Varint(&'static str),

    #[error("string at offset {offset} is not valid utf-8")]
    InvalidUtf8 { offset: usize },

    #[error("unknown {field} tag: {tag:?}")]
    UnknownTag { field: &'static str, tag: String },

    #[error("{0} sequence must end with exactly one sentinel")]
    MissingSentinel(&'static str),

    #[error("command has {0} arguments (max 255)")]
    TooManyArguments(usize),

    #[error("menu body is {0} bytes (max i32::MAX)")]
    BodyTooLarge(usize),
}
