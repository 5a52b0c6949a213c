use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkError>;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(#[from] matecv_core::FormatError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("no shader mapping for {shader:?}")]
    Lookup { shader: String },

    #[error("file name has no {marker:?} marker")]
    MissingMarker { marker: &'static str },

    #[error("rename target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("{0}")]
    Guard(String),

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("worker pool: {0}")]
    Pool(String),

    #[error("worker task panicked")]
    Panicked,
}
