pub mod error;

pub mod config;
pub mod context;
pub mod discover;
pub mod event;
pub mod naming;
pub mod thread;
pub mod work;

pub use crate::config::{BackupFailurePolicy, ConvertConfig, MenuMode, PropertyMapMode};
pub use crate::context::{RunContext, ShaderLookup, ShaderTables};
pub use crate::error::{Result, WorkError};
pub use crate::event::{LogLevel, Reporter, WorkEvent, WorkPhase};
pub use crate::thread::CancelToken;
pub use crate::work::{run, PhaseSummary, RunSummary, WorkManager};
