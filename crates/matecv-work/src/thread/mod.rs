// crates/matecv-work/src/thread/mod.rs

pub mod backup;
pub mod pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use backup::{ArchiveSet, BackupEntry, BackupSession, BackupWriter};
pub use pool::{PoolOutcome, WorkPool};

/// Shared cancellation flag, raised by the caller and polled by pools and
/// discovery loops.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
