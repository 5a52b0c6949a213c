// crates/matecv-work/src/thread/pool.rs

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error};

use super::CancelToken;
use crate::error::{Result, WorkError};

const KILL_POLL: Duration = Duration::from_millis(10);

/// How a pool's task list ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolOutcome {
    /// Every task ran.
    Completed,
    /// Stop or cancel was observed; some tasks were skipped.
    Stopped,
}

#[derive(Debug, Default)]
struct PoolState {
    stop: AtomicBool,
    idle: AtomicBool,
}

/// A bounded rayon pool draining one task list from a driver thread.
///
/// Each task checks the stop flag before running, so `stop` lets in-flight
/// items finish and skips the rest. `on_finish` runs on the driver thread
/// after the pool is marked idle.
pub struct WorkPool {
    name: String,
    state: Arc<PoolState>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl WorkPool {
    pub fn start<T, F, D>(
        name: &str,
        threads: usize,
        items: Vec<T>,
        cancel: CancelToken,
        task: F,
        on_finish: D,
    ) -> Result<Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
        D: FnOnce(PoolOutcome) + Send + 'static,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name({
                let name = name.to_string();
                move |i| format!("{name}-{i}")
            })
            .build()
            .map_err(|e| WorkError::Pool(e.to_string()))?;

        let state = Arc::new(PoolState::default());
        let st = Arc::clone(&state);
        let label = name.to_string();

        let driver = thread::Builder::new().name(format!("{name}-driver")).spawn(move || {
            let halted = || st.stop.load(Ordering::Acquire) || cancel.is_cancelled();

            pool.install(|| {
                items.par_iter().for_each(|item| {
                    if halted() {
                        return;
                    }
                    if catch_unwind(AssertUnwindSafe(|| task(item))).is_err() {
                        error!(pool = %label, "worker task panicked");
                    }
                });
            });

            let outcome = if halted() { PoolOutcome::Stopped } else { PoolOutcome::Completed };
            debug!(pool = %label, ?outcome, "pool drained");
            st.idle.store(true, Ordering::Release);
            on_finish(outcome);
        })?;

        Ok(Self { name: name.to_string(), state, driver: Mutex::new(Some(driver)) })
    }

    /// Cooperative stop: running tasks finish, queued tasks are skipped.
    pub fn stop(&self) {
        self.state.stop.store(true, Ordering::Release);
    }

    /// True once the task list is drained or abandoned.
    pub fn is_stopped(&self) -> bool {
        self.state.idle.load(Ordering::Acquire)
    }

    /// Block until the driver thread (including `on_finish`) returns.
    pub fn wait(&self) {
        let handle = self.driver.lock().take();
        if let Some(h) = handle {
            if h.join().is_err() {
                error!(pool = %self.name, "driver thread panicked");
            }
        }
    }

    /// Stop and wait up to `timeout` for the drain. On timeout the driver is
    /// detached and left to exit on its own. Returns whether it drained.
    pub fn kill(&self, timeout: Duration) -> bool {
        self.stop();
        let deadline = Instant::now() + timeout;
        while !self.is_stopped() {
            if Instant::now() >= deadline {
                self.driver.lock().take();
                error!(pool = %self.name, "pool did not drain in {timeout:?}; detached");
                return false;
            }
            thread::sleep(KILL_POLL);
        }
        self.wait();
        true
    }
}
