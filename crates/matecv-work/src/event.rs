// crates/matecv-work/src/event.rs

use std::fmt;

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

/// Pipeline state. `Idle -> Materials -> Menus -> PropertyMaps -> Finished -> Idle`,
/// with any phase allowed to jump to `Finished` on cancellation or a guard
/// violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkPhase {
    Idle,
    Materials,
    Menus,
    PropertyMaps,
    Finished,
}

impl fmt::Display for WorkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkPhase::Idle => "idle",
            WorkPhase::Materials => "materials",
            WorkPhase::Menus => "menus",
            WorkPhase::PropertyMaps => "property-maps",
            WorkPhase::Finished => "finished",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Messages from the pipeline to whoever drives it.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkEvent {
    /// Request to enter a phase; the controller answers with `WorkManager::enter`.
    Phase(WorkPhase),
    Progress { phase: WorkPhase, percent: f32 },
    Log { level: LogLevel, message: String },
}

/// Single outlet for user-facing diagnostics: every message goes to `tracing`
/// and to the event channel.
#[derive(Clone, Debug)]
pub struct Reporter {
    tx: Sender<WorkEvent>,
}

impl Reporter {
    pub fn new(tx: Sender<WorkEvent>) -> Self {
        Self { tx }
    }

    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("{message}");
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.log(LogLevel::Error, message);
    }

    pub fn phase(&self, phase: WorkPhase) {
        debug!(%phase, "phase requested");
        self.send(WorkEvent::Phase(phase));
    }

    pub fn progress(&self, phase: WorkPhase, percent: f32) {
        self.send(WorkEvent::Progress { phase, percent });
    }

    fn log(&self, level: LogLevel, message: String) {
        self.send(WorkEvent::Log { level, message });
    }

    fn send(&self, ev: WorkEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(ev);
    }
}

/// Completed-item counter for one phase. Increment and report happen under
/// one lock so progress values arrive in non-decreasing order.
#[derive(Debug)]
pub struct PhaseProgress {
    phase: WorkPhase,
    total: usize,
    done: Mutex<usize>,
}

impl PhaseProgress {
    pub fn new(phase: WorkPhase, total: usize) -> Self {
        Self { phase, total, done: Mutex::new(0) }
    }

    pub fn tick(&self, reporter: &Reporter) {
        let mut done = self.done.lock();
        *done += 1;
        reporter.progress(self.phase, percent(*done, self.total));
    }

    pub fn done(&self) -> usize {
        *self.done.lock()
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

fn percent(done: usize, total: usize) -> f32 {
    if total == 0 {
        return 100.0;
    }
    (done as f32 * 100.0 / total as f32).min(100.0)
}
