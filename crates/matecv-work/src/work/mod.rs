// crates/matecv-work/src/work/mod.rs
//
// Phase controller: Materials -> Menus -> PropertyMaps -> Finished. Each phase
// runs on a WorkPool whose completion callback requests the next phase on the
// event channel; the thread owning the WorkManager answers with `enter`.

mod mate;
mod menu;
mod pmat;
pub mod report;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::unbounded;
use parking_lot::Mutex;

use self::mate::{archive_materials, convert_material, MaterialIndex};
use self::menu::{convert_menu, MenuRewriter};
use self::pmat::{check_pmat, PmatOutcome, PmatTargets};
use crate::config::PropertyMapMode;
use crate::context::RunContext;
use crate::discover::{discover, AssetKind, Found};
use crate::error::{Result, WorkError};
use crate::event::{PhaseProgress, Reporter, WorkEvent, WorkPhase};
use crate::thread::{BackupSession, BackupWriter, CancelToken, PoolOutcome, WorkPool};

pub use self::menu::MATERIAL_CHANGE_TAG;
pub use self::report::write_report;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub found: usize,
    pub converted: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub materials: PhaseSummary,
    pub menus: PhaseSummary,
    pub property_maps: PhaseSummary,
    pub report_path: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.materials.failed + self.menus.failed + self.property_maps.failed
    }
}

struct Shared {
    ctx: Arc<RunContext>,
    reporter: Reporter,
    cancel: CancelToken,
    fatal: Mutex<Option<WorkError>>,
}

impl Shared {
    /// Record a run-ending error. The first one wins.
    fn fail_run(&self, e: WorkError) {
        self.reporter.error(e.to_string());
        self.fatal.lock().get_or_insert(e);
    }

    fn should_halt(&self) -> bool {
        self.cancel.is_cancelled() || self.fatal.lock().is_some()
    }

    fn next(&self, outcome: PoolOutcome, next: WorkPhase) -> WorkPhase {
        if outcome == PoolOutcome::Stopped || self.should_halt() {
            WorkPhase::Finished
        } else {
            next
        }
    }
}

/// Per-phase file lists and progress.
struct PhaseLedger {
    progress: PhaseProgress,
    converted: Mutex<Vec<PathBuf>>,
    failed: Mutex<Vec<PathBuf>>,
    renamed: Mutex<Vec<PathBuf>>,
}

impl PhaseLedger {
    fn new(phase: WorkPhase, found: usize) -> Self {
        Self {
            progress: PhaseProgress::new(phase, found),
            converted: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
            renamed: Mutex::new(Vec::new()),
        }
    }

    fn summary(&self) -> PhaseSummary {
        PhaseSummary {
            found: self.progress.total(),
            converted: self.converted.lock().len(),
            failed: self.failed.lock().len(),
        }
    }
}

/// Run `f` for one file, turning an error or panic into a failed-list entry
/// plus a warning.
fn settle<T>(shared: &Shared, ledger: &PhaseLedger, path: &Path, what: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| Err(WorkError::Panicked)) {
        Ok(v) => Some(v),
        Err(e) => {
            let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            shared.reporter.warn(format!("Skipped {what} {name}: {e}"));
            ledger.failed.lock().push(path.to_path_buf());
            None
        }
    }
}

pub struct WorkManager {
    shared: Arc<Shared>,
    phase: WorkPhase,
    roots: Vec<PathBuf>,
    session: Option<BackupSession>,
    pool: Option<WorkPool>,
    writer: Option<Arc<BackupWriter>>,
    index: Arc<MaterialIndex>,
    materials: Option<Arc<PhaseLedger>>,
    menus: Option<Arc<PhaseLedger>>,
    pmats: Option<Arc<PhaseLedger>>,
    summary: RunSummary,
}

impl WorkManager {
    pub fn new(ctx: Arc<RunContext>, reporter: Reporter, cancel: CancelToken) -> Self {
        Self {
            shared: Arc::new(Shared { ctx, reporter, cancel, fatal: Mutex::new(None) }),
            phase: WorkPhase::Idle,
            roots: Vec::new(),
            session: None,
            pool: None,
            writer: None,
            index: Arc::new(MaterialIndex::default()),
            materials: None,
            menus: None,
            pmats: None,
            summary: RunSummary::default(),
        }
    }

    pub fn phase(&self) -> WorkPhase {
        self.phase
    }

    /// Whether a pool or backup writer from an earlier phase is still live.
    pub fn is_busy(&self) -> bool {
        self.pool.as_ref().is_some_and(|p| !p.is_stopped()) || self.writer.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Begin a run over `roots`. Non-directories are skipped.
    pub fn start(&mut self, roots: Vec<PathBuf>) {
        if !self.guard() {
            return;
        }
        self.clear();
        self.roots = roots
            .into_iter()
            .filter(|r| {
                let ok = r.is_dir();
                if !ok {
                    self.shared.reporter.warn(format!("Not a directory, skipped: {}", r.display()));
                }
                ok
            })
            .collect();
        self.start_materials();
    }

    /// Answer a `WorkEvent::Phase` request.
    pub fn enter(&mut self, phase: WorkPhase) {
        match phase {
            WorkPhase::Menus => self.start_menus(),
            WorkPhase::PropertyMaps => self.start_pmats(),
            WorkPhase::Finished => self.finish(),
            WorkPhase::Idle | WorkPhase::Materials => {}
        }
    }

    /// Cooperative stop of whatever is running.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
        if let Some(p) = &self.pool {
            p.stop();
        }
        if let Some(w) = &self.writer {
            w.stop();
        }
    }

    /// Forced shutdown: the backup queue is abandoned and the pool detached
    /// if it does not drain within `timeout`.
    pub fn kill(&self, timeout: Duration) -> bool {
        self.shared.cancel.cancel();
        if let Some(w) = &self.writer {
            w.kill();
        }
        self.pool.as_ref().map_or(true, |p| p.kill(timeout))
    }

    /// Summary of the finished run, or the error that ended it.
    pub fn into_result(mut self) -> Result<RunSummary> {
        if let Some(p) = self.pool.take() {
            p.wait();
        }
        let fatal = self.shared.fatal.lock().take();
        match fatal {
            Some(e) => Err(e),
            None => Ok(self.summary),
        }
    }

    fn ctx(&self) -> &RunContext {
        &self.shared.ctx
    }

    fn reporter(&self) -> &Reporter {
        &self.shared.reporter
    }

    fn clear(&mut self) {
        self.roots.clear();
        self.session = None;
        self.pool = None;
        self.writer = None;
        self.index = Arc::new(MaterialIndex::default());
        self.materials = None;
        self.menus = None;
        self.pmats = None;
        self.summary = RunSummary::default();
        *self.shared.fatal.lock() = None;
    }

    /// Refuse to start a phase while an earlier pool or writer is live, or
    /// once the run is cancelled. Either way the run is sent to `Finished`.
    fn guard(&mut self) -> bool {
        if self.pool.as_ref().is_some_and(|p| !p.is_stopped()) {
            self.shared.fail_run(WorkError::Guard("a work pool is still running".to_string()));
            self.reporter().phase(WorkPhase::Finished);
            return false;
        }
        if let Some(w) = self.writer.as_ref().filter(|w| !w.is_finished()) {
            w.stop();
            self.shared.fail_run(WorkError::Guard("a backup writer is still running".to_string()));
            self.reporter().phase(WorkPhase::Finished);
            return false;
        }
        if self.phase != WorkPhase::Idle && self.shared.should_halt() {
            self.reporter().phase(WorkPhase::Finished);
            return false;
        }
        true
    }

    fn begin(&mut self, phase: WorkPhase, kind: AssetKind, label: &str) -> (Vec<Found>, Arc<PhaseLedger>) {
        self.phase = phase;
        self.reporter().progress(phase, 0.0);
        let found = discover(&self.roots, kind);
        self.reporter().info(format!("Found {} {label}", found.len()));
        let ledger = Arc::new(PhaseLedger::new(phase, found.len()));
        (found, ledger)
    }

    fn launch<T, F, D>(&mut self, name: &str, items: Vec<T>, task: F, on_finish: D)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
        D: FnOnce(PoolOutcome) + Send + 'static,
    {
        let threads = self.ctx().config.worker_threads();
        match WorkPool::start(name, threads, items, self.shared.cancel.clone(), task, on_finish) {
            Ok(p) => {
                self.reporter().info(format!("Processing {name} on {threads} worker(s)"));
                self.pool = Some(p);
            }
            Err(e) => {
                self.shared.fail_run(e);
                self.reporter().phase(WorkPhase::Finished);
            }
        }
    }

    fn start_writer(&mut self) -> Result<Option<Arc<BackupWriter>>> {
        let cfg = &self.ctx().config;
        let writer = match (&self.session, cfg.backup_enabled) {
            (Some(s), true) => {
                Some(Arc::new(BackupWriter::start(s.clone(), cfg.backup_failure_policy, self.shared.cancel.clone())?))
            }
            _ => None,
        };
        self.writer = writer.clone();
        Ok(writer)
    }

    fn start_materials(&mut self) {
        self.reporter().info("Searching...");
        let (found, ledger) = self.begin(WorkPhase::Materials, AssetKind::Material, "materials");
        self.materials = Some(Arc::clone(&ledger));
        if found.is_empty() {
            self.reporter().phase(WorkPhase::Finished);
            return;
        }

        let cfg = &self.shared.ctx.config;
        if cfg.backup_enabled {
            let archived = BackupSession::create(&cfg.backup_dir, &self.roots).and_then(|s| {
                let done = archive_materials(&s, &found, cfg.backup_failure_policy, &self.shared.cancel, &self.shared.reporter);
                self.session = Some(s);
                done
            });
            match archived {
                Ok(true) => {}
                Ok(false) => {
                    self.reporter().info("Cancelled during backup");
                    self.reporter().phase(WorkPhase::Finished);
                    return;
                }
                Err(e) => {
                    self.shared.fail_run(e);
                    self.reporter().phase(WorkPhase::Finished);
                    return;
                }
            }
        }

        let task = {
            let shared = Arc::clone(&self.shared);
            let index = Arc::clone(&self.index);
            let ledger = Arc::clone(&ledger);
            move |f: &Found| {
                let res = settle(&shared, &ledger, &f.path, "material", || convert_material(&shared.ctx, &index, &f.path));
                if let Some(new_path) = res {
                    ledger.converted.lock().push(new_path);
                }
                ledger.progress.tick(&shared.reporter);
            }
        };
        let on_finish = {
            let shared = Arc::clone(&self.shared);
            let session = self.session.clone();
            move |outcome| {
                if let Some(s) = &session {
                    let converted = ledger.converted.lock().clone();
                    if let Err(e) = s.append_new_files(&converted) {
                        shared.reporter.error(format!("Writing new file list failed: {e}"));
                    }
                }
                shared.reporter.phase(shared.next(outcome, WorkPhase::Menus));
            }
        };
        self.launch("materials", found, task, on_finish);
    }

    fn start_menus(&mut self) {
        if !self.guard() {
            return;
        }
        let names = Arc::new(self.index.freeze());
        let (found, ledger) = self.begin(WorkPhase::Menus, AssetKind::Menu, "menus");
        self.menus = Some(Arc::clone(&ledger));
        if found.is_empty() {
            self.reporter().phase(WorkPhase::PropertyMaps);
            return;
        }

        let prepared = MenuRewriter::new(self.ctx().config.menu_mode, names)
            .and_then(|r| Ok((Arc::new(r), self.start_writer()?)));
        let (rewriter, writer) = match prepared {
            Ok(v) => v,
            Err(e) => {
                self.shared.fail_run(e);
                self.reporter().phase(WorkPhase::Finished);
                return;
            }
        };

        let task = {
            let shared = Arc::clone(&self.shared);
            let ledger = Arc::clone(&ledger);
            let writer = writer.clone();
            move |f: &Found| {
                let res = settle(&shared, &ledger, &f.path, "menu", || {
                    convert_menu(&rewriter, writer.as_deref(), &f.root, &f.path)
                });
                if res == Some(true) {
                    ledger.converted.lock().push(f.path.clone());
                }
                ledger.progress.tick(&shared.reporter);
            }
        };
        let on_finish = {
            let shared = Arc::clone(&self.shared);
            move |outcome| {
                if let Some(w) = &writer {
                    match w.stop_and_wait() {
                        Ok(()) => shared.reporter.debug("Menu backups flushed"),
                        Err(e) => shared.fail_run(e),
                    }
                }
                shared.reporter.phase(shared.next(outcome, WorkPhase::PropertyMaps));
            }
        };
        self.launch("menus", found, task, on_finish);
    }

    fn start_pmats(&mut self) {
        if !self.guard() {
            return;
        }
        let mode = self.ctx().config.property_map_mode;
        if mode == PropertyMapMode::Skip {
            self.phase = WorkPhase::PropertyMaps;
            self.reporter().info("Property map check skipped");
            self.reporter().phase(WorkPhase::Finished);
            return;
        }
        let names = Arc::new(self.index.freeze());
        let (found, ledger) = self.begin(WorkPhase::PropertyMaps, AssetKind::PropertyMap, "property maps");
        self.pmats = Some(Arc::clone(&ledger));
        if found.is_empty() {
            self.reporter().phase(WorkPhase::Finished);
            return;
        }

        let writer = match self.start_writer() {
            Ok(w) => w,
            Err(e) => {
                self.shared.fail_run(e);
                self.reporter().phase(WorkPhase::Finished);
                return;
            }
        };

        let targets = PmatTargets::default();
        let task = {
            let shared = Arc::clone(&self.shared);
            let ledger = Arc::clone(&ledger);
            let writer = writer.clone();
            move |f: &Found| {
                let res = settle(&shared, &ledger, &f.path, "property map", || {
                    check_pmat(mode, &names, &targets, writer.as_deref(), &shared.reporter, &f.root, &f.path)
                });
                match res {
                    Some(PmatOutcome::Fixed) => ledger.converted.lock().push(f.path.clone()),
                    Some(PmatOutcome::Renamed(to)) => {
                        ledger.converted.lock().push(to.clone());
                        ledger.renamed.lock().push(to);
                    }
                    Some(PmatOutcome::Flagged) if shared.ctx.config.report_only_counts_as_failed => {
                        ledger.failed.lock().push(f.path.clone());
                    }
                    _ => {}
                }
                ledger.progress.tick(&shared.reporter);
            }
        };
        let on_finish = {
            let shared = Arc::clone(&self.shared);
            let session = self.session.clone();
            move |outcome| {
                if let Some(w) = &writer {
                    match w.stop_and_wait() {
                        Ok(()) => shared.reporter.debug("Property map backups flushed"),
                        Err(e) => shared.fail_run(e),
                    }
                }
                if let Some(s) = &session {
                    let renamed = ledger.renamed.lock().clone();
                    if let Err(e) = s.append_new_files(&renamed) {
                        shared.reporter.error(format!("Writing new file list failed: {e}"));
                    }
                }
                shared.reporter.phase(shared.next(outcome, WorkPhase::Finished));
            }
        };
        self.launch("property maps", found, task, on_finish);
    }

    fn finish(&mut self) {
        if let Some(p) = self.pool.as_ref().filter(|p| !p.is_stopped()) {
            p.stop();
        }
        self.phase = WorkPhase::Finished;

        let failed = |l: &Option<Arc<PhaseLedger>>| l.as_ref().map(|l| l.failed.lock().clone()).unwrap_or_default();
        let (m, n, p) = (failed(&self.materials), failed(&self.menus), failed(&self.pmats));

        let report_path = self.ctx().config.report_path.clone();
        let report = match write_report(&report_path, &[&m, &n, &p]) {
            Ok(true) => {
                self.reporter().warn(format!(
                    "{} file(s) skipped or failed, listed in {}",
                    m.len() + n.len() + p.len(),
                    report_path.display()
                ));
                Some(report_path)
            }
            Ok(false) => None,
            Err(e) => {
                self.reporter().error(format!("Writing report failed: {e}"));
                None
            }
        };

        let summarize = |l: &Option<Arc<PhaseLedger>>| l.as_ref().map(|l| l.summary()).unwrap_or_default();
        self.summary = RunSummary {
            materials: summarize(&self.materials),
            menus: summarize(&self.menus),
            property_maps: summarize(&self.pmats),
            report_path: report,
            backup_dir: self.session.as_ref().map(|s| s.dir().to_path_buf()),
            cancelled: self.shared.cancel.is_cancelled(),
        };
        if self.summary.cancelled {
            self.reporter().warn("Cancelled");
        } else {
            self.reporter().info("Finished");
        }

        self.materials = None;
        self.menus = None;
        self.pmats = None;
        self.phase = WorkPhase::Idle;
    }
}

/// Drive a full run on the calling thread, forwarding every event to
/// `on_event`. Returns once the run reaches `Finished`.
pub fn run<F>(ctx: Arc<RunContext>, roots: Vec<PathBuf>, cancel: CancelToken, mut on_event: F) -> Result<RunSummary>
where
    F: FnMut(&WorkEvent),
{
    let (tx, rx) = unbounded();
    let mut manager = WorkManager::new(ctx, Reporter::new(tx), cancel);
    manager.start(roots);

    while let Ok(event) = rx.recv() {
        on_event(&event);
        if let WorkEvent::Phase(phase) = event {
            manager.enter(phase);
            if phase == WorkPhase::Finished {
                break;
            }
        }
    }
    for event in rx.try_iter() {
        on_event(&event);
    }
    manager.into_result()
}
