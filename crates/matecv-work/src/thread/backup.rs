// crates/matecv-work/src/thread/backup.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::CancelToken;
use crate::config::BackupFailurePolicy;
use crate::discover::posix;
use crate::error::{Result, WorkError};

pub const NEW_FILE_LIST: &str = "new_file_list.txt";
const ARCHIVE_EXT: &str = "zip";
const POLL: Duration = Duration::from_millis(100);

/// One timestamped backup directory holding an archive per input root.
#[derive(Clone, Debug)]
pub struct BackupSession {
    dir: PathBuf,
    archives: BTreeMap<PathBuf, PathBuf>,
}

impl BackupSession {
    /// Create `<backup_dir>/<YYYYmmdd_HHMMSS>/` and assign each root an
    /// archive name, suffixed `_<n>` when the name is taken.
    pub fn create(backup_dir: &Path, roots: &[PathBuf]) -> Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let dir = backup_dir.join(stamp);
        fs::create_dir_all(&dir)?;

        let mut used: HashSet<String> = HashSet::new();
        let mut archives = BTreeMap::new();
        for root in roots {
            let base = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "root".to_string());

            let mut name = base.clone();
            let mut index = 1;
            while used.contains(&name) || dir.join(format!("{name}.{ARCHIVE_EXT}")).exists() {
                name = format!("{base}_{index}");
                index += 1;
            }
            archives.insert(root.clone(), dir.join(format!("{name}.{ARCHIVE_EXT}")));
            used.insert(name);
        }
        debug!(dir = %dir.display(), roots = archives.len(), "backup session created");
        Ok(Self { dir, archives })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_for(&self, root: &Path) -> Option<&Path> {
        self.archives.get(root).map(PathBuf::as_path)
    }

    /// Append paths, one per line, to the session's new-file index.
    pub fn append_new_files(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut f = OpenOptions::new().create(true).append(true).open(self.dir.join(NEW_FILE_LIST))?;
        for p in paths {
            writeln!(f, "{}", posix(p))?;
        }
        Ok(())
    }
}

/// Open archive handles for a session, opened lazily per root. An existing
/// archive is appended to, so successive phases share one archive per root.
pub struct ArchiveSet {
    session: BackupSession,
    writers: HashMap<PathBuf, ZipWriter<File>>,
    disabled: HashSet<PathBuf>,
}

impl ArchiveSet {
    pub fn new(session: BackupSession) -> Self {
        Self { session, writers: HashMap::new(), disabled: HashSet::new() }
    }

    /// Store `data` under `path` relative to the root's parent directory.
    pub fn write(&mut self, root: &Path, path: &Path, data: &[u8]) -> Result<()> {
        if self.disabled.contains(root) {
            return Ok(());
        }
        let entry = entry_name(root, path);
        let w = self.writer(root)?;
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
        w.start_file(entry, opts)?;
        w.write_all(data)?;
        Ok(())
    }

    /// Skip all further writes for `root` and drop its handle.
    pub fn disable(&mut self, root: &Path) {
        if let Some(mut w) = self.writers.remove(root) {
            let _ = w.finish();
        }
        self.disabled.insert(root.to_path_buf());
    }

    /// Flush and close every handle. All handles are closed even if one fails;
    /// the first error is returned.
    pub fn finish(self) -> Result<()> {
        let mut first = None;
        for (root, mut w) in self.writers {
            if let Err(e) = w.finish() {
                error!(root = %root.display(), error = %e, "closing backup archive failed");
                first.get_or_insert(WorkError::Archive(e));
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn writer(&mut self, root: &Path) -> Result<&mut ZipWriter<File>> {
        if !self.writers.contains_key(root) {
            let archive = self
                .session
                .archive_for(root)
                .ok_or_else(|| WorkError::Backup(format!("no archive assigned to {}", root.display())))?;
            let w = if archive.exists() {
                let f = OpenOptions::new().read(true).write(true).open(archive)?;
                ZipWriter::new_append(f)?
            } else {
                ZipWriter::new(File::create(archive)?)
            };
            self.writers.insert(root.to_path_buf(), w);
        }
        self.writers
            .get_mut(root)
            .ok_or_else(|| WorkError::Backup(format!("archive handle lost for {}", root.display())))
    }
}

fn entry_name(root: &Path, path: &Path) -> String {
    let base = root.parent().unwrap_or(root);
    let rel = path.strip_prefix(base).unwrap_or(path);
    posix(rel)
}

/// Pre-modification bytes of one file.
#[derive(Debug)]
pub struct BackupEntry {
    pub root: PathBuf,
    pub path: PathBuf,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct WriterState {
    stop: AtomicBool,
    kill: AtomicBool,
    finished: AtomicBool,
    error: Mutex<Option<String>>,
}

/// Background archive writer fed through an unbounded queue.
///
/// Handles are closed only after `stop` was requested and the queue is empty,
/// so nothing enqueued before `stop` is lost. `kill` abandons the queue.
pub struct BackupWriter {
    tx: Sender<BackupEntry>,
    state: Arc<WriterState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackupWriter {
    pub fn start(session: BackupSession, policy: BackupFailurePolicy, cancel: CancelToken) -> Result<Self> {
        let (tx, rx) = unbounded();
        let state = Arc::new(WriterState::default());
        let st = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name("backup-writer".to_string())
            .spawn(move || drain(ArchiveSet::new(session), rx, &st, policy, &cancel))?;
        Ok(Self { tx, state, handle: Mutex::new(Some(handle)) })
    }

    /// Enqueue without blocking.
    pub fn add_backup(&self, root: &Path, path: &Path, data: Vec<u8>) {
        let entry = BackupEntry { root: root.to_path_buf(), path: path.to_path_buf(), data };
        if self.tx.send(entry).is_err() {
            warn!(path = %path.display(), "backup writer gone; entry dropped");
        }
    }

    pub fn stop(&self) {
        self.state.stop.store(true, Ordering::Release);
    }

    pub fn kill(&self) {
        self.state.kill.store(true, Ordering::Release);
        self.stop();
    }

    /// True once the drain loop has exited and handles are closed.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Request stop, wait for the drain, and report an error recorded under
    /// the abort policy.
    pub fn stop_and_wait(&self) -> Result<()> {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(h) = handle {
            if h.join().is_err() {
                return Err(WorkError::Backup("writer thread panicked".to_string()));
            }
        }
        match self.state.error.lock().take() {
            Some(msg) => Err(WorkError::Backup(msg)),
            None => Ok(()),
        }
    }
}

fn drain(
    mut set: ArchiveSet,
    rx: Receiver<BackupEntry>,
    st: &WriterState,
    policy: BackupFailurePolicy,
    cancel: &CancelToken,
) {
    let mut aborted = false;
    loop {
        if st.kill.load(Ordering::Acquire) {
            warn!(pending = rx.len(), "backup writer killed");
            break;
        }
        match rx.recv_timeout(POLL) {
            Ok(entry) => {
                if aborted {
                    continue;
                }
                if let Err(e) = set.write(&entry.root, &entry.path, &entry.data) {
                    match policy {
                        BackupFailurePolicy::Isolate => {
                            error!(root = %entry.root.display(), error = %e, "backup failed; archiving disabled for root");
                            set.disable(&entry.root);
                        }
                        BackupFailurePolicy::Abort => {
                            error!(path = %entry.path.display(), error = %e, "backup failed; aborting run");
                            *st.error.lock() = Some(e.to_string());
                            cancel.cancel();
                            aborted = true;
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if st.stop.load(Ordering::Acquire) && rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Err(e) = set.finish() {
        if policy == BackupFailurePolicy::Abort {
            st.error.lock().get_or_insert_with(|| e.to_string());
        }
    } else {
        info!("backup archives closed");
    }
    st.finished.store(true, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_relative_to_root_parent() {
        let root = Path::new("/data/mods");
        let path = Path::new("/data/mods/a/b.menu");
        assert_eq!(entry_name(root, path), "mods/a/b.menu");
    }
}
