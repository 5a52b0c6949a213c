// crates/matecv-work/src/work/pmat.rs

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use matecv_core::{Pmat, Record};
use parking_lot::Mutex;

use super::mate::MaterialNames;
use crate::config::PropertyMapMode;
use crate::error::{Result, WorkError};
use crate::event::Reporter;
use crate::thread::BackupWriter;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PmatOutcome {
    Unchanged,
    /// Embedded name replaced by the file stem.
    Fixed,
    /// File renamed after the embedded name.
    Renamed(PathBuf),
    /// Mismatch found but left alone (report-only mode).
    Flagged,
}

/// Rename targets reserved by the workers of the property-map phase.
#[derive(Debug, Default)]
pub(crate) struct PmatTargets {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl PmatTargets {
    /// Reserve `target` unless it is on disk or already reserved. The check
    /// and the reservation happen under one lock.
    fn claim(&self, target: &Path) -> Result<()> {
        let mut claimed = self.claimed.lock();
        if target.exists() || claimed.contains(target) {
            return Err(WorkError::TargetExists(target.to_path_buf()));
        }
        claimed.insert(target.to_path_buf());
        Ok(())
    }

    fn release(&self, target: &Path) {
        self.claimed.lock().remove(target);
    }
}

/// Reconcile a property map's file stem with its embedded material name
/// against the names known from the material phase.
pub(crate) fn check_pmat(
    mode: PropertyMapMode,
    names: &MaterialNames,
    targets: &PmatTargets,
    backup: Option<&BackupWriter>,
    reporter: &Reporter,
    root: &Path,
    path: &Path,
) -> Result<PmatOutcome> {
    let data = fs::read(path)?;
    let mut pmat = Pmat::parse(&data)?;

    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    if stem == pmat.material_name {
        return Ok(PmatOutcome::Unchanged);
    }

    let file_name = path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    let stem_known = names.valid_names.contains(&stem);
    let embedded_known = names.valid_names.contains(&pmat.material_name);

    let mut rename_to = None;
    match (stem_known, embedded_known) {
        (true, false) => {
            let msg = format!("Wrong material name in property map: {file_name}");
            if mode != PropertyMapMode::Fix {
                reporter.warn(msg);
                return Ok(PmatOutcome::Flagged);
            }
            reporter.info(msg);
            pmat.material_name = stem;
        }
        (false, true) => {
            let msg = format!("Wrong file name for property map: {file_name}");
            if mode != PropertyMapMode::Fix {
                reporter.warn(msg);
                return Ok(PmatOutcome::Flagged);
            }
            reporter.info(msg);
            let target = path.with_file_name(format!("{}.pmat", pmat.material_name));
            targets.claim(&target)?;
            rename_to = Some(target);
        }
        _ => {
            reporter.warn(format!("Property map with a potential error: {file_name}"));
            return Ok(PmatOutcome::Unchanged);
        }
    }

    let res = write_pmat(&pmat, backup, root, path, data, rename_to.as_deref());
    if let (Err(_), Some(target)) = (&res, &rename_to) {
        targets.release(target);
    }
    res
}

fn write_pmat(
    pmat: &Pmat,
    backup: Option<&BackupWriter>,
    root: &Path,
    path: &Path,
    data: Vec<u8>,
    rename_to: Option<&Path>,
) -> Result<PmatOutcome> {
    let new_data = pmat.build()?;
    if let Some(w) = backup {
        w.add_backup(root, path, data);
    }
    fs::write(path, new_data)?;
    match rename_to {
        Some(target) => {
            fs::rename(path, target)?;
            Ok(PmatOutcome::Renamed(target.to_path_buf()))
        }
        None => Ok(PmatOutcome::Fixed),
    }
}
