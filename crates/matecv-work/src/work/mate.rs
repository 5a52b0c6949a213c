// crates/matecv-work/src/work/mate.rs

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use matecv_core::{Mate, Property, Record};
use parking_lot::Mutex;

use crate::config::BackupFailurePolicy;
use crate::context::RunContext;
use crate::discover::{Found, MATERIAL_MARKER};
use crate::error::{Result, WorkError};
use crate::event::Reporter;
use crate::naming::{render_mate_name, NameVars};
use crate::thread::{ArchiveSet, BackupSession, CancelToken};

const SHADER_FILE_PREFIX: &str = "com3d2mod";
const DEFAULT_FAMILY: &str = "npr";
const TOGGLE_SHADER_PREFIX: &str = "_NPRToon";
const TOGGLE_MARKER: &str = "Toggle";
const TOGGLE_SUFFIX: &str = "_ON_SSKEYWORD";

/// Results shared by the workers of the material phase.
#[derive(Debug, Default)]
pub(crate) struct MaterialIndex {
    renames: Mutex<HashMap<String, String>>,
    valid_names: Mutex<HashSet<String>>,
    claimed: Mutex<HashSet<PathBuf>>,
}

/// Frozen output of the material phase, read by the later phases.
#[derive(Clone, Debug, Default)]
pub(crate) struct MaterialNames {
    /// Lowercased old file name -> new file name.
    pub renames: HashMap<String, String>,
    /// Material-body names of every converted material.
    pub valid_names: HashSet<String>,
}

impl MaterialIndex {
    pub fn freeze(&self) -> MaterialNames {
        MaterialNames { renames: self.renames.lock().clone(), valid_names: self.valid_names.lock().clone() }
    }

    /// Reserve the first free name produced by `name_for(0)`, `name_for(1)`, ...
    /// A name is free if it is `path` itself, or neither on disk nor reserved.
    fn claim(&self, path: &Path, name_for: impl Fn(usize) -> String) -> Result<PathBuf> {
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let mut claimed = self.claimed.lock();
        let first = parent.join(name_for(0));
        let mut candidate = first.clone();
        let mut index = 0;
        loop {
            if candidate == path || (!candidate.exists() && !claimed.contains(&candidate)) {
                claimed.insert(candidate.clone());
                return Ok(candidate);
            }
            index += 1;
            candidate = parent.join(name_for(index));
            if candidate == first {
                // Template ignores the name; suffixes cannot disambiguate.
                return Err(WorkError::TargetExists(candidate));
            }
        }
    }

    fn release(&self, path: &Path) {
        self.claimed.lock().remove(path);
    }
}

/// Archive every discovered material before conversion. Returns `false` if
/// cancelled part way.
pub(crate) fn archive_materials(
    session: &BackupSession,
    found: &[Found],
    policy: BackupFailurePolicy,
    cancel: &CancelToken,
    reporter: &Reporter,
) -> Result<bool> {
    let mut set = ArchiveSet::new(session.clone());
    let mut announced: Option<&Path> = None;
    for f in found {
        if cancel.is_cancelled() {
            set.finish()?;
            return Ok(false);
        }
        if announced != Some(f.root.as_path()) {
            if let Some(archive) = session.archive_for(&f.root) {
                reporter.info(format!("Backing up to {}", archive.display()));
            }
            announced = Some(f.root.as_path());
        }
        let res = fs::read(&f.path).map_err(WorkError::from).and_then(|data| set.write(&f.root, &f.path, &data));
        if let Err(e) = res {
            match policy {
                BackupFailurePolicy::Isolate => {
                    reporter.error(format!("Backup failed for {}: {e}", f.path.display()));
                    set.disable(&f.root);
                }
                BackupFailurePolicy::Abort => {
                    let _ = set.finish();
                    return Err(WorkError::Backup(e.to_string()));
                }
            }
        }
    }
    set.finish()?;
    Ok(true)
}

/// Convert one material in place. Returns the new path.
pub(crate) fn convert_material(ctx: &RunContext, index: &MaterialIndex, path: &Path) -> Result<PathBuf> {
    let missing = || WorkError::MissingMarker { marker: MATERIAL_MARKER };
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(missing)?;
    let stem = path.file_stem().and_then(|n| n.to_str()).ok_or_else(missing)?;
    let (mate_name, shader_name) = stem.split_once(MATERIAL_MARKER).ok_or_else(missing)?;

    let mut mate = Mate::parse(&fs::read(path)?)?;

    let new_shader = ctx
        .shaders
        .shader_name(shader_name)
        .ok_or_else(|| WorkError::Lookup { shader: shader_name.to_string() })?;
    index.valid_names.lock().insert(mate.material.name.clone());

    mate.material.shader = new_shader.to_string();
    mate.material.shader_filename = format!("{SHADER_FILE_PREFIX}{shader_name}");

    let family = ctx.shaders.shader_family(shader_name).unwrap_or(DEFAULT_FAMILY);
    let template = &ctx.config.rename_template;
    let new_path = index.claim(path, |n| {
        let base = if n == 0 { mate_name.to_string() } else { format!("{mate_name}_{n}") };
        render_mate_name(template, &NameVars { mate_name: &base, shader_family: family, shader_name })
    })?;

    let new_name = new_path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
    mate.mate_name = new_name.strip_suffix(".mate").unwrap_or(&new_name).to_string();

    if shader_name.starts_with(TOGGLE_SHADER_PREFIX) {
        for prop in &mut mate.material.properties {
            if let Property::Float { name, .. } = prop {
                if name.contains(TOGGLE_MARKER) {
                    name.push_str(TOGGLE_SUFFIX);
                }
            }
        }
    }

    let data = match mate.build() {
        Ok(d) => d,
        Err(e) => {
            index.release(&new_path);
            return Err(e.into());
        }
    };

    if new_path != path {
        fs::rename(path, &new_path)?;
    }
    fs::write(&new_path, data)?;

    index.renames.lock().insert(file_name.to_lowercase(), new_name);
    Ok(new_path)
}
