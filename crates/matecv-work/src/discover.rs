// crates/matecv-work/src/discover.rs

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Marker separating a material's base name from its shader name in the
/// file stem.
pub const MATERIAL_MARKER: &str = "_NPRMAT";

/// File classes processed by the pipeline, one per phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// `*_NPRMAT_*.mate`
    Material,
    /// `*.menu`
    Menu,
    /// `*.pmat`
    PropertyMap,
}

impl AssetKind {
    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Material => "mate",
            AssetKind::Menu => "menu",
            AssetKind::PropertyMap => "pmat",
        }
    }

    /// Extension compares case-insensitively; the material marker does not.
    pub fn matches(self, file_name: &str) -> bool {
        let Some((stem, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        if !ext.eq_ignore_ascii_case(self.extension()) {
            return false;
        }
        match self {
            AssetKind::Material => stem.contains(&format!("{MATERIAL_MARKER}_")),
            AssetKind::Menu | AssetKind::PropertyMap => !stem.is_empty(),
        }
    }
}

/// A discovered file and the root it was found under.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Found {
    pub root: PathBuf,
    pub path: PathBuf,
}

/// Recursively collect regular files under each root matching `kind`.
/// Roots that are not directories are skipped with a warning. Output is
/// sorted by root order, then path.
pub fn discover(roots: &[PathBuf], kind: AssetKind) -> Vec<Found> {
    let mut out = Vec::new();
    for root in roots {
        if !root.is_dir() {
            warn!(root = %root.display(), "not a directory, skipped");
            continue;
        }
        let mut found: Vec<Found> = walk(root, kind)
            .into_iter()
            .map(|path| Found { root: root.clone(), path })
            .collect();
        found.sort();
        out.extend(found);
    }
    out
}

fn walk(root: &Path, kind: AssetKind) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "walk error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(|n| kind.matches(n)) {
            out.push(entry.into_path());
        }
    }
    out
}

/// Forward-slash rendering used in reports and backup indexes.
pub fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_pattern() {
        assert!(AssetKind::Material.matches("body_NPRMAT_NPRToonV2_.mate"));
        assert!(AssetKind::Material.matches("body_NPRMAT_NPRToonV2_.MATE"));
        assert!(!AssetKind::Material.matches("body_nprmat_NPRToonV2_.mate"));
        assert!(!AssetKind::Material.matches("body_NPRMAT.mate"));
        assert!(!AssetKind::Material.matches("body.mate"));
    }

    #[test]
    fn plain_extensions() {
        assert!(AssetKind::Menu.matches("a.menu"));
        assert!(AssetKind::Menu.matches("a.Menu"));
        assert!(!AssetKind::Menu.matches(".menu"));
        assert!(!AssetKind::Menu.matches("a.menu.bak"));
        assert!(AssetKind::PropertyMap.matches("x.pmat"));
    }
}
