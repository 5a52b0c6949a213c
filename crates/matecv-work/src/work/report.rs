// crates/matecv-work/src/work/report.rs

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::discover::posix;
use crate::error::Result;

/// Write every skipped or failed path, one per line, in phase order.
/// With nothing to report the file is removed instead. Returns whether a
/// report now exists.
pub fn write_report(path: &Path, lists: &[&[PathBuf]]) -> Result<bool> {
    if lists.iter().all(|l| l.is_empty()) {
        if path.exists() {
            fs::remove_file(path)?;
        }
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(fs::File::create(path)?);
    for p in lists.iter().flat_map(|l| l.iter()) {
        writeln!(w, "{}", posix(p))?;
    }
    w.flush()?;
    Ok(true)
}
