// crates/matecv-work/src/work/menu.rs

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use matecv_core::{BinaryReplacer, Menu, Record};

use super::mate::MaterialNames;
use crate::config::MenuMode;
use crate::error::Result;
use crate::thread::BackupWriter;

/// Action tag of the command that swaps a slot's material.
pub const MATERIAL_CHANGE_TAG: &str = "マテリアル変更";
const REF_MARKER: &str = "_nprmat_";
const REF_EXT: &str = ".mate";

pub(crate) enum MenuRewriter {
    Structural(Arc<MaterialNames>),
    Binary(BinaryReplacer),
}

impl MenuRewriter {
    pub fn new(mode: MenuMode, names: Arc<MaterialNames>) -> Result<Self> {
        Ok(match mode {
            MenuMode::Structural => MenuRewriter::Structural(names),
            MenuMode::BinaryReplace => MenuRewriter::Binary(BinaryReplacer::compile(&names.renames)?),
        })
    }

    /// New file bytes, or `None` when nothing referenced a renamed material.
    pub fn rewrite(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            MenuRewriter::Structural(names) => {
                let mut menu = Menu::parse(data)?;
                if !rewrite_references(&mut menu, &names.renames) {
                    return Ok(None);
                }
                Ok(Some(menu.build()?))
            }
            MenuRewriter::Binary(replacer) => match replacer.replace(data) {
                // Replacements change string lengths; a rebuild restores the body size.
                Cow::Owned(out) if out != data => Ok(Some(Menu::parse(&out)?.build()?)),
                _ => Ok(None),
            },
        }
    }
}

/// Point material-change arguments at their renamed files. Returns whether
/// any argument changed.
pub(crate) fn rewrite_references(menu: &mut Menu, renames: &HashMap<String, String>) -> bool {
    let mut changed = false;
    for cmd in &mut menu.commands {
        if cmd.args.len() < 2 || cmd.action() != Some(MATERIAL_CHANGE_TAG) {
            continue;
        }
        for arg in cmd.args.iter_mut().skip(1) {
            let lower = arg.to_lowercase();
            if !(lower.contains(REF_MARKER) && lower.ends_with(REF_EXT)) {
                continue;
            }
            if let Some(new_name) = renames.get(&lower) {
                *arg = new_name.clone();
                changed = true;
            }
        }
    }
    changed
}

/// Rewrite one menu in place, archiving the old bytes first. Returns whether
/// the file changed.
pub(crate) fn convert_menu(
    rewriter: &MenuRewriter,
    backup: Option<&BackupWriter>,
    root: &Path,
    path: &Path,
) -> Result<bool> {
    let data = fs::read(path)?;
    let Some(new_data) = rewriter.rewrite(&data)? else {
        return Ok(false);
    };
    if let Some(w) = backup {
        w.add_backup(root, path, data);
    }
    fs::write(path, new_data)?;
    Ok(true)
}
