// crates/matecv-work/src/config.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuMode {
    /// Parse, rewrite matching command arguments, rebuild.
    #[default]
    Structural,
    /// Substitute encoded names directly in the raw bytes.
    BinaryReplace,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyMapMode {
    #[default]
    Fix,
    ReportOnly,
    Skip,
}

/// What a failed backup archive write does to the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupFailurePolicy {
    /// Log, stop archiving for the affected root, keep converting.
    #[default]
    Isolate,
    /// Cancel the run and finish with the error.
    Abort,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// New material file name, `.mate` appended. Placeholders:
    /// `{mate_name}`, `{shader_family}`, `{shader_name}` (all-caps variants
    /// insert the upper-cased value).
    #[serde(alias = "mate_format")]
    pub rename_template: String,
    pub menu_mode: MenuMode,
    pub property_map_mode: PropertyMapMode,
    /// Share of available cores given to the worker pool, in (0, 1].
    #[serde(alias = "cpu_percent")]
    pub worker_fraction: f32,
    #[serde(alias = "backup")]
    pub backup_enabled: bool,
    pub backup_dir: PathBuf,
    pub report_path: PathBuf,
    /// Whether report-only property-map mismatches go into the failed list.
    pub report_only_counts_as_failed: bool,
    pub backup_failure_policy: BackupFailurePolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            rename_template: "{mate_name}_{shader_family}".to_string(),
            menu_mode: MenuMode::Structural,
            property_map_mode: PropertyMapMode::Fix,
            worker_fraction: 0.6,
            backup_enabled: true,
            backup_dir: PathBuf::from("backup"),
            report_path: PathBuf::from("failed_or_pass_list.txt"),
            report_only_counts_as_failed: false,
            backup_failure_policy: BackupFailurePolicy::Isolate,
        }
    }
}

impl ConvertConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut cfg: Self = serde_json::from_str(text)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn normalize(&mut self) {
        if !self.worker_fraction.is_finite() || self.worker_fraction <= 0.0 {
            self.worker_fraction = f32::MIN_POSITIVE;
        }
        self.worker_fraction = self.worker_fraction.min(1.0);
    }

    /// `max(1, floor(available_parallelism * worker_fraction))`.
    pub fn worker_threads(&self) -> usize {
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        ((cpus as f32 * self.worker_fraction).floor() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_keys_are_accepted() {
        let cfg = ConvertConfig::from_json(r#"{"mate_format": "{mate_name}", "cpu_percent": 0.5, "backup": false}"#)
            .expect("parse");
        assert_eq!(cfg.rename_template, "{mate_name}");
        assert_eq!(cfg.worker_fraction, 0.5);
        assert!(!cfg.backup_enabled);
        assert_eq!(cfg.menu_mode, MenuMode::Structural);
    }

    #[test]
    fn modes_use_kebab_case() {
        let cfg = ConvertConfig::from_json(
            r#"{"menu_mode": "binary-replace", "property_map_mode": "report-only", "backup_failure_policy": "abort"}"#,
        )
        .expect("parse");
        assert_eq!(cfg.menu_mode, MenuMode::BinaryReplace);
        assert_eq!(cfg.property_map_mode, PropertyMapMode::ReportOnly);
        assert_eq!(cfg.backup_failure_policy, BackupFailurePolicy::Abort);
    }

    #[test]
    fn worker_threads_never_zero() {
        let mut cfg = ConvertConfig { worker_fraction: -3.0, ..ConvertConfig::default() };
        cfg.normalize();
        assert_eq!(cfg.worker_threads(), 1);

        cfg.worker_fraction = 7.0;
        cfg.normalize();
        assert_eq!(cfg.worker_fraction, 1.0);
    }
}
