// crates/matecv-cli/src/cmd/convert.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, ValueEnum};
use matecv_work::{
    run as run_pipeline, CancelToken, ConvertConfig, MenuMode, PhaseSummary, PropertyMapMode, RunContext,
    ShaderTables, WorkEvent, WorkPhase,
};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Mod directories to scan
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// JSON config; missing file means defaults
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Shader name table ({old: new})
    #[arg(long, default_value = "ShaderNames.json")]
    pub shader_names: PathBuf,

    /// Shader family table ({family: [shader, ...]})
    #[arg(long, default_value = "ShaderFamilies.json")]
    pub shader_families: PathBuf,

    /// Rename template, e.g. "{mate_name}_{shader_family}"
    #[arg(long)]
    pub template: Option<String>,

    #[arg(long, value_enum)]
    pub menu_mode: Option<MenuModeArg>,

    #[arg(long, value_enum)]
    pub pmat_mode: Option<PmatModeArg>,

    /// Share of CPU cores for the worker pool, in (0, 1]
    #[arg(long)]
    pub workers: Option<f32>,

    /// Skip backup archives
    #[arg(long)]
    pub no_backup: bool,

    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Where the skipped/failed file list goes
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the effective settings back to --config before running
    #[arg(long)]
    pub save_config: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MenuModeArg {
    Structural,
    BinaryReplace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PmatModeArg {
    Fix,
    ReportOnly,
    Skip,
}

impl From<MenuModeArg> for MenuMode {
    fn from(m: MenuModeArg) -> Self {
        match m {
            MenuModeArg::Structural => MenuMode::Structural,
            MenuModeArg::BinaryReplace => MenuMode::BinaryReplace,
        }
    }
}

impl From<PmatModeArg> for PropertyMapMode {
    fn from(m: PmatModeArg) -> Self {
        match m {
            PmatModeArg::Fix => PropertyMapMode::Fix,
            PmatModeArg::ReportOnly => PropertyMapMode::ReportOnly,
            PmatModeArg::Skip => PropertyMapMode::Skip,
        }
    }
}

fn load_config(args: &ConvertArgs) -> anyhow::Result<ConvertConfig> {
    let mut cfg = ConvertConfig::load(&args.config).with_context(|| format!("reading {}", args.config.display()))?;
    if let Some(t) = &args.template {
        cfg.rename_template = t.clone();
    }
    if let Some(m) = args.menu_mode {
        cfg.menu_mode = m.into();
    }
    if let Some(m) = args.pmat_mode {
        cfg.property_map_mode = m.into();
    }
    if let Some(w) = args.workers {
        cfg.worker_fraction = w;
    }
    if args.no_backup {
        cfg.backup_enabled = false;
    }
    if let Some(d) = &args.backup_dir {
        cfg.backup_dir = d.clone();
    }
    if let Some(r) = &args.report {
        cfg.report_path = r.clone();
    }
    cfg.normalize();
    Ok(cfg)
}

/// Prints one line per phase step of 10%.
#[derive(Default)]
struct ProgressLine {
    phase: Option<WorkPhase>,
    decile: u32,
}

impl ProgressLine {
    fn update(&mut self, phase: WorkPhase, percent: f32) {
        let decile = (percent / 10.0).floor() as u32;
        if self.phase != Some(phase) {
            self.phase = Some(phase);
            self.decile = 0;
        }
        if decile > self.decile {
            self.decile = decile;
            eprintln!("[{phase}] {:>3.0}%", percent);
        }
    }
}

fn print_phase(name: &str, s: &PhaseSummary) {
    eprintln!("{name:<14} found={:<6} converted={:<6} failed={}", s.found, s.converted, s.failed);
}

pub fn run(args: ConvertArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args)?;
    if args.save_config {
        cfg.save(&args.config).with_context(|| format!("writing {}", args.config.display()))?;
        tracing::info!(path = %args.config.display(), "config saved");
    }
    let tables = ShaderTables::load(&args.shader_names, &args.shader_families)
        .with_context(|| format!("reading shader tables from {}", args.shader_names.display()))?;
    if tables.is_empty() {
        tracing::warn!("shader name table is empty; every material will be skipped");
    }

    let ctx = Arc::new(RunContext::new(cfg, tables));
    let mut progress = ProgressLine::default();
    let summary = run_pipeline(ctx, args.roots, CancelToken::new(), |ev| {
        if let WorkEvent::Progress { phase, percent } = ev {
            progress.update(*phase, *percent);
        }
    })
    .context("conversion aborted")?;

    eprintln!("--- convert ---");
    print_phase("materials", &summary.materials);
    print_phase("menus", &summary.menus);
    print_phase("property maps", &summary.property_maps);
    if let Some(dir) = &summary.backup_dir {
        eprintln!("backup         = {}", dir.display());
    }
    if let Some(report) = &summary.report_path {
        eprintln!("report         = {}", report.display());
    }
    if summary.cancelled {
        anyhow::bail!("conversion cancelled");
    }
    Ok(())
}
