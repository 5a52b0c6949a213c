// crates/matecv-work/tests/pipeline.rs

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use matecv_core::{Mate, Menu, Pmat, Property, Record, Vec2};
use matecv_work::work::MATERIAL_CHANGE_TAG;
use matecv_work::{
    run, CancelToken, ConvertConfig, LogLevel, MenuMode, PropertyMapMode, Reporter, RunContext, RunSummary,
    ShaderLookup, ShaderTables, WorkError, WorkEvent, WorkManager, WorkPhase,
};

const TOON: &str = "_NPRToonV2_";

fn tables() -> ShaderTables {
    ShaderTables::new()
        .with_name(TOON, "CM3D2/Toony_Lighted")
        .with_name("_NPRToonV3_", "CM3D2/Toony_Lighted_Trans")
        .with_family("toon", [TOON, "_NPRToonV3_"])
}

fn context(dir: &Path, tweak: impl FnOnce(&mut ConvertConfig)) -> Arc<RunContext> {
    let mut cfg = ConvertConfig {
        backup_dir: dir.join("backup"),
        report_path: dir.join("report.txt"),
        worker_fraction: 1.0,
        ..ConvertConfig::default()
    };
    tweak(&mut cfg);
    Arc::new(RunContext::new(cfg, tables()))
}

const WAIT: Duration = Duration::from_secs(10);

/// Shader tables whose name lookup parks the calling worker until the test
/// releases it. Dropping the release sender lets every lookup through.
struct GatedTables {
    inner: ShaderTables,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl ShaderLookup for GatedTables {
    fn shader_name(&self, old_ref: &str) -> Option<&str> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        self.inner.shader_name(old_ref)
    }

    fn shader_family(&self, old_ref: &str) -> Option<&str> {
        self.inner.shader_family(old_ref)
    }
}

struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

/// Single-worker context on gated tables.
fn gated_context(dir: &Path, tweak: impl FnOnce(&mut ConvertConfig)) -> (Arc<RunContext>, Gate) {
    let mut cfg = ConvertConfig {
        backup_dir: dir.join("backup"),
        report_path: dir.join("report.txt"),
        worker_fraction: f32::MIN_POSITIVE,
        ..ConvertConfig::default()
    };
    tweak(&mut cfg);
    let (entered_tx, entered_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    let tables = GatedTables { inner: tables(), entered: entered_tx, release: release_rx };
    (Arc::new(RunContext::new(cfg, tables)), Gate { entered: entered_rx, release: release_tx })
}

/// Answer phase requests until `Finished`, returning every event seen.
fn drive(manager: &mut WorkManager, rx: &Receiver<WorkEvent>) -> Vec<WorkEvent> {
    let mut events = Vec::new();
    loop {
        let ev = rx.recv_timeout(WAIT).expect("event");
        events.push(ev.clone());
        if let WorkEvent::Phase(phase) = ev {
            manager.enter(phase);
            if phase == WorkPhase::Finished {
                return events;
            }
        }
    }
}

fn write_mate(path: &Path, material_name: &str) {
    let stem = path.file_stem().and_then(|s| s.to_str()).expect("stem");
    let mut mate = Mate::create(stem, "old/shader", "old_shader", material_name);
    mate.add_tex2d("_MainTex", "body_tex", "Assets/body_tex.png", Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
    mate.add_float("_ToggleOutline", 1.0);
    mate.add_float("_Shininess", 0.5);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, mate.build().expect("build mate")).expect("write mate");
}

fn write_menu(path: &Path, mate_ref: &str) {
    let mut menu = Menu::create("item", "wear", "info", "src");
    menu.add_command([MATERIAL_CHANGE_TAG, "wear", "0", mate_ref]);
    menu.add_command(["icons", "icon.tex"]);
    fs::write(path, menu.build().expect("build menu")).expect("write menu");
}

fn write_pmat(path: &Path, material_name: &str) {
    let pmat = Pmat::create(material_name, 3000.0, None);
    fs::write(path, pmat.build().expect("build pmat")).expect("write pmat");
}

fn read<R: Record>(path: &Path) -> R {
    R::parse(&fs::read(path).expect("read")).expect("parse")
}

fn run_collect(ctx: Arc<RunContext>, roots: &[PathBuf], cancel: CancelToken) -> (Result<RunSummary, WorkError>, Vec<WorkEvent>) {
    let mut events = Vec::new();
    let res = run(ctx, roots.to_vec(), cancel, |ev| events.push(ev.clone()));
    (res, events)
}

fn phases(events: &[WorkEvent]) -> Vec<WorkPhase> {
    events
        .iter()
        .filter_map(|ev| match ev {
            WorkEvent::Phase(p) => Some(*p),
            _ => None,
        })
        .collect()
}

fn zip_entries(path: &Path) -> BTreeSet<String> {
    let f = fs::File::open(path).expect("open zip");
    let archive = zip::ZipArchive::new(f).expect("zip archive");
    archive.file_names().map(str::to_string).collect()
}

#[test]
fn full_run_renames_materials_and_follows_references() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let sub = root.join("a");
    write_mate(&sub.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    write_mate(&sub.join("hair_NPRMAT_NPRToonV2_.mate"), "hair_mat");
    write_menu(&sub.join("body.menu"), "BODY_NPRMAT_NPRToonV2_.mate");
    write_pmat(&sub.join("body_mat.pmat"), "stale_name");
    write_pmat(&sub.join("oops.pmat"), "hair_mat");

    let ctx = context(dir.path(), |_| {});
    let (res, events) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    // Materials
    assert!(!sub.join("body_NPRMAT_NPRToonV2_.mate").exists());
    let mate: Mate = read(&sub.join("body_toon.mate"));
    assert_eq!(mate.mate_name, "body_toon");
    assert_eq!(mate.material.name, "body_mat");
    assert_eq!(mate.material.shader, "CM3D2/Toony_Lighted");
    assert_eq!(mate.material.shader_filename, "com3d2mod_NPRToonV2_");
    let names: Vec<&str> = mate.material.properties.iter().filter_map(Property::name).collect();
    assert_eq!(names, ["_MainTex", "_ToggleOutline_ON_SSKEYWORD", "_Shininess"]);
    assert!(sub.join("hair_toon.mate").exists());

    // Menus
    let menu: Menu = read(&sub.join("body.menu"));
    assert_eq!(menu.commands[0].args[3], "body_toon.mate");
    assert_eq!(menu.commands[1].args, ["icons", "icon.tex"]);

    // Property maps
    let fixed: Pmat = read(&sub.join("body_mat.pmat"));
    assert_eq!(fixed.material_name, "body_mat");
    assert!(!sub.join("oops.pmat").exists());
    let renamed: Pmat = read(&sub.join("hair_mat.pmat"));
    assert_eq!(renamed.material_name, "hair_mat");

    assert_eq!(summary.materials.found, 2);
    assert_eq!(summary.materials.converted, 2);
    assert_eq!(summary.menus.converted, 1);
    assert_eq!(summary.property_maps.converted, 2);
    assert_eq!(summary.failed(), 0);
    assert!(!summary.cancelled);
    assert_eq!(summary.report_path, None);
    assert!(!dir.path().join("report.txt").exists());

    assert_eq!(phases(&events), [WorkPhase::Menus, WorkPhase::PropertyMaps, WorkPhase::Finished]);
    let last_material = events.iter().rev().find_map(|ev| match ev {
        WorkEvent::Progress { phase: WorkPhase::Materials, percent } => Some(*percent),
        _ => None,
    });
    assert_eq!(last_material, Some(100.0));

    // Backups hold the pre-modification bytes of every touched file.
    let backup_dir = summary.backup_dir.expect("backup dir");
    let entries = zip_entries(&backup_dir.join("mods.zip"));
    for name in [
        "mods/a/body_NPRMAT_NPRToonV2_.mate",
        "mods/a/hair_NPRMAT_NPRToonV2_.mate",
        "mods/a/body.menu",
        "mods/a/body_mat.pmat",
        "mods/a/oops.pmat",
    ] {
        assert!(entries.contains(name), "missing {name} in {entries:?}");
    }
    let new_files = fs::read_to_string(backup_dir.join("new_file_list.txt")).expect("new file list");
    assert!(new_files.lines().any(|l| l.ends_with("mods/a/body_toon.mate")));
    assert!(new_files.lines().any(|l| l.ends_with("mods/a/hair_mat.pmat")));
}

#[test]
fn existing_target_gets_numeric_suffix() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    fs::write(root.join("body_toon.mate"), b"occupied").expect("write");
    write_menu(&root.join("body.menu"), "body_NPRMAT_NPRToonV2_.mate");

    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, _) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    assert_eq!(fs::read(root.join("body_toon.mate")).expect("read"), b"occupied");
    let mate: Mate = read(&root.join("body_1_toon.mate"));
    assert_eq!(mate.mate_name, "body_1_toon");
    let menu: Menu = read(&root.join("body.menu"));
    assert_eq!(menu.commands[0].args[3], "body_1_toon.mate");
    assert_eq!(summary.backup_dir, None);
}

#[test]
fn concurrent_workers_never_claim_the_same_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "a");
    write_mate(&root.join("body_NPRMAT_NPRToonV3_.mate"), "b");

    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, _) = run_collect(ctx, &[root.clone()], CancelToken::new());
    assert_eq!(res.expect("run").materials.converted, 2);

    let produced: BTreeSet<String> = fs::read_dir(&root)
        .expect("read_dir")
        .filter_map(|e| e.ok()?.file_name().into_string().ok())
        .collect();
    let expected: BTreeSet<String> = ["body_toon.mate", "body_1_toon.mate"].map(String::from).into();
    assert_eq!(produced, expected);
}

#[test]
fn rejected_materials_are_reported_and_left_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("x_NPRMAT_Unknown_.mate"), "x");
    fs::write(root.join("y_NPRMAT_NPRToonV2_.mate"), b"not a material").expect("write");
    write_mate(&root.join("ok_NPRMAT_NPRToonV2_.mate"), "ok");

    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, events) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    assert_eq!(summary.materials.found, 3);
    assert_eq!(summary.materials.converted, 1);
    assert_eq!(summary.materials.failed, 2);
    assert!(root.join("x_NPRMAT_Unknown_.mate").exists());
    assert_eq!(fs::read(root.join("y_NPRMAT_NPRToonV2_.mate")).expect("read"), b"not a material");

    let report_path = summary.report_path.expect("report written");
    let report = fs::read_to_string(report_path).expect("report");
    assert_eq!(report.lines().count(), 2);
    assert!(report.contains("x_NPRMAT_Unknown_.mate"));
    assert!(report.contains("y_NPRMAT_NPRToonV2_.mate"));

    let warnings = events
        .iter()
        .filter(|ev| matches!(ev, WorkEvent::Log { level: matecv_work::LogLevel::Warn, message } if message.starts_with("Skipped material")))
        .count();
    assert_eq!(warnings, 2);
}

#[test]
fn clean_run_removes_stale_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("ok_NPRMAT_NPRToonV2_.mate"), "ok");
    fs::write(dir.path().join("report.txt"), "old\n").expect("write");

    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, _) = run_collect(ctx, &[root], CancelToken::new());
    assert_eq!(res.expect("run").report_path, None);
    assert!(!dir.path().join("report.txt").exists());
}

#[test]
fn binary_replace_mode_rewrites_references() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    write_menu(&root.join("body.menu"), "Body_NPRMAT_NPRToonV2_.mate");
    write_menu(&root.join("other.menu"), "unrelated_NPRMAT_x.mate");
    let untouched = fs::read(root.join("other.menu")).expect("read");

    let ctx = context(dir.path(), |c| {
        c.backup_enabled = false;
        c.menu_mode = MenuMode::BinaryReplace;
    });
    let (res, _) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    let menu: Menu = read(&root.join("body.menu"));
    assert_eq!(menu.commands[0].args[3], "body_toon.mate");
    // Header body size matches the shortened command block.
    assert_eq!(menu.build().expect("build"), fs::read(root.join("body.menu")).expect("read"));
    assert_eq!(fs::read(root.join("other.menu")).expect("read"), untouched);
    assert_eq!(summary.menus.found, 2);
    assert_eq!(summary.menus.converted, 1);
}

#[test]
fn unparsable_menu_is_rejected_without_stopping_the_phase() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    fs::write(root.join("broken.menu"), b"\x0aCM3D2_MENU\x01").expect("write");
    write_menu(&root.join("body.menu"), "body_NPRMAT_NPRToonV2_.mate");

    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, _) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    assert_eq!(summary.menus.failed, 1);
    assert_eq!(summary.menus.converted, 1);
    let report = fs::read_to_string(summary.report_path.expect("report")).expect("read");
    assert!(report.contains("broken.menu"));
}

#[test]
fn report_only_leaves_property_maps_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    write_pmat(&root.join("body_mat.pmat"), "stale_name");
    let before = fs::read(root.join("body_mat.pmat")).expect("read");

    let ctx = context(dir.path(), |c| {
        c.backup_enabled = false;
        c.property_map_mode = PropertyMapMode::ReportOnly;
    });
    let (res, _) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    assert_eq!(fs::read(root.join("body_mat.pmat")).expect("read"), before);
    assert_eq!(summary.property_maps.found, 1);
    assert_eq!(summary.property_maps.converted, 0);
    assert_eq!(summary.property_maps.failed, 0);
}

#[test]
fn report_only_mismatches_can_count_as_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    write_pmat(&root.join("body_mat.pmat"), "stale_name");

    let ctx = context(dir.path(), |c| {
        c.backup_enabled = false;
        c.property_map_mode = PropertyMapMode::ReportOnly;
        c.report_only_counts_as_failed = true;
    });
    let (res, _) = run_collect(ctx, &[root], CancelToken::new());
    let summary = res.expect("run");

    assert_eq!(summary.property_maps.failed, 1);
    let report = fs::read_to_string(summary.report_path.expect("report")).expect("read");
    assert!(report.contains("body_mat.pmat"));
}

#[test]
fn skip_mode_never_opens_property_maps() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");
    fs::write(root.join("junk.pmat"), b"junk").expect("write");

    let ctx = context(dir.path(), |c| {
        c.backup_enabled = false;
        c.property_map_mode = PropertyMapMode::Skip;
    });
    let (res, _) = run_collect(ctx, &[root], CancelToken::new());
    let summary = res.expect("run");
    assert_eq!(summary.property_maps.found, 0);
    assert_eq!(summary.failed(), 0);
}

#[test]
fn no_materials_finishes_without_touching_menus() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    fs::create_dir_all(&root).expect("mkdir");
    write_menu(&root.join("body.menu"), "body_NPRMAT_NPRToonV2_.mate");
    let before = fs::read(root.join("body.menu")).expect("read");

    let ctx = context(dir.path(), |_| {});
    let (res, events) = run_collect(ctx, &[root.clone()], CancelToken::new());
    let summary = res.expect("run");

    assert_eq!(phases(&events), [WorkPhase::Finished]);
    assert_eq!(summary.menus.found, 0);
    assert_eq!(summary.backup_dir, None);
    assert_eq!(fs::read(root.join("body.menu")).expect("read"), before);
}

#[test]
fn cancelled_run_finishes_without_converting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");

    let cancel = CancelToken::new();
    cancel.cancel();
    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, events) = run_collect(ctx, &[root.clone()], cancel);
    let summary = res.expect("run");

    assert!(summary.cancelled);
    assert_eq!(summary.materials.converted, 0);
    assert!(root.join("body_NPRMAT_NPRToonV2_.mate").exists());
    assert_eq!(phases(&events), [WorkPhase::Finished]);
}

#[test]
fn missing_root_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");

    let ctx = context(dir.path(), |c| c.backup_enabled = false);
    let (res, _) = run_collect(ctx, &[dir.path().join("nope"), root], CancelToken::new());
    assert_eq!(res.expect("run").materials.converted, 1);
}

#[test]
fn start_while_pool_is_busy_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let mate = root.join("body_NPRMAT_NPRToonV2_.mate");
    let menu = root.join("body.menu");
    write_mate(&mate, "body_mat");
    write_menu(&menu, "body_NPRMAT_NPRToonV2_.mate");
    let (mate_before, menu_before) = (fs::read(&mate).expect("read"), fs::read(&menu).expect("read"));

    let (ctx, gate) = gated_context(dir.path(), |c| c.backup_enabled = false);
    let (tx, rx) = unbounded();
    let mut manager = WorkManager::new(ctx, Reporter::new(tx), CancelToken::new());
    manager.start(vec![root.clone()]);
    gate.entered.recv_timeout(WAIT).expect("worker parked");
    assert_eq!(manager.phase(), WorkPhase::Materials);
    assert!(manager.is_busy());

    manager.start(vec![root.clone()]);
    let events: Vec<WorkEvent> = rx.try_iter().collect();
    assert!(events.iter().any(|ev| matches!(ev, WorkEvent::Log { level: LogLevel::Error, .. })));
    assert!(events.contains(&WorkEvent::Phase(WorkPhase::Finished)));
    assert_eq!(fs::read(&mate).expect("read"), mate_before);
    assert_eq!(fs::read(&menu).expect("read"), menu_before);

    drop(gate.release);
    assert!(matches!(manager.into_result(), Err(WorkError::Guard(_))));
    // The refused start never reached the menu phase.
    assert_eq!(fs::read(&menu).expect("read"), menu_before);
}

#[test]
fn stop_mid_phase_keeps_finished_items_and_skips_the_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let originals: Vec<PathBuf> =
        ["a", "b", "c"].iter().map(|n| root.join(format!("{n}_NPRMAT_NPRToonV2_.mate"))).collect();
    for (path, name) in originals.iter().zip(["a_mat", "b_mat", "c_mat"]) {
        write_mate(path, name);
    }
    let before: Vec<Vec<u8>> = originals.iter().map(|p| fs::read(p).expect("read")).collect();

    let (ctx, gate) = gated_context(dir.path(), |_| {});
    let (tx, rx) = unbounded();
    let mut manager = WorkManager::new(ctx, Reporter::new(tx), CancelToken::new());
    manager.start(vec![root.clone()]);

    // First item converts; the second is in flight when stop arrives.
    gate.entered.recv_timeout(WAIT).expect("first item");
    gate.release.send(()).expect("release first");
    gate.entered.recv_timeout(WAIT).expect("second item");
    manager.stop();
    gate.release.send(()).expect("release second");

    let events = drive(&mut manager, &rx);
    let summary = manager.into_result().expect("run");

    assert!(summary.cancelled);
    assert_eq!(summary.materials.found, 3);
    assert_eq!(summary.materials.converted, 2);
    assert_eq!(summary.menus, Default::default());
    assert!(gate.entered.try_recv().is_err(), "a third item started after stop");
    assert_eq!(phases(&events), [WorkPhase::Finished]);

    let untouched = originals.iter().zip(&before).filter(|(p, b)| fs::read(p).ok().as_ref() == Some(*b)).count();
    assert_eq!(untouched, 1);
    let converted = fs::read_dir(&root)
        .expect("read dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with("_toon.mate"))
        .count();
    assert_eq!(converted, 2);

    // Every original was archived before the pool started, and the list of
    // new files names both conversions.
    let backup_dir = summary.backup_dir.expect("backup dir");
    let entries = zip_entries(&backup_dir.join("mods.zip"));
    for name in ["a", "b", "c"] {
        assert!(entries.contains(&format!("mods/{name}_NPRMAT_NPRToonV2_.mate")), "{entries:?}");
    }
    let listed = fs::read_to_string(backup_dir.join("new_file_list.txt")).expect("new file list");
    assert_eq!(listed.lines().count(), 2);
}

#[test]
fn kill_detaches_a_pool_that_does_not_drain() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    write_mate(&root.join("body_NPRMAT_NPRToonV2_.mate"), "body_mat");

    let (ctx, gate) = gated_context(dir.path(), |c| c.backup_enabled = false);
    let (tx, rx) = unbounded();
    let mut manager = WorkManager::new(ctx, Reporter::new(tx), CancelToken::new());
    manager.start(vec![root.clone()]);
    gate.entered.recv_timeout(WAIT).expect("worker parked");

    assert!(!manager.kill(Duration::from_millis(50)));

    // The detached driver still finishes its item and requests Finished.
    drop(gate.release);
    let phase = loop {
        if let WorkEvent::Phase(p) = rx.recv_timeout(WAIT).expect("event") {
            break p;
        }
    };
    assert_eq!(phase, WorkPhase::Finished);
    manager.into_result().expect("no fatal error");
}
