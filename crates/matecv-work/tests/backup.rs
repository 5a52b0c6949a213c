// crates/matecv-work/tests/backup.rs

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use matecv_work::thread::{BackupSession, BackupWriter};
use matecv_work::{BackupFailurePolicy, CancelToken, WorkError};

#[test]
fn same_named_roots_get_distinct_archives() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = dir.path().join("x/mods");
    let b = dir.path().join("y/mods");
    let session = BackupSession::create(&dir.path().join("backup"), &[a.clone(), b.clone()]).expect("session");

    let aa = session.archive_for(&a).expect("archive a");
    let ba = session.archive_for(&b).expect("archive b");
    assert_eq!(aa.file_name().and_then(|n| n.to_str()), Some("mods.zip"));
    assert_eq!(ba.file_name().and_then(|n| n.to_str()), Some("mods_1.zip"));
    assert!(session.dir().starts_with(dir.path().join("backup")));
}

#[test]
fn stop_drains_every_queued_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let session = BackupSession::create(&dir.path().join("backup"), &[root.clone()]).expect("session");
    let archive = session.archive_for(&root).expect("archive").to_path_buf();

    let writer = BackupWriter::start(session, BackupFailurePolicy::Isolate, CancelToken::new()).expect("writer");
    for i in 0..100 {
        writer.add_backup(&root, &root.join(format!("m/{i}.menu")), format!("data {i}").into_bytes());
    }
    writer.stop_and_wait().expect("drained");
    assert!(writer.is_finished());

    let mut zip = zip::ZipArchive::new(fs::File::open(&archive).expect("open")).expect("zip");
    assert_eq!(zip.len(), 100);
    let mut body = String::new();
    zip.by_name("mods/m/42.menu").expect("entry").read_to_string(&mut body).expect("read");
    assert_eq!(body, "data 42");
}

#[test]
fn appends_to_archive_from_an_earlier_phase() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let session = BackupSession::create(&dir.path().join("backup"), &[root.clone()]).expect("session");
    let archive = session.archive_for(&root).expect("archive").to_path_buf();

    for name in ["first.menu", "second.pmat"] {
        let writer = BackupWriter::start(session.clone(), BackupFailurePolicy::Isolate, CancelToken::new()).expect("writer");
        writer.add_backup(&root, &root.join(name), b"x".to_vec());
        writer.stop_and_wait().expect("drained");
    }

    let zip = zip::ZipArchive::new(fs::File::open(&archive).expect("open")).expect("zip");
    let mut names: Vec<&str> = zip.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, ["mods/first.menu", "mods/second.pmat"]);
}

#[test]
fn isolate_policy_keeps_the_run_alive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let session = BackupSession::create(&dir.path().join("backup"), &[root.clone()]).expect("session");
    // A directory where the archive should go makes every open fail.
    fs::create_dir_all(session.archive_for(&root).expect("archive")).expect("mkdir");

    let cancel = CancelToken::new();
    let writer = BackupWriter::start(session, BackupFailurePolicy::Isolate, cancel.clone()).expect("writer");
    writer.add_backup(&root, &root.join("a.menu"), b"a".to_vec());
    assert!(writer.stop_and_wait().is_ok());
    assert!(!cancel.is_cancelled());
}

#[test]
fn abort_policy_cancels_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let session = BackupSession::create(&dir.path().join("backup"), &[root.clone()]).expect("session");
    fs::create_dir_all(session.archive_for(&root).expect("archive")).expect("mkdir");

    let cancel = CancelToken::new();
    let writer = BackupWriter::start(session, BackupFailurePolicy::Abort, cancel.clone()).expect("writer");
    writer.add_backup(&root, &root.join("a.menu"), b"a".to_vec());
    assert!(matches!(writer.stop_and_wait(), Err(WorkError::Backup(_))));
    assert!(cancel.is_cancelled());
}

#[test]
fn new_file_list_appends() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = BackupSession::create(&dir.path().join("backup"), &[]).expect("session");
    session.append_new_files(&[PathBuf::from("a/b.mate")]).expect("append");
    session.append_new_files(&[PathBuf::from("c/d.pmat")]).expect("append");
    let text = fs::read_to_string(session.dir().join("new_file_list.txt")).expect("read");
    assert_eq!(text, "a/b.mate\nc/d.pmat\n");
}

#[test]
fn kill_abandons_the_queue_and_closes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("mods");
    let session = BackupSession::create(&dir.path().join("backup"), &[root.clone()]).expect("session");
    let archive = session.archive_for(&root).expect("archive").to_path_buf();

    let writer = BackupWriter::start(session, BackupFailurePolicy::Isolate, CancelToken::new()).expect("writer");
    writer.kill();
    writer.stop_and_wait().expect("closed");
    assert!(writer.is_finished());

    // The drain loop is gone; later entries are dropped, not written.
    writer.add_backup(&root, &root.join("late.menu"), b"late".to_vec());
    if archive.exists() {
        let zip = zip::ZipArchive::new(fs::File::open(&archive).expect("open")).expect("zip");
        assert!(zip.file_names().all(|n| n != "mods/late.menu"));
    }
}
