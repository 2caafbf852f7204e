//! End-to-end tests scanning a source folder and transferring files into series folders.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use media_sorter::organize::{
    CallbackSink, ExtensionPolicy, FileEntry, FileList, NamingConvention, ProgressSink, TransferEngine,
    TransferMode,
};
use tempfile::{TempDir, tempdir};

#[derive(Debug, Default)]
struct RecordingSink {
    progress: Vec<(usize, usize)>,
    errors: Vec<String>,
}

impl ProgressSink for RecordingSink {
    fn advance(&mut self, completed: usize, total: usize) {
        self.progress.push((completed, total));
    }

    fn report_error(&mut self, file_name: &str, _detail: &str) {
        self.errors.push(file_name.to_string());
    }
}

fn source_with_files(names: &[&str]) -> TempDir {
    let dir = tempdir().expect("should create temp dir");
    for name in names {
        fs::write(dir.path().join(name), name).expect("should write file");
    }
    dir
}

fn scanned_list(source: &Path, destination: &Path) -> FileList {
    let mut list = FileList::new(
        source.to_path_buf(),
        destination.to_path_buf(),
        NamingConvention::default(),
        ExtensionPolicy::default(),
    );
    list.scan().expect("should scan source");
    list
}

#[test]
fn episodes_are_moved_into_series_folders() {
    let source = source_with_files(&[
        "Breaking Bad S01E01.mkv",
        "Breaking Bad S01E02.mkv",
        "The Wire s02e05.mp4",
        "random_movie.mp4",
        "Breaking Bad S01E01.srt",
    ]);
    let destination = tempdir().expect("should create temp dir");
    let list = scanned_list(source.path(), destination.path());

    let mut sink = RecordingSink::default();
    let report = TransferEngine::new(source.path().to_path_buf(), TransferMode::Move).run(list.entries(), &mut sink);

    assert_eq!(report.total, 4);
    assert!(report.is_complete());
    assert_eq!(sink.progress, [(1, 4), (2, 4), (3, 4), (4, 4)]);

    let root = destination.path();
    assert!(root.join("Breaking Bad").join("Breaking Bad S01E01.mkv").exists());
    assert!(root.join("Breaking Bad").join("Breaking Bad S01E02.mkv").exists());
    assert!(root.join("The Wire").join("The Wire s02e05.mp4").exists());
    assert!(root.join("random_movie.mp4").exists());

    // Subtitle is not a default extension so it stays behind
    assert!(source.path().join("Breaking Bad S01E01.srt").exists());
    assert!(!root.join("Breaking Bad").join("Breaking Bad S01E01.srt").exists());

    let remaining = scanned_list(source.path(), destination.path());
    assert_eq!(remaining.len(), 1);
}

#[test]
fn copy_leaves_sources_in_place() {
    let source = source_with_files(&["Dark S01E01.mkv"]);
    let destination = tempdir().expect("should create temp dir");
    let list = scanned_list(source.path(), destination.path());

    let mut sink = RecordingSink::default();
    let report = TransferEngine::new(source.path().to_path_buf(), TransferMode::Copy).run(list.entries(), &mut sink);

    assert!(report.is_complete());
    assert!(source.path().join("Dark S01E01.mkv").exists());
    assert!(destination.path().join("Dark").join("Dark S01E01.mkv").exists());
}

#[test]
fn failed_directory_creation_only_affects_that_file() {
    let source = source_with_files(&["one.mkv", "two.mkv", "three.mkv"]);
    let destination = tempdir().expect("should create temp dir");

    // A regular file where a directory is needed makes directory creation fail
    let blocker = destination.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("should write blocker");

    let entries = vec![
        FileEntry::new("one.mkv", destination.path().join("First"), true),
        FileEntry::new("two.mkv", blocker.join("Second"), true),
        FileEntry::new("three.mkv", destination.path().join("Third"), true),
    ];

    let mut sink = RecordingSink::default();
    let report = TransferEngine::new(source.path().to_path_buf(), TransferMode::Copy).run(&entries, &mut sink);

    assert_eq!(sink.errors, ["two.mkv"]);
    assert_eq!(sink.progress, [(1, 3), (2, 3)]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(destination.path().join("First").join("one.mkv").exists());
    assert!(destination.path().join("Third").join("three.mkv").exists());

    let failures: Vec<&str> = report.failures().map(|(name, _)| name).collect();
    assert_eq!(failures, ["two.mkv"]);
}

#[test]
fn rerun_overwrites_existing_destination() {
    let source = source_with_files(&["Lost S01E01.mkv"]);
    let destination = tempdir().expect("should create temp dir");
    let list = scanned_list(source.path(), destination.path());
    let engine = TransferEngine::new(source.path().to_path_buf(), TransferMode::Copy);

    let mut sink = RecordingSink::default();
    assert!(engine.run(list.entries(), &mut sink).is_complete());

    fs::write(source.path().join("Lost S01E01.mkv"), "updated").expect("should update source");
    let report = engine.run(list.entries(), &mut sink);

    assert!(report.is_complete());
    assert!(sink.errors.is_empty());
    assert_eq!(
        fs::read_to_string(destination.path().join("Lost").join("Lost S01E01.mkv")).expect("should read copy"),
        "updated"
    );
}

#[test]
fn excluded_entries_produce_no_callbacks() {
    let source = source_with_files(&["Dark S01E01.mkv", "notes.txt"]);
    let destination = tempdir().expect("should create temp dir");
    let mut list = scanned_list(source.path(), destination.path());
    list.set_include_matching("dark", false);

    let calls = Cell::new(0);
    let mut sink = CallbackSink::new(|_, _| calls.set(calls.get() + 1), |_, _| calls.set(calls.get() + 1));
    let report = TransferEngine::new(source.path().to_path_buf(), TransferMode::Move).run(list.entries(), &mut sink);

    assert_eq!(report.total, 0);
    assert!(report.results.is_empty());
    assert_eq!(calls.get(), 0);
    assert!(source.path().join("Dark S01E01.mkv").exists());
}

#[test]
fn destination_change_before_run_is_respected() {
    let source = source_with_files(&["Fargo S02E05.mkv"]);
    let first = tempdir().expect("should create temp dir");
    let second = tempdir().expect("should create temp dir");
    let mut list = scanned_list(source.path(), first.path());

    list.set_destination_root(second.path().to_path_buf());

    let mut sink = RecordingSink::default();
    let report = TransferEngine::new(source.path().to_path_buf(), TransferMode::Move).run(list.entries(), &mut sink);

    assert!(report.is_complete());
    assert!(second.path().join("Fargo").join("Fargo S02E05.mkv").exists());
    assert!(!first.path().join("Fargo").exists());
}

#[test]
fn spawned_run_uses_snapshot() {
    let source = source_with_files(&["Dark S01E01.mkv", "Dark S01E02.mkv"]);
    let destination = tempdir().expect("should create temp dir");
    let mut list = scanned_list(source.path(), destination.path());

    let snapshot = list.snapshot();
    let handle = TransferEngine::new(source.path().to_path_buf(), TransferMode::Copy)
        .spawn(snapshot, RecordingSink::default())
        .expect("should start worker");

    // Changes to the live list after the start are not seen by the run
    list.set_destination_root(PathBuf::from("/elsewhere"));
    list.set_include(0, false);

    let report = handle.join().expect("worker should not panic");
    assert_eq!(report.total, 2);
    assert!(report.is_complete());
    assert!(destination.path().join("Dark").join("Dark S01E01.mkv").exists());
    assert!(destination.path().join("Dark").join("Dark S01E02.mkv").exists());
}
