//! Failure modes of the analysis phase, driven from hand-written
//! repositories.

use d2::{AnalysisError, Repository, SyncSkeleton};
use std::fs;
use tempfile::TempDir;

fn repository_with(files: &[(&str, &str)]) -> TempDir {
    let directory = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        fs::write(directory.path().join(name), contents).unwrap();
    }
    directory
}

fn analyze(files: &[(&str, &str)]) -> Result<SyncSkeleton, AnalysisError> {
    let directory = repository_with(files);
    let repository = Repository::open(directory.path())?;
    SyncSkeleton::from_repository(&repository)
}

#[test]
fn an_unexpected_release_carries_the_thread_and_the_lock() {
    // Thread 7 acquires lock 1 and then releases lock 2, which it never
    // acquired.
    let error = analyze(&[("7", "7;;1;;;;\n7;2;\n")]).unwrap_err();

    assert!(
        matches!(
            error,
            AnalysisError::UnexpectedRelease { thread: 7, lock: 2 }
        ),
        "unexpected error: {error:?}"
    );
}

#[test]
fn the_segmentation_stream_must_begin_with_a_start() {
    let error = analyze(&[("start_join", "1^3^2^\n0~1~2~\n")]).unwrap_err();

    assert!(matches!(
        error,
        AnalysisError::EventTypeMismatch {
            expected: "start",
            actual: "join",
        }
    ));
}

#[test]
fn a_malformed_record_fails_the_analysis() {
    let error = analyze(&[("0", "0;;1;;;;\nnot an event\n")]).unwrap_err();

    match error {
        AnalysisError::CorruptRecord { record } => assert_eq!(record, "not an event"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn a_missing_repository_is_an_io_error() {
    let directory = tempfile::tempdir().unwrap();
    let missing = directory.path().join("nowhere");

    let error = Repository::open(&missing).unwrap_err();
    assert!(matches!(error, AnalysisError::RepositoryIo { .. }));
}

#[test]
fn an_empty_repository_yields_nothing() {
    let skeleton = analyze(&[]).unwrap();

    assert_eq!(skeleton.number_of_threads(), 0);
    assert_eq!(skeleton.number_of_locks(), 0);
    assert!(skeleton.deadlocks().is_empty());
}
