//! A reader polling the output directory never observes a partial file.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use camino::Utf8Path;
use color_eyre::eyre::Result;
use lightcurve_acquire::test_support::{ScriptedResolver, Step};
use lightcurve_acquire::{Acquirer, ArtifactId, CommitLock, FetchOutcome, SharedResolver};

const PAYLOAD_LEN: usize = 8 * 1024 * 1024;

#[test]
fn final_path_only_ever_holds_the_complete_payload() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let dest = Utf8Path::from_path(temp.path()).expect("utf8 tempdir");
    let id = ArtifactId::new(4242).expect("valid id");
    let mut payload = b"SIMPLE  =                    T".to_vec();
    payload.resize(PAYLOAD_LEN, b' ');
    let resolver: SharedResolver = Arc::new(
        ScriptedResolver::new().script(id, vec![Step::Payload(payload.clone())]),
    );
    let acquirer = Acquirer::new(resolver, CommitLock::new());
    let target = acquirer.target_path(id, dest);
    let done = AtomicBool::new(false);

    let (outcome, observations) = thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut observations = Vec::new();
            loop {
                let finished = done.load(Ordering::SeqCst);
                if let Ok(meta) = fs::metadata(&target) {
                    observations.push(meta.len());
                }
                if finished {
                    return observations;
                }
                thread::yield_now();
            }
        });
        let outcome = acquirer.acquire(id, dest, true);
        done.store(true, Ordering::SeqCst);
        (outcome, reader.join().expect("reader thread"))
    });

    assert!(matches!(outcome, FetchOutcome::Success { .. }));
    assert!(!observations.is_empty(), "reader never saw the committed file");
    let expected = u64::try_from(PAYLOAD_LEN)?;
    assert!(
        observations.iter().all(|len| *len == expected),
        "observed partial sizes: {:?}",
        observations.iter().filter(|len| **len != expected).collect::<Vec<_>>()
    );
    assert_eq!(fs::read(&target)?, payload);
    Ok(())
}

#[test]
fn concurrent_commits_of_distinct_ids_are_all_complete() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let dest = Utf8Path::from_path(temp.path()).expect("utf8 tempdir");
    let resolver: SharedResolver = Arc::new(ScriptedResolver::new());
    let acquirer = Acquirer::new(resolver, CommitLock::new());
    let ids: Vec<_> = (1..=16)
        .map(|raw| ArtifactId::new(raw).expect("valid id"))
        .collect();

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let worker = acquirer.clone();
                scope.spawn(move || worker.acquire(*id, dest, true))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread"))
            .collect()
    });

    assert!(
        outcomes
            .iter()
            .all(|outcome| matches!(outcome, FetchOutcome::Success { .. }))
    );
    let leftovers: Vec<_> = fs::read_dir(dest)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
    Ok(())
}
