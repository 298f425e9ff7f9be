//! Tests for the batch orchestrator.

use super::*;
use crate::acquire::CommitLock;
use crate::resolver::SharedResolver;
use crate::test_support::{ScriptedResolver, Step, capture_logs};
use rstest::{fixture, rstest};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tracing::Level;

struct Workspace {
    _temp: TempDir,
    out: Utf8PathBuf,
}

#[fixture]
fn workspace() -> Workspace {
    let temp = tempdir().expect("tempdir");
    let out = Utf8Path::from_path(temp.path())
        .expect("utf8 path")
        .join("lightcurves");
    Workspace { _temp: temp, out }
}

fn id(raw: u64) -> ArtifactId {
    ArtifactId::new(raw).expect("valid id")
}

fn ids(raw: impl IntoIterator<Item = u64>) -> Vec<ArtifactId> {
    raw.into_iter().map(id).collect()
}

fn workers(count: usize) -> NonZeroUsize {
    NonZeroUsize::new(count).expect("non-zero")
}

fn orchestrator(resolver: &Arc<ScriptedResolver>) -> BatchOrchestrator {
    let shared: SharedResolver = Arc::clone(resolver) as SharedResolver;
    BatchOrchestrator::new(Acquirer::new(shared, CommitLock::new()))
}

#[rstest]
fn mixed_batch_reports_success_and_not_found(workspace: Workspace) {
    let resolver = Arc::new(ScriptedResolver::new().script(id(102), vec![Step::NoCandidates]));
    let options = BatchOptions::new(workspace.out.clone()).with_workers(workers(2));

    let report = orchestrator(&resolver)
        .run(&ids([101, 102, 103]), &options)
        .expect("batch runs");

    assert_eq!(
        report.stats,
        BatchStats {
            success: 2,
            skipped: 0,
            failed: 1,
            errors: vec![(id(102), "No light curve found".to_owned())],
        }
    );
    assert!(workspace.out.join("101.fits").is_file());
    assert!(workspace.out.join("103.fits").is_file());
    assert!(!workspace.out.join("102.fits").exists());
}

#[rstest]
fn existing_files_are_counted_as_skipped(workspace: Workspace) {
    fs::create_dir_all(&workspace.out).expect("create out");
    fs::write(workspace.out.join("1.fits"), "SIMPLE").expect("seed");
    fs::write(workspace.out.join("2.fits"), "SIMPLE").expect("seed");
    let resolver = Arc::new(ScriptedResolver::new());
    let options = BatchOptions::new(workspace.out.clone());

    let report = orchestrator(&resolver)
        .run(&ids(1..=4), &options)
        .expect("batch runs");

    assert_eq!(report.stats.skipped, 2);
    assert_eq!(report.stats.success, 2);
    assert_eq!(resolver.searches(), 2);
}

#[rstest]
fn disabling_skip_refetches_everything(workspace: Workspace) {
    fs::create_dir_all(&workspace.out).expect("create out");
    fs::write(workspace.out.join("1.fits"), "stale").expect("seed");
    let resolver = Arc::new(ScriptedResolver::new());
    let options = BatchOptions::new(workspace.out.clone()).with_skip_existing(false);

    let report = orchestrator(&resolver)
        .run(&ids(1..=2), &options)
        .expect("batch runs");

    assert_eq!(report.stats.success, 2);
    assert_eq!(report.stats.skipped, 0);
    assert_eq!(resolver.searches(), 2);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(8)]
fn concurrency_never_exceeds_worker_count(workspace: Workspace, #[case] count: usize) {
    let resolver = Arc::new(ScriptedResolver::new().with_latency(Duration::from_millis(15)));
    let options = BatchOptions::new(workspace.out.clone()).with_workers(workers(count));

    let report = orchestrator(&resolver)
        .run(&ids(1..=24), &options)
        .expect("batch runs");

    assert_eq!(report.stats.success, 24);
    assert!(
        resolver.peak_concurrency() <= count,
        "peak {} exceeded {count} workers",
        resolver.peak_concurrency()
    );
    if count > 1 {
        assert!(
            resolver.peak_concurrency() > 1,
            "downloads never overlapped with {count} workers"
        );
    }
}

#[rstest]
fn outcome_counts_always_sum_to_input_length(workspace: Workspace) {
    let resolver = Arc::new(
        ScriptedResolver::new()
            .script(id(3), vec![Step::NoCandidates])
            .script(id(5), vec![Step::SearchError(crate::error::FetchError::other("denied"))])
            .script(
                id(8),
                vec![Step::DownloadError(crate::error::FetchError::transient("corrupt"))],
            ),
    );
    let input = ids(1..=12);
    let options = BatchOptions::new(workspace.out.clone()).with_workers(workers(4));

    let report = orchestrator(&resolver)
        .run(&input, &options)
        .expect("batch runs");

    assert_eq!(report.stats.total(), input.len());
    assert_eq!(report.stats.failed, 3);
    let failed: Vec<_> = report.stats.errors.iter().map(|(id, _)| id.get()).collect();
    assert_eq!(failed, [3, 5, 8]);
}

#[rstest]
fn empty_input_completes_without_work(workspace: Workspace) {
    let resolver = Arc::new(ScriptedResolver::new());
    let options = BatchOptions::new(workspace.out.clone());

    let report = orchestrator(&resolver)
        .run(&[], &options)
        .expect("batch runs");

    assert_eq!(report.stats, BatchStats::default());
    assert_eq!(resolver.searches(), 0);
    assert!(workspace.out.is_dir());
}

#[rstest]
fn failures_are_logged_as_warnings(workspace: Workspace) {
    let resolver = Arc::new(ScriptedResolver::new().script(id(102), vec![Step::NoCandidates]));
    let options = BatchOptions::new(workspace.out.clone()).with_workers(workers(1));

    let (logs, report) = capture_logs(Level::INFO, || {
        orchestrator(&resolver).run(&ids([101, 102]), &options)
    });

    assert!(report.is_ok());
    let warned = logs.iter().any(|line| {
        line.contains("WARN") && line.contains("102") && line.contains("No light curve found")
    });
    assert!(warned, "missing failure warning: {logs:?}");
    assert!(
        logs.iter().any(|line| line.contains("progress") && line.contains("percent=100")),
        "missing progress: {logs:?}"
    );
}

#[rstest]
fn unwritable_destination_is_a_batch_error(workspace: Workspace) {
    let parent = workspace.out.parent().expect("parent").to_path_buf();
    let blocker = parent.join("blocker");
    fs::write(&blocker, "file").expect("seed");
    let resolver = Arc::new(ScriptedResolver::new());
    let options = BatchOptions::new(blocker.join("out"));

    let result = orchestrator(&resolver).run(&ids([1]), &options);

    assert!(result.is_err());
    assert_eq!(resolver.searches(), 0);
}
