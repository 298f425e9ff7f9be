//! End-to-end batch runs through the command-line driver.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use lightcurve_acquire::test_support::{ScriptedResolver, Step};
use lightcurve_acquire::{
    AcquireEnvCfg, ArtifactId, BatchStats, Cli, RunOutcome, SharedResolver, execute,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    fn write_table(&self, ids: &[u64]) -> Result<Utf8PathBuf> {
        let mut table = String::from("# exported catalogue\nkepid,kepoi_name\n");
        for (index, id) in ids.iter().enumerate() {
            table.push_str(&format!("{id},K{index:05}.01\n"));
        }
        let path = self.path("koi.csv");
        fs::write(&path, table)?;
        Ok(path)
    }

    fn cli(&self, extra: &[&str]) -> Result<Cli> {
        let mut args = vec![
            "lightcurve_acquire".to_owned(),
            "--input".to_owned(),
            self.path("koi.csv").into_string(),
            "--output".to_owned(),
            self.path("lightcurves").into_string(),
            "--error-log".to_owned(),
            self.path("download_errors.txt").into_string(),
        ];
        args.extend(extra.iter().map(|arg| (*arg).to_owned()));
        Ok(Cli::try_parse_from(args)?)
    }
}

#[fixture]
fn workspace() -> Workspace {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = Utf8Path::from_path(temp.path())
        .expect("utf8 tempdir")
        .to_path_buf();
    Workspace { _temp: temp, root }
}

fn id(raw: u64) -> ArtifactId {
    ArtifactId::new(raw).expect("valid id")
}

fn completed(outcome: RunOutcome) -> Result<BatchStats> {
    match outcome {
        RunOutcome::Completed(report) => Ok(report.stats),
        RunOutcome::DryRun { .. } => Err(eyre!("expected a completed run")),
    }
}

#[rstest]
fn failures_are_counted_and_written_to_the_error_log(workspace: Workspace) -> Result<()> {
    workspace.write_table(&[101, 102, 103])?;
    let resolver = Arc::new(ScriptedResolver::new().script(id(102), vec![Step::NoCandidates]));
    let shared: SharedResolver = Arc::clone(&resolver) as SharedResolver;
    let cli = workspace.cli(&["--workers", "2"])?;

    let stats = completed(execute(&cli, &AcquireEnvCfg::default(), shared)?)?;

    assert_eq!(
        stats,
        BatchStats {
            success: 2,
            skipped: 0,
            failed: 1,
            errors: vec![(id(102), "No light curve found".to_owned())],
        }
    );
    let log = fs::read_to_string(workspace.path("download_errors.txt"))?;
    assert_eq!(log, "102: No light curve found\n");
    Ok(())
}

#[rstest]
fn clean_run_writes_no_error_log(workspace: Workspace) -> Result<()> {
    workspace.write_table(&[1, 2, 3])?;
    let shared: SharedResolver = Arc::new(ScriptedResolver::new());
    let cli = workspace.cli(&[])?;

    let stats = completed(execute(&cli, &AcquireEnvCfg::default(), shared)?)?;

    assert_eq!(stats.success, 3);
    assert!(!workspace.path("download_errors.txt").exists());
    Ok(())
}

#[rstest]
fn second_run_skips_everything_unless_forced(workspace: Workspace) -> Result<()> {
    workspace.write_table(&[7, 8])?;
    let resolver = Arc::new(ScriptedResolver::new());
    let cfg = AcquireEnvCfg::default();

    let shared: SharedResolver = Arc::clone(&resolver) as SharedResolver;
    completed(execute(&workspace.cli(&[])?, &cfg, shared)?)?;
    let shared: SharedResolver = Arc::clone(&resolver) as SharedResolver;
    let again = completed(execute(&workspace.cli(&[])?, &cfg, shared)?)?;
    assert_eq!((again.skipped, again.success), (2, 0));
    assert_eq!(resolver.searches(), 2);

    let shared: SharedResolver = Arc::clone(&resolver) as SharedResolver;
    let forced = completed(execute(&workspace.cli(&["--no-skip"])?, &cfg, shared)?)?;
    assert_eq!((forced.skipped, forced.success), (0, 2));
    assert_eq!(resolver.searches(), 4);
    Ok(())
}

#[rstest]
fn limit_and_duplicates_bound_the_work(workspace: Workspace) -> Result<()> {
    workspace.write_table(&[5, 5, 6, 7, 6, 8])?;
    let resolver = Arc::new(ScriptedResolver::new());
    let shared: SharedResolver = Arc::clone(&resolver) as SharedResolver;
    let cli = workspace.cli(&["--limit", "3"])?;

    let stats = completed(execute(&cli, &AcquireEnvCfg::default(), shared)?)?;

    assert_eq!(stats.total(), 3);
    let mut names: Vec<_> = fs::read_dir(workspace.path("lightcurves"))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(names, ["5.fits", "6.fits", "7.fits"]);
    Ok(())
}

#[rstest]
fn json_report_carries_counts_and_errors(workspace: Workspace) -> Result<()> {
    workspace.write_table(&[11, 12])?;
    let shared: SharedResolver =
        Arc::new(ScriptedResolver::new().script(id(12), vec![Step::NoCandidates]));
    let report_path = workspace.path("report.json");
    let cli = workspace.cli(&["--report", report_path.as_str()])?;

    execute(&cli, &AcquireEnvCfg::default(), shared)?;

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    assert_eq!(report["stats"]["success"], 1);
    assert_eq!(report["stats"]["failed"], 1);
    assert_eq!(report["stats"]["errors"][0][0], 12);
    assert_eq!(report["stats"]["errors"][0][1], "No light curve found");
    assert!(report["elapsed"].is_number());
    Ok(())
}

#[rstest]
fn zero_attempt_budget_is_rejected(workspace: Workspace) -> Result<()> {
    workspace.write_table(&[1])?;
    let shared: SharedResolver = Arc::new(ScriptedResolver::new());
    let cfg = AcquireEnvCfg {
        max_attempts: Some(0),
        ..AcquireEnvCfg::default()
    };

    let result = execute(&workspace.cli(&[])?, &cfg, shared);

    assert!(result.is_err());
    assert!(!workspace.path("lightcurves").exists());
    Ok(())
}

#[rstest]
fn missing_input_table_is_an_error(workspace: Workspace) -> Result<()> {
    let shared: SharedResolver = Arc::new(ScriptedResolver::new());

    let result = execute(&workspace.cli(&[])?, &AcquireEnvCfg::default(), shared);

    let err = result.err().ok_or_else(|| eyre!("expected an error"))?;
    assert!(format!("{err:?}").contains("koi.csv"));
    Ok(())
}
