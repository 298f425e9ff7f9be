//! Command-line driver for batch acquisition.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use color_eyre::eyre::{Context, eyre};
use std::fs;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::AcquireEnvCfg;
use crate::acquire::{Acquirer, CommitLock};
use crate::batch::{BatchOptions, BatchOrchestrator, BatchReport, DEFAULT_WORKERS};
use crate::error::{BatchError, BatchResult, ConfigError, Result};
use crate::input::{DEFAULT_ID_COLUMN, read_ids};
use crate::observability::{APP_TARGET, init_tracing};
use crate::resolver::{MastResolver, SharedResolver};

/// File receiving one `ID: reason` line per failure.
pub const DEFAULT_ERROR_LOG: &str = "download_errors.txt";

/// Downloads light curves for every target listed in a catalogue table.
#[derive(Debug, Clone, Parser)]
#[command(name = "lightcurve_acquire", version)]
#[command(about = "Fetch Kepler light curves for a table of target IDs")]
pub struct Cli {
    /// Catalogue table listing the target IDs.
    #[arg(short, long, default_value = "dataset/koi.csv")]
    pub input: Utf8PathBuf,
    /// Directory receiving the light curve files.
    #[arg(short, long, default_value = "lightcurves")]
    pub output: Utf8PathBuf,
    /// Number of concurrent downloads.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: NonZeroUsize,
    /// Only process the first N targets.
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Fetch again even when the file already exists.
    #[arg(long)]
    pub no_skip: bool,
    /// Report what would be done without downloading anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Name of the ID column in the input table.
    #[arg(long, default_value = DEFAULT_ID_COLUMN)]
    pub column: String,
    /// File receiving failure details when any target fails.
    #[arg(long, default_value = DEFAULT_ERROR_LOG)]
    pub error_log: Utf8PathBuf,
    /// Also write the run summary as JSON to this path.
    #[arg(long)]
    pub report: Option<Utf8PathBuf>,
    /// Also append log output to this file.
    #[arg(long)]
    pub log_file: Option<Utf8PathBuf>,
    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing was fetched.
    DryRun {
        /// Targets that would have been processed.
        planned: usize,
    },
    /// The batch ran to completion.
    Completed(BatchReport),
}

/// Entry point of the `lightcurve_acquire` binary.
///
/// Parses the command line, loads [`AcquireEnvCfg`] from the environment
/// and runs [`execute`] against the public archive.
///
/// # Errors
/// Returns an error when configuration, the input table or the output
/// directory is unusable. Individual download failures are not errors.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_file.as_deref())
        .map_err(|err| BatchError::from(eyre!(err).wrap_err("failed to open log file")))?;
    if let Err(err) = color_eyre::install() {
        debug!(target: APP_TARGET, "color_eyre already installed: {err}");
    }

    let cfg = AcquireEnvCfg::load()
        .context("failed to load configuration via OrthoConfig")
        .map_err(ConfigError::from)?;
    let resolver: SharedResolver = Arc::new(MastResolver::new(cfg.resolver_config())?);
    execute(&cli, &cfg, resolver)?;
    Ok(())
}

/// Runs one acquisition pass described by `cli` and `cfg` using `resolver`.
///
/// A dry run reads the input table and logs the plan without touching the
/// output directory or `resolver`. Otherwise the batch runs, a summary is
/// logged, the error log is written when anything failed and the JSON
/// report is written when requested.
///
/// # Errors
/// Returns an error when the input table cannot be read, the retry budget
/// is invalid, or the output directory, error log or report cannot be
/// written.
pub fn execute(cli: &Cli, cfg: &AcquireEnvCfg, resolver: SharedResolver) -> Result<RunOutcome> {
    let mut ids = read_ids(&cli.input, &cli.column)?;
    if let Some(limit) = cli.limit {
        ids.truncate(limit);
    }

    if cli.dry_run {
        info!(
            target: APP_TARGET,
            workers = cli.workers.get(),
            output = %cli.output,
            count = ids.len(),
            "dry run: nothing will be downloaded"
        );
        return Ok(RunOutcome::DryRun { planned: ids.len() });
    }

    let acquirer = Acquirer::new(resolver, CommitLock::new())
        .with_policy(cfg.retry_policy()?)
        .with_extension(cfg.extension());
    let options = BatchOptions::new(cli.output.clone())
        .with_workers(cli.workers)
        .with_skip_existing(!cli.no_skip);
    let report = BatchOrchestrator::new(acquirer).run(&ids, &options)?;

    log_summary(&report);
    if report.stats.failed > 0 {
        write_error_log(&cli.error_log, &report)?;
    }
    if let Some(ref path) = cli.report {
        write_report(path, &report)?;
    }
    Ok(RunOutcome::Completed(report))
}

fn log_summary(report: &BatchReport) {
    let stats = &report.stats;
    info!(
        target: APP_TARGET,
        total = stats.total(),
        success = stats.success,
        skipped = stats.skipped,
        failed = stats.failed,
        elapsed_secs = report.elapsed.as_secs_f64(),
        rate_per_sec = report.rate.unwrap_or_default(),
        "download summary"
    );
}

fn write_error_log(path: &Utf8Path, report: &BatchReport) -> BatchResult<()> {
    let mut contents = report.error_lines().join("\n");
    contents.push('\n');
    fs::write(path, contents).with_context(|| format!("failed to write error log {path}"))?;
    info!(
        target: APP_TARGET,
        path = %path,
        failures = report.stats.failed,
        "wrote error log"
    );
    Ok(())
}

fn write_report(path: &Utf8Path, report: &BatchReport) -> BatchResult<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialise report")?;
    fs::write(path, json).with_context(|| format!("failed to write report {path}"))?;
    debug!(target: APP_TARGET, path = %path, "wrote JSON report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_the_documented_cli() {
        let cli = Cli::try_parse_from(["lightcurve_acquire"]).expect("defaults parse");
        assert_eq!(cli.input, "dataset/koi.csv");
        assert_eq!(cli.output, "lightcurves");
        assert_eq!(cli.workers.get(), 10);
        assert_eq!(cli.limit, None);
        assert!(!cli.no_skip);
        assert!(!cli.dry_run);
        assert_eq!(cli.column, "kepid");
        assert_eq!(cli.error_log, DEFAULT_ERROR_LOG);
        assert!(cli.report.is_none());
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn short_flags_are_accepted() {
        let cli = Cli::try_parse_from([
            "lightcurve_acquire",
            "-i",
            "ids.csv",
            "-o",
            "out",
            "-w",
            "3",
            "-l",
            "5",
            "--no-skip",
            "--dry-run",
            "--log-file",
            "download_log.txt",
        ])
        .expect("flags parse");
        assert_eq!(cli.input, "ids.csv");
        assert_eq!(cli.output, "out");
        assert_eq!(cli.workers.get(), 3);
        assert_eq!(cli.limit, Some(5));
        assert!(cli.no_skip);
        assert!(cli.dry_run);
        assert_eq!(cli.log_file.as_deref(), Some(Utf8Path::new("download_log.txt")));
    }

    #[rstest]
    #[case("0")]
    #[case("-2")]
    #[case("many")]
    fn worker_count_must_be_positive(#[case] workers: &str) {
        let parsed = Cli::try_parse_from(["lightcurve_acquire", "--workers", workers]);
        assert!(parsed.is_err());
    }
}
