mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use dslogs_logs::{Pipeline, PipelineError};

use config::{FileConfig, Overrides, Settings};

/// Filter consensus events out of dsTest node logs, per scheduler run and per node
#[derive(Parser, Debug)]
#[command(name = "dslogs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Experiment directory (e.g. output/aptos/20260217_120010)
    #[arg(value_name = "RUN_ID_DIR")]
    root: PathBuf,

    /// Comma-separated levels to keep (e.g. INFO,DEBUG); keeps all if unset
    #[arg(long)]
    levels: Option<String>,

    /// Folder created inside each scheduler run directory [default: filtered]
    #[arg(long)]
    out_subdir: Option<String>,

    /// Test name hint for run directory discovery
    #[arg(long, env = "TEST_NAME")]
    test_name: Option<String>,

    /// Scheduler type hint for run directory discovery
    #[arg(long, env = "SCHED_TYPE")]
    sched_type: Option<String>,

    /// Run directories to process at once [default: 1]
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// TOML file with default settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug detail (skipped files, discovery decisions)
    #[arg(long, short)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            levels: self.levels.clone(),
            out_subdir: self.out_subdir.clone(),
            test_name: self.test_name.clone(),
            sched_type: self.sched_type.clone(),
            jobs: self.jobs,
        }
    }
}

/// Exit status when the root is missing or not a directory
const EXIT_BAD_ROOT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(args).await
}

/// Run and map the outcome to the process exit status
async fn run(args: Args) -> ExitCode {
    match execute(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(args: Args) -> Result<ExitCode> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = args.overrides();
    let settings = Settings::resolve(args.root, overrides, file)?;

    let pipeline = Arc::new(Pipeline::new(settings.pipeline).context("failed to build parser")?);
    let report = match pipeline
        .process_concurrent(settings.root.clone(), settings.jobs)
        .await
    {
        Ok(report) => report,
        Err(PipelineError::NotADirectory(path)) => {
            tracing::error!(path = %path.display(), "not a directory");
            return Ok(ExitCode::from(EXIT_BAD_ROOT));
        }
        Err(e) => return Err(e).context("failed to process logs"),
    };

    let total = report.total();
    tracing::info!(
        runs = report.runs.len(),
        scanned = total.scanned,
        kept = total.kept,
        "TOTAL"
    );

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} run directories could not be written", report.runs.len());
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::fs;
    use std::path::Path;

    const LINE: &str =
        "2026-02-17T11:09:41.177185Z [consensus-0] INFO consensus/src/lib.rs:1 NewRound 1\n";

    fn args(root: &Path) -> Args {
        Args::try_parse_from([OsStr::new("dslogs"), root.as_os_str()]).unwrap()
    }

    #[tokio::test]
    async fn test_success_exits_zero() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = root.path().join("run_0");
        fs::create_dir_all(&run_dir).unwrap();
        fs::write(run_dir.join("stdout_0.log"), LINE).unwrap();

        assert_eq!(run(args(root.path())).await, ExitCode::SUCCESS);
        assert!(run_dir.join("filtered").join("node0.log").exists());
    }

    #[tokio::test]
    async fn test_no_run_directories_exits_zero() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(run(args(root.path())).await, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_bad_root_exits_two() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not_a_dir");
        fs::write(&file, "").unwrap();

        assert_eq!(run(args(&file)).await, ExitCode::from(EXIT_BAD_ROOT));
        assert_eq!(run(args(&root.path().join("missing"))).await, ExitCode::from(2));
    }

    #[tokio::test]
    async fn test_sink_failure_exits_one() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = root.path().join("run_0");
        fs::create_dir_all(&run_dir).unwrap();
        fs::write(run_dir.join("stdout_0.log"), LINE).unwrap();
        // A file where the output directory belongs
        fs::write(run_dir.join("filtered"), "").unwrap();

        assert_eq!(run(args(root.path())).await, ExitCode::FAILURE);
    }

    #[test]
    fn test_verbose_and_jobs_flags() {
        let parsed = Args::try_parse_from(["dslogs", "out", "-v", "-j", "3"]).unwrap();
        assert!(parsed.verbose);
        assert_eq!(parsed.jobs, Some(3));
        assert_eq!(parsed.root, PathBuf::from("out"));
    }
}
