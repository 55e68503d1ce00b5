use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use dslogs_discovery::{LogFileLocator, RunDirectoryResolver, RunHints};
use dslogs_types::{Counts, LogFile, RunDirectory};

use crate::error::{PipelineError, RunError, SinkError};
use crate::filter::LevelFilter;
use crate::parser::LogParser;
use crate::writer::MultiplexedWriter;

/// Output folder created inside each run directory by default
pub const DEFAULT_OUT_SUBDIR: &str = "filtered";

/// Settings for a pipeline run
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Levels to keep (empty = all)
    pub levels: LevelFilter,

    /// Folder name created inside each run directory
    pub out_subdir: String,

    /// Naming hints for run directory discovery
    pub hints: RunHints,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            levels: LevelFilter::default(),
            out_subdir: DEFAULT_OUT_SUBDIR.to_string(),
            hints: RunHints::default(),
        }
    }
}

/// Result of processing one run directory
#[derive(Debug)]
pub struct RunOutcome {
    pub run: RunDirectory,
    pub out_dir: PathBuf,

    /// Lines scanned and records written, up to the failure if there was one
    pub counts: Counts,

    pub error: Option<RunError>,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-run outcomes, in discovery order
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub runs: Vec<RunOutcome>,
}

impl ProcessReport {
    /// Sum over all run directories, including partial counts of failed ones
    pub fn total(&self) -> Counts {
        self.runs.iter().map(|o| o.counts).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.runs.iter().filter(|o| !o.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Discovers run directories and filters every node log inside them
#[derive(Debug)]
pub struct Pipeline {
    parser: LogParser,
    levels: LevelFilter,
    out_subdir: String,
    resolver: RunDirectoryResolver,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self::with_parser(LogParser::new()?, config))
    }

    pub fn with_parser(parser: LogParser, config: PipelineConfig) -> Self {
        Self {
            parser,
            levels: config.levels,
            out_subdir: config.out_subdir,
            resolver: RunDirectoryResolver::new(config.hints),
        }
    }

    pub fn out_subdir(&self) -> &str {
        &self.out_subdir
    }

    /// Resolve the run directories under `root`.
    ///
    /// Finding none is reported but is not an error.
    pub fn discover(&self, root: &Path) -> Result<Vec<RunDirectory>, PipelineError> {
        if !root.is_dir() {
            return Err(PipelineError::NotADirectory(root.to_path_buf()));
        }

        let runs = self
            .resolver
            .resolve(root)
            .map_err(|source| PipelineError::Discovery {
                path: root.to_path_buf(),
                source,
            })?;

        if runs.is_empty() {
            match self.resolver.hints().prefix() {
                Some(prefix) => tracing::warn!(
                    root = %root.display(),
                    %prefix,
                    "no run directories match the prefix, and autodetection found none either"
                ),
                None => tracing::warn!(root = %root.display(), "no scheduler run directories found"),
            }
        }

        Ok(runs)
    }

    /// Process every run directory under `root`, one after another.
    ///
    /// A failing run directory is recorded in the report and its siblings
    /// still run.
    pub fn process(&self, root: &Path) -> Result<ProcessReport, PipelineError> {
        let mut report = ProcessReport::default();

        for run in self.discover(root)? {
            let outcome = self.process_run_dir(&run);
            log_outcome(&outcome);
            report.runs.push(outcome);
        }

        Ok(report)
    }

    /// Process up to `jobs` run directories at a time on the blocking pool.
    ///
    /// Run directories never share sinks, so the output is the same as
    /// [`Pipeline::process`]; outcomes come back in discovery order.
    pub async fn process_concurrent(
        self: Arc<Self>,
        root: PathBuf,
        jobs: usize,
    ) -> Result<ProcessReport, PipelineError> {
        let jobs = jobs.max(1);
        let runs = {
            let this = Arc::clone(&self);
            tokio::task::spawn_blocking(move || this.discover(&root)).await??
        };

        let mut slots: Vec<Option<RunOutcome>> = Vec::new();
        slots.resize_with(runs.len(), || None);
        let mut task_index = HashMap::new();
        let mut tasks = JoinSet::new();

        for (idx, run) in runs.iter().cloned().enumerate() {
            if tasks.len() >= jobs {
                if let Some(joined) = tasks.join_next().await {
                    self.store_outcome(&mut slots, &runs, &task_index, joined);
                }
            }

            let this = Arc::clone(&self);
            let handle = tasks.spawn_blocking(move || (idx, this.process_run_dir(&run)));
            task_index.insert(handle.id(), idx);
        }

        while let Some(joined) = tasks.join_next().await {
            self.store_outcome(&mut slots, &runs, &task_index, joined);
        }

        let mut report = ProcessReport::default();
        for (run, slot) in runs.into_iter().zip(slots) {
            let outcome = slot.unwrap_or_else(|| {
                self.outcome(run, Counts::default(), Some(RunError::Missing))
            });
            log_outcome(&outcome);
            report.runs.push(outcome);
        }

        Ok(report)
    }

    /// Filter one run directory into `<run_dir>/<out_subdir>/`.
    ///
    /// Unreadable source files are skipped. A sink failure stops this run
    /// directory; its open sinks are closed on the way out and the counts
    /// reached so far are kept.
    pub fn process_run_dir(&self, run: &RunDirectory) -> RunOutcome {
        let mut counts = Counts::default();
        let error = self
            .filter_run_dir(run, &mut counts)
            .err()
            .map(RunError::from);
        self.outcome(run.clone(), counts, error)
    }

    fn filter_run_dir(&self, run: &RunDirectory, counts: &mut Counts) -> Result<(), SinkError> {
        let out_dir = run.output_dir(&self.out_subdir);
        let mut writer = MultiplexedWriter::create(&out_dir, run.name.clone())?;

        for file in LogFileLocator::new(&run.path).files() {
            self.process_file(&file, &mut writer, counts)?;
        }

        writer.finish()
    }

    fn process_file(
        &self,
        file: &LogFile,
        writer: &mut MultiplexedWriter,
        counts: &mut Counts,
    ) -> Result<(), SinkError> {
        match File::open(&file.path) {
            Ok(handle) => self.process_lines(BufReader::new(handle), file, writer, counts),
            Err(err) => {
                tracing::debug!(file = %file.path.display(), error = %err, "skipping unreadable log");
                Ok(())
            }
        }
    }

    /// Filter every line of `reader`; a read error ends this file only
    fn process_lines<R: BufRead>(
        &self,
        mut reader: R,
        file: &LogFile,
        writer: &mut MultiplexedWriter,
        counts: &mut Counts,
    ) -> Result<(), SinkError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(file = %file.path.display(), error = %err, "stopped reading log");
                    break;
                }
            }
            counts.scanned += 1;

            let line = String::from_utf8_lossy(&buf);
            let Some(record) = self.parser.parse(&line) else {
                continue;
            };
            if !self.levels.allows(&record.level) {
                continue;
            }

            writer.write(&record, &file.path, file.node)?;
            counts.kept += 1;
        }

        Ok(())
    }

    fn outcome(&self, run: RunDirectory, counts: Counts, error: Option<RunError>) -> RunOutcome {
        RunOutcome {
            out_dir: run.output_dir(&self.out_subdir),
            run,
            counts,
            error,
        }
    }

    fn store_outcome(
        &self,
        slots: &mut [Option<RunOutcome>],
        runs: &[RunDirectory],
        task_index: &HashMap<tokio::task::Id, usize>,
        joined: Result<(usize, RunOutcome), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((idx, outcome)) => slots[idx] = Some(outcome),
            Err(err) => {
                if let Some(&idx) = task_index.get(&err.id()) {
                    let outcome =
                        self.outcome(runs[idx].clone(), Counts::default(), Some(RunError::Worker(err)));
                    slots[idx] = Some(outcome);
                }
            }
        }
    }
}

/// Process `root` with default hints, sequentially
pub fn process(
    root: &Path,
    levels: Option<LevelFilter>,
    out_subdir: &str,
) -> Result<ProcessReport, PipelineError> {
    let config = PipelineConfig {
        levels: levels.unwrap_or_default(),
        out_subdir: out_subdir.to_string(),
        hints: RunHints::default(),
    };
    Pipeline::new(config)?.process(root)
}

fn log_outcome(outcome: &RunOutcome) {
    let counts = outcome.counts;
    match &outcome.error {
        None => tracing::info!(
            run_dir = %outcome.run.name,
            scanned = counts.scanned,
            kept = counts.kept,
            out = %outcome.out_dir.display(),
            "filtered run directory"
        ),
        Some(err) => tracing::error!(
            run_dir = %outcome.run.name,
            scanned = counts.scanned,
            kept = counts.kept,
            error = %err,
            "failed to filter run directory"
        ),
    }
}
