//! Settings for a dslogs invocation
//!
//! Values come from the command line (or `TEST_NAME` / `SCHED_TYPE` in the
//! environment), then an optional TOML file, then built-in defaults.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use dslogs_logs::{DEFAULT_OUT_SUBDIR, LevelFilter, PipelineConfig, RunHints};

/// Contents of a `--config` file
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Levels to keep, e.g. `["INFO", "WARN"]`
    pub levels: Option<Vec<String>>,

    pub out_subdir: Option<String>,

    pub test_name: Option<String>,

    pub sched_type: Option<String>,

    /// Run directories processed at once
    pub jobs: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Command-line overrides, already merged with the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub levels: Option<String>,
    pub out_subdir: Option<String>,
    pub test_name: Option<String>,
    pub sched_type: Option<String>,
    pub jobs: Option<usize>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub pipeline: PipelineConfig,
    pub jobs: usize,
}

impl Settings {
    pub fn resolve(root: PathBuf, overrides: Overrides, file: FileConfig) -> anyhow::Result<Self> {
        let levels = match (overrides.levels, file.levels) {
            (Some(list), _) => LevelFilter::parse(&list),
            (None, Some(levels)) => LevelFilter::new(levels),
            (None, None) => LevelFilter::default(),
        };

        let out_subdir = overrides
            .out_subdir
            .or(file.out_subdir)
            .unwrap_or_else(|| DEFAULT_OUT_SUBDIR.to_string());
        if out_subdir.trim().is_empty() {
            anyhow::bail!("output subdirectory name must not be empty");
        }

        let jobs = overrides.jobs.or(file.jobs).unwrap_or(1);
        if jobs == 0 {
            anyhow::bail!("jobs must be at least 1");
        }

        let hints = RunHints::new(
            overrides.test_name.or(file.test_name),
            overrides.sched_type.or(file.sched_type),
        );

        Ok(Self {
            root,
            pipeline: PipelineConfig {
                levels,
                out_subdir,
                hints,
            },
            jobs,
        })
    }
}
