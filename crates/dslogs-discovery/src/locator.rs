use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use dslogs_types::LogFile;

/// `stdout_<i>.log` / `stderr_<i>.log`, any case
static NODE_LOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(stdout|stderr)_(\d+)\.log$").expect("node log pattern is valid")
});

/// Extract the node id from a dsTest log file name.
///
/// Returns `None` for any other name, and for ids too large for a `u64`.
pub fn node_id_from_file_name(name: &str) -> Option<u64> {
    let caps = NODE_LOG_RE.captures(name)?;
    caps.get(2)?.as_str().parse().ok()
}

/// Recursive finder for per-node log files
#[derive(Clone, Debug)]
pub struct LogFileLocator {
    root: PathBuf,
}

impl LogFileLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree, yielding every matching regular file.
    ///
    /// Entries are visited in file-name order at each level. Unreadable
    /// entries are skipped.
    pub fn files(&self) -> impl Iterator<Item = LogFile> + use<> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter_map(|entry| {
                let node = node_id_from_file_name(entry.file_name().to_str()?)?;
                // Follows file symlinks, like a plain stat would
                if !entry.path().is_file() {
                    return None;
                }
                Some(LogFile::new(entry.into_path(), node))
            })
    }
}

/// A run directory has at least one node log file somewhere below it
pub fn looks_like_run_dir(dir: &Path) -> bool {
    LogFileLocator::new(dir).files().next().is_some()
}
