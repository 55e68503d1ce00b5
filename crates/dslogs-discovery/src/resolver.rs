use std::fs;
use std::io;
use std::path::Path;

use dslogs_types::RunDirectory;

use crate::locator::looks_like_run_dir;

/// Naming hints for dsTest run directories (`<test_name>_<sched_type>_*`)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunHints {
    pub test_name: Option<String>,
    pub sched_type: Option<String>,
}

impl RunHints {
    pub fn new(test_name: Option<String>, sched_type: Option<String>) -> Self {
        Self {
            test_name,
            sched_type,
        }
    }

    /// Expected directory name prefix, only when both hints are set
    pub fn prefix(&self) -> Option<String> {
        match (self.test_name.as_deref(), self.sched_type.as_deref()) {
            (Some(test), Some(sched)) if !test.is_empty() && !sched.is_empty() => {
                Some(format!("{test}_{sched}_"))
            }
            _ => None,
        }
    }
}

/// Decides which directories under an experiment root are run directories
#[derive(Clone, Debug, Default)]
pub struct RunDirectoryResolver {
    hints: RunHints,
}

impl RunDirectoryResolver {
    pub fn new(hints: RunHints) -> Self {
        Self { hints }
    }

    pub fn hints(&self) -> &RunHints {
        &self.hints
    }

    /// Resolve run directories, sorted by name.
    ///
    /// Hinted subdirectories win, then any subdirectory holding node logs,
    /// then the root itself. An empty result is not an error.
    pub fn resolve(&self, root: &Path) -> io::Result<Vec<RunDirectory>> {
        let candidates = subdirectories(root)?;

        if let Some(prefix) = self.hints.prefix() {
            let hinted: Vec<_> = candidates
                .iter()
                .filter(|d| d.name.starts_with(&prefix))
                .filter(|d| looks_like_run_dir(&d.path))
                .cloned()
                .collect();
            if !hinted.is_empty() {
                tracing::debug!(%prefix, count = hinted.len(), "using hinted run directories");
                return Ok(hinted);
            }
            tracing::debug!(%prefix, "no hinted run directories, autodetecting");
        }

        let detected: Vec<_> = candidates
            .into_iter()
            .filter(|d| looks_like_run_dir(&d.path))
            .collect();
        if !detected.is_empty() {
            return Ok(detected);
        }

        if looks_like_run_dir(root) {
            return Ok(vec![RunDirectory::new(root.to_path_buf())]);
        }

        Ok(Vec::new())
    }
}

/// Immediate subdirectories of `root`, sorted by name
fn subdirectories(root: &Path) -> io::Result<Vec<RunDirectory>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(RunDirectory::new(path));
        }
    }
    dirs.sort();
    Ok(dirs)
}
