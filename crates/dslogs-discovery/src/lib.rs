//! Run directory and log file discovery for dslogs
//!
//! This crate finds the scheduler-iteration run directories under an
//! experiment root and the per-node `stdout_<i>.log` / `stderr_<i>.log`
//! files inside each of them.

mod locator;
mod resolver;

pub use locator::{LogFileLocator, looks_like_run_dir, node_id_from_file_name};
pub use resolver::{RunDirectoryResolver, RunHints};

// Re-export types used in our public API
pub use dslogs_types::{LogFile, RunDirectory};
