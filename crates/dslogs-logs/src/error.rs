use std::io;
use std::path::PathBuf;

/// Failure of an output sink; fatal for the run directory being written
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create output directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open sink {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write sink {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush sink {path}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize record")]
    Serialize(#[from] serde_json::Error),
}

/// Why one run directory's processing did not complete
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("run worker failed")]
    Worker(#[from] tokio::task::JoinError),

    #[error("run worker finished without reporting")]
    Missing,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to list run directories under {path}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid filter pattern")]
    Pattern(#[from] regex::Error),

    #[error("discovery worker failed")]
    Worker(#[from] tokio::task::JoinError),
}
