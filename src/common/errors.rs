use std::path::PathBuf;

use thiserror::Error;

/// Error types for gxyarchiver operations.
/// We use `anyhow` at the top level for CLI error handling,
/// but these typed errors let callers tell "the remote said no" apart from
/// "the remote lied or lagged" and from local disk failures.
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// The request never produced an HTTP response
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Rate limiting or upstream outage that outlasted the retry budget
    #[error("{url} kept answering {status} after {attempts} attempts")]
    Transient {
        url: String,
        status: u16,
        attempts: u32,
    },

    /// The remote rejected the request; never retried
    #[error("{url} answered {status}: {body}")]
    Remote {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Export task reported success but no up-to-date export record exists
    #[error(
        "no up-to-date export record for history {history_id} after task {task_id} succeeded"
    )]
    MissingExportRecord { history_id: String, task_id: String },

    /// Cancellation was observed between task polls
    #[error("archiving of history {history_id} was cancelled")]
    Cancelled { history_id: String },

    /// File system operation failed
    #[error("I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be written or read back
    #[error("manifest JSON error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Selection came back empty although bundling was requested
    #[error("no eligible files in '{}' fit within {target_size} bytes", .directory.display())]
    EmptySelection { directory: PathBuf, target_size: u64 },

    /// Invalid settings or file pattern
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool could not be created
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl ArchiverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiverError::Io {
            path: path.into(),
            source,
        }
    }

    /// Rate limiting, upstream outages and dropped connections.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArchiverError::Transient { .. } | ArchiverError::Transport { .. }
        )
    }

    /// The remote signalled success but its state does not back that up.
    pub fn is_consistency(&self) -> bool {
        matches!(self, ArchiverError::MissingExportRecord { .. })
    }

    /// Short machine-readable label, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiverError::Transport { .. } => "transport",
            ArchiverError::Transient { .. } => "transient",
            ArchiverError::Remote { .. } => "remote",
            ArchiverError::Decode { .. } => "decode",
            ArchiverError::MissingExportRecord { .. } => "consistency",
            ArchiverError::Cancelled { .. } => "cancelled",
            ArchiverError::Io { .. } => "io",
            ArchiverError::Manifest(_) => "manifest",
            ArchiverError::EmptySelection { .. } => "empty_selection",
            ArchiverError::Config(_) => "config",
            ArchiverError::WorkerPool(_) => "worker_pool",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiverError>;
