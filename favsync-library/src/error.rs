//! Error types for favsync-library.

use std::path::PathBuf;

use thiserror::Error;

use favsync_core::{AssetId, ParseError};
use favsync_exiftool::ChannelError;

/// All errors that can arise from library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A timestamp or tool document could not be interpreted.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The metadata tool failed while handling `sidecar`.
    #[error("exiftool failed on {sidecar}: {source}")]
    Tool {
        sidecar: PathBuf,
        #[source]
        source: ChannelError,
    },

    /// The metadata tool could not be started or shut down.
    #[error("exiftool channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A field required at this step is not recorded.
    #[error("{field} is not set for {path}")]
    MissingField { field: &'static str, path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Version marker JSON error.
    #[error("library marker JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no migration defined from library version {from}")]
    UnknownMigration { from: u32 },

    #[error("library version {found} is newer than the supported version {latest}")]
    UnsupportedVersion { found: u32, latest: u32 },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Wraps a failure with the post it happened on.
    #[error("post {id}: {source}")]
    Post {
        id: AssetId,
        #[source]
        source: Box<LibraryError>,
    },

    #[error("an update for {path} is already in flight")]
    SidecarBusy { path: PathBuf },

    #[error("update pool is closed")]
    PoolClosed,

    #[error("update task failed: {0}")]
    PoolTask(String),
}

impl LibraryError {
    pub(crate) fn for_post(self, id: AssetId) -> Self {
        match self {
            already @ LibraryError::Post { .. } => already,
            other => LibraryError::Post {
                id,
                source: Box::new(other),
            },
        }
    }
}

/// Convenience constructor for [`LibraryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LibraryError {
    LibraryError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`LibraryError::Tool`].
pub(crate) fn tool_err(sidecar: impl Into<PathBuf>, source: ChannelError) -> LibraryError {
    LibraryError::Tool {
        sidecar: sidecar.into(),
        source,
    }
}
