use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error surface for talking to the external metadata tool.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The framing protocol broke down: the tool exited, a stream closed,
    /// or an earlier failure left the session unusable.
    #[error("exiftool protocol error: {0}")]
    Protocol(String),

    #[error("exiftool call {call_id} did not complete within {waited:?}")]
    Timeout { call_id: u64, waited: Duration },

    /// The tool ran but reported failure. The message carries stderr, or
    /// stdout when stderr is empty.
    #[error("exiftool failed ({status}): {}", tool_output(.stdout, .stderr))]
    Tool {
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("exiftool response is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("exiftool response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("exiftool channel is closed")]
    Closed,
}

fn tool_output<'a>(stdout: &'a str, stderr: &'a str) -> &'a str {
    if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    }
}

pub(crate) fn io_err(context: &'static str, source: std::io::Error) -> ChannelError {
    ChannelError::Io { context, source }
}
