//! Channel configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROGRAM: &str = "exiftool";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// How calls reach the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// One long-lived process, calls serialized over its pipes.
    #[default]
    Session,
    /// A fresh process per call; safe to call from many threads at once.
    Pool,
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMode::Session => write!(f, "session"),
            ChannelMode::Pool => write!(f, "pool"),
        }
    }
}

impl FromStr for ChannelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "pool" => Ok(Self::Pool),
            other => Err(format!(
                "unknown channel mode '{other}'; expected: session, pool"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Tool executable.
    pub program: PathBuf,
    /// Arguments placed before everything the channel adds.
    pub program_args: Vec<String>,
    pub mode: ChannelMode,
    /// Upper bound for a single call, in both modes.
    pub call_timeout: Duration,
    /// How long a session may take to exit after the shutdown directive
    /// before it is killed; in pool mode, how long `close` waits for
    /// in-flight calls.
    pub shutdown_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            program_args: Vec::new(),
            mode: ChannelMode::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
