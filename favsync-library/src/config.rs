use std::path::PathBuf;

use favsync_exiftool::ChannelConfig;

pub const DEFAULT_WORKERS: usize = 4;

/// Everything needed to open an [`crate::AssetRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub root: PathBuf,
    /// Concurrent updates in pool mode.
    pub workers: usize,
    pub channel: ChannelConfig,
}
