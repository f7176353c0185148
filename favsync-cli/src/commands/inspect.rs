//! `favsync inspect`: dump the record stored in a sidecar.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use favsync_library::SidecarManager;

use crate::config::Settings;

/// Arguments for `favsync inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Sidecar file to read.
    pub sidecar: PathBuf,
}

impl InspectArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let manager =
            SidecarManager::open(&settings.channel()).context("failed to start exiftool")?;
        let record = manager
            .read(&self.sidecar)
            .with_context(|| format!("failed to read {}", self.sidecar.display()))?;
        manager.close().context("failed to shut down exiftool")?;

        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("failed to serialize record")?
        );
        Ok(())
    }
}
