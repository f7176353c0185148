//! `favsync migrate`: bring an existing library up to the current layout.

use anyhow::{Context, Result};
use clap::Args;

use favsync_library::AssetRepository;

use crate::config::Settings;
use crate::download::HttpDownloader;

/// Arguments for `favsync migrate`.
#[derive(Args, Debug)]
pub struct MigrateArgs {}

impl MigrateArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let config = settings.library_config();
        let repo = AssetRepository::open(&config, Box::new(HttpDownloader::new()))
            .with_context(|| format!("failed to open library at {}", config.root.display()))?;

        match repo.migration() {
            Some(report) => println!(
                "✓ migrated {} from version {} to {} ({} assets moved)",
                repo.root().display(),
                report.from,
                report.to,
                report.moved
            ),
            None => println!(
                "✓ {} is at version {}, nothing to migrate",
                repo.root().display(),
                repo.version()
            ),
        }

        repo.close().context("failed to shut down exiftool")?;
        Ok(())
    }
}
