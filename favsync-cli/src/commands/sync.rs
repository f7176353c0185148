//! `favsync sync`: fetch favorites and bring the library up to date.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tabled::{settings::Style, Table, Tabled};

use favsync_core::CatalogPost;
use favsync_exiftool::ChannelMode;
use favsync_library::{AssetRepository, LibraryError, LibraryStats, PostOutcome, UpdatePool};

use crate::catalog::CatalogClient;
use crate::config::Settings;
use crate::download::HttpDownloader;

/// Arguments for `favsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Catalog account name; also whose favorites are fetched.
    #[arg(long)]
    pub user: Option<String>,

    /// API key of the account.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Concurrent updates in pool mode.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Catalog base url.
    #[arg(long)]
    pub catalog_url: Option<String>,
}

#[derive(Debug, Default)]
struct RunSummary {
    stats: LibraryStats,
    failed: usize,
}

impl RunSummary {
    fn record(&mut self, result: Result<PostOutcome, LibraryError>) {
        match result {
            Ok(outcome) => self.stats.record(outcome),
            Err(err) => {
                tracing::error!(error = %err, "post failed");
                self.failed += 1;
            }
        }
    }
}

impl SyncArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let user = self
            .user
            .or_else(|| settings.user.clone())
            .context("no user given; pass --user or set `user` in the config file")?;
        let api_key = self
            .api_key
            .or_else(|| settings.api_key.clone())
            .context("no API key given; pass --api-key or set `api_key` in the config file")?;
        let catalog_url = self.catalog_url.unwrap_or_else(|| settings.catalog_url.clone());

        let mut config = settings.library_config();
        if let Some(workers) = self.workers {
            config.workers = workers;
        }

        let repo = AssetRepository::open(&config, Box::new(HttpDownloader::new()))
            .map(Arc::new)
            .with_context(|| format!("failed to open library at {}", config.root.display()))?;
        if let Some(report) = repo.migration() {
            println!(
                "✓ migrated library from version {} to {} ({} assets moved)",
                report.from, report.to, report.moved
            );
        }

        let mut client = CatalogClient::new(&catalog_url, &user, &api_key);
        let posts = client
            .favorites(&user)
            .with_context(|| format!("failed to fetch favorites of '{user}'"))?;

        let summary = match config.channel.mode {
            ChannelMode::Session => run_serial(&repo, posts),
            ChannelMode::Pool => run_pooled(Arc::clone(&repo), posts, config.workers)?,
        };
        finish(&repo, summary)
    }
}

/// Bar over the posts of one run, drawn on stderr only when it is a
/// terminal.
fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::stderr());
    if !std::io::stderr().is_terminal() {
        bar.set_draw_target(ProgressDrawTarget::hidden());
        return bar;
    }
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message("syncing");
    bar
}

fn run_serial(repo: &AssetRepository, posts: Vec<CatalogPost>) -> RunSummary {
    let progress = progress_bar(posts.len());
    let mut summary = RunSummary::default();
    for post in &posts {
        tracing::debug!(post = %post.id, "updating");
        summary.record(repo.update_post(post));
        progress.inc(1);
    }
    progress.finish_and_clear();
    summary
}

fn run_pooled(repo: Arc<AssetRepository>, posts: Vec<CatalogPost>, workers: usize) -> Result<RunSummary> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the worker runtime")?;

    let progress = progress_bar(posts.len());
    let summary = runtime.block_on(async {
        let mut summary = RunSummary::default();
        let mut pool = UpdatePool::new(repo, workers);
        for post in posts {
            while pool.pending() >= workers.max(1) {
                if let Some(result) = pool.next().await {
                    summary.record(result.map(|(_, outcome)| outcome));
                    progress.inc(1);
                }
            }
            let id = post.id;
            match pool.submit(post).await {
                Ok(()) => {}
                Err(LibraryError::SidecarBusy { path }) => {
                    tracing::warn!(post = %id, sidecar = %path.display(), "duplicate post skipped");
                    progress.inc(1);
                }
                Err(err) => {
                    summary.record(Err(err));
                    progress.inc(1);
                }
            }
        }
        for result in pool.close().await {
            summary.record(result.map(|(_, outcome)| outcome));
            progress.inc(1);
        }
        summary
    });
    progress.finish_and_clear();
    Ok(summary)
}

fn finish(repo: &AssetRepository, summary: RunSummary) -> Result<()> {
    repo.close().context("failed to shut down exiftool")?;
    print_stats(&summary);
    if summary.failed > 0 {
        bail!("{} post(s) failed; see the log for details", summary.failed);
    }
    Ok(())
}

#[derive(Tabled)]
struct StatsRow {
    processed: usize,
    new: usize,
    updated: usize,
    failed: usize,
}

fn print_stats(summary: &RunSummary) {
    tracing::info!(
        processed = summary.stats.processed,
        new = summary.stats.new,
        updated = summary.stats.updated,
        failed = summary.failed,
        "sync finished"
    );
    let mut table = Table::new([StatsRow {
        processed: summary.stats.processed,
        new: summary.stats.new,
        updated: summary.stats.updated,
        failed: summary.failed,
    }]);
    table.with(Style::rounded());
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_covers_every_post() {
        let bar = progress_bar(3);
        assert_eq!(bar.length(), Some(3));
        assert_eq!(bar.is_hidden(), !std::io::stderr().is_terminal());
        bar.inc(3);
        assert_eq!(bar.position(), 3);
        bar.finish_and_clear();
    }

    #[test]
    fn summary_counts_failures_apart_from_stats() {
        let mut summary = RunSummary::default();
        summary.record(Err(LibraryError::PoolClosed));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.stats.processed, 0);
    }
}
