//! The asset library: root directory, version marker and per-post updates.

use std::path::{Path, PathBuf};

use serde::Serialize;

use favsync_core::paths::{asset_path_at, sidecar_path, with_appended_extension};
use favsync_core::{CaptureTime, CatalogPost};

use crate::config::LibraryConfig;
use crate::download::Downloader;
use crate::error::{io_err, LibraryError};
use crate::marker::{self, LibraryMarker};
use crate::migrate::{LayoutMigrator, MigrationReport, LATEST_VERSION};
use crate::sidecar::{ChangeOutcome, SidecarManager};

/// Suffix of in-progress downloads.
pub const PART_EXTENSION: &str = "__part__";

/// What [`AssetRepository::update_post`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostOutcome {
    /// The asset was absent and has been downloaded.
    pub downloaded: bool,
    pub sidecar: ChangeOutcome,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LibraryStats {
    pub processed: usize,
    /// Posts whose asset was downloaded in this run.
    pub new: usize,
    /// Posts whose sidecar was rewritten without a download.
    pub updated: usize,
}

impl LibraryStats {
    pub fn record(&mut self, outcome: PostOutcome) {
        self.processed += 1;
        if outcome.downloaded {
            self.new += 1;
        } else if outcome.sidecar == ChangeOutcome::Updated {
            self.updated += 1;
        }
    }
}

pub struct AssetRepository {
    root: PathBuf,
    version: u32,
    migration: Option<MigrationReport>,
    sidecars: SidecarManager,
    downloader: Box<dyn Downloader>,
}

impl AssetRepository {
    /// Open the library at `config.root` with a fresh tool channel.
    pub fn open(config: &LibraryConfig, downloader: Box<dyn Downloader>) -> Result<Self, LibraryError> {
        let sidecars = SidecarManager::open(&config.channel)?;
        Self::open_with(&config.root, sidecars, downloader)
    }

    /// Open or create the library at `root`, migrating older layouts before
    /// returning.
    pub fn open_with(
        root: &Path,
        sidecars: SidecarManager,
        downloader: Box<dyn Downloader>,
    ) -> Result<Self, LibraryError> {
        if !root.is_dir() {
            tracing::info!(root = %root.display(), "creating library");
            std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
            marker::save(root, LibraryMarker { version: LATEST_VERSION })?;
        }

        let version = match marker::load(root)? {
            Some(marker) => marker.version,
            None => {
                tracing::warn!(root = %root.display(), "library.json missing, assuming version 0");
                0
            }
        };
        if version > LATEST_VERSION {
            return Err(LibraryError::UnsupportedVersion {
                found: version,
                latest: LATEST_VERSION,
            });
        }

        let mut repo = Self {
            root: root.to_path_buf(),
            version,
            migration: None,
            sidecars,
            downloader,
        };
        if version < LATEST_VERSION {
            let report = LayoutMigrator::new(&repo.root, &repo.sidecars, version).run()?;
            repo.version = report.to;
            repo.migration = Some(report);
        }
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The migration run while opening, if any.
    pub fn migration(&self) -> Option<MigrationReport> {
        self.migration
    }

    pub fn sidecars(&self) -> &SidecarManager {
        &self.sidecars
    }

    /// Asset and sidecar paths for `post`.
    pub fn paths_for(&self, post: &CatalogPost) -> Result<(PathBuf, PathBuf), LibraryError> {
        let capture_time = CaptureTime::parse_catalog(&post.created_at)?;
        let Some(ext) = post.extension().or(post.file.ext.as_deref()) else {
            return Err(LibraryError::MissingField {
                field: "file.url",
                path: self.root.clone(),
            });
        };
        let asset = asset_path_at(&self.root, &capture_time, post.id, ext);
        let sidecar = sidecar_path(&asset);
        Ok((asset, sidecar))
    }

    /// Download `post` if its asset is absent, then refresh its sidecar.
    ///
    /// Errors carry the post id.
    pub fn update_post(&self, post: &CatalogPost) -> Result<PostOutcome, LibraryError> {
        self.try_update_post(post).map_err(|e| e.for_post(post.id))
    }

    fn try_update_post(&self, post: &CatalogPost) -> Result<PostOutcome, LibraryError> {
        let (asset, sidecar) = self.paths_for(post)?;
        if let Some(dir) = asset.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let downloaded = if asset.is_file() {
            false
        } else {
            let Some(url) = post.file.url.as_deref() else {
                return Err(LibraryError::MissingField {
                    field: "file.url",
                    path: asset,
                });
            };
            self.fetch_into_place(url, &asset)?;
            true
        };

        let sidecar = self.sidecars.update(post, &sidecar)?;
        Ok(PostOutcome {
            downloaded,
            sidecar,
        })
    }

    /// Download to `<asset>.__part__` and rename into place; the partial
    /// file never survives a failure.
    fn fetch_into_place(&self, url: &str, asset: &Path) -> Result<(), LibraryError> {
        let part = with_appended_extension(asset, PART_EXTENSION);
        let result = self
            .downloader
            .fetch(url, &part)
            .and_then(|()| std::fs::rename(&part, asset).map_err(|e| io_err(asset, e)));
        if result.is_err() && part.exists() {
            if let Err(err) = std::fs::remove_file(&part) {
                tracing::warn!(path = %part.display(), error = %err, "could not remove partial download");
            }
        }
        if result.is_ok() {
            tracing::info!(url, asset = %asset.display(), "downloaded");
        }
        result
    }

    /// Release the tool channel.
    pub fn close(&self) -> Result<(), LibraryError> {
        self.sidecars.close()
    }
}
