//! Library layout migrations.
//!
//! Version history:
//! - 0: every asset and sidecar directly under the root
//! - 1: assets sorted into `YYYY/MM/DD` by capture time
//!
//! The marker is written only after a step has moved everything it needs
//! to, so an interrupted run repeats the step on the next open. Steps are
//! idempotent: entries already in place are not touched again.

use std::path::{Path, PathBuf};

use favsync_core::paths::{date_dir, is_sidecar, sidecar_path, MARKER_FILE};

use crate::error::{io_err, LibraryError};
use crate::marker::{self, LibraryMarker};
use crate::sidecar::SidecarManager;

/// Version written by this build.
pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending(u32),
    InProgress { from: u32 },
    Done(u32),
}

/// Outcome of [`LayoutMigrator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    /// Asset + sidecar pairs moved, counting sidecars reunited with an
    /// already moved asset.
    pub moved: usize,
}

pub struct LayoutMigrator<'a> {
    root: &'a Path,
    sidecars: &'a SidecarManager,
    state: MigrationState,
}

impl<'a> LayoutMigrator<'a> {
    pub fn new(root: &'a Path, sidecars: &'a SidecarManager, version: u32) -> Self {
        Self {
            root,
            sidecars,
            state: MigrationState::Pending(version),
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Run every step from the current version up to [`LATEST_VERSION`].
    ///
    /// On failure the state stays `InProgress` for the failed step and the
    /// marker keeps the last completed version.
    pub fn run(&mut self) -> Result<MigrationReport, LibraryError> {
        let start = match self.state {
            MigrationState::Pending(version) | MigrationState::Done(version) => version,
            MigrationState::InProgress { from } => from,
        };
        let mut report = MigrationReport {
            from: start,
            to: start,
            moved: 0,
        };

        let mut version = start;
        while version < LATEST_VERSION {
            self.state = MigrationState::InProgress { from: version };
            tracing::info!(from = version, to = version + 1, "starting library migration");
            report.moved += self.step(version)?;
            version += 1;
            marker::save(self.root, LibraryMarker { version })?;
            tracing::info!(version, "library migration succeeded");
        }

        self.state = MigrationState::Done(version);
        report.to = version;
        Ok(report)
    }

    /// Perform the step leaving `from`; returns the number of pairs moved.
    pub fn step(&self, from: u32) -> Result<usize, LibraryError> {
        match from {
            0 => self.sort_into_date_dirs(),
            _ => Err(LibraryError::UnknownMigration { from }),
        }
    }

    /// 0 -> 1: move each top-level asset with a sidecar into its date
    /// directory, then reunite root sidecars whose asset was already moved
    /// by an interrupted run. Other lone files stay where they are.
    fn sort_into_date_dirs(&self) -> Result<usize, LibraryError> {
        let (assets, sidecars) = top_level_files(self.root)?;
        let mut moved = 0;
        for asset in assets {
            let sidecar = sidecar_path(&asset);
            if !sidecar.is_file() {
                tracing::warn!(asset = %asset.display(), "no sidecar, leaving in place");
                continue;
            }

            let dest = self.root.join(self.date_dir_of(&sidecar)?);
            std::fs::create_dir_all(&dest).map_err(|e| io_err(&dest, e))?;
            move_into(&asset, &dest)?;
            move_into(&sidecar, &dest)?;
            tracing::debug!(asset = %asset.display(), dest = %dest.display(), "moved");
            moved += 1;
        }

        for sidecar in sidecars {
            let Some(asset_name) = sidecar.file_stem() else {
                continue;
            };
            // Paired sidecars were moved above or are left with their asset.
            if !sidecar.is_file() || sidecar.with_file_name(asset_name).exists() {
                continue;
            }
            let Some(capture_time) = self.sidecars.read(&sidecar)?.capture_time else {
                tracing::warn!(sidecar = %sidecar.display(), "no asset, leaving in place");
                continue;
            };
            let dest = self.root.join(date_dir(&capture_time));
            if !dest.join(asset_name).is_file() {
                tracing::warn!(sidecar = %sidecar.display(), "no asset, leaving in place");
                continue;
            }
            move_into(&sidecar, &dest)?;
            tracing::info!(sidecar = %sidecar.display(), dest = %dest.display(), "reunited sidecar with its asset");
            moved += 1;
        }
        Ok(moved)
    }

    fn date_dir_of(&self, sidecar: &Path) -> Result<PathBuf, LibraryError> {
        let record = self.sidecars.read(sidecar)?;
        match record.capture_time {
            Some(capture_time) => Ok(date_dir(&capture_time)),
            None => Err(LibraryError::MissingField {
                field: "DateTimeOriginal",
                path: sidecar.to_path_buf(),
            }),
        }
    }
}

/// Regular files directly under `root`, excluding the marker, split into
/// assets and sidecars, each in name order.
fn top_level_files(root: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), LibraryError> {
    let entries = std::fs::read_dir(root).map_err(|e| io_err(root, e))?;
    let mut assets = Vec::new();
    let mut sidecars = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(root, e))?;
        let path = entry.path();
        if entry.file_name() == MARKER_FILE || !path.is_file() {
            continue;
        }
        if is_sidecar(&path) {
            sidecars.push(path);
        } else {
            assets.push(path);
        }
    }
    assets.sort();
    sidecars.sort();
    Ok((assets, sidecars))
}

fn move_into(path: &Path, dir: &Path) -> Result<(), LibraryError> {
    let Some(name) = path.file_name() else {
        return Err(io_err(path, std::io::Error::other("path has no file name")));
    };
    let target = dir.join(name);
    std::fs::rename(path, &target).map_err(|e| io_err(&target, e))
}
