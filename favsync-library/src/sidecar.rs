//! Reading and refreshing sidecars through the metadata tool.

use std::path::Path;

use serde::Serialize;

use favsync_core::record::{FIELD_CAPTURE_TIME, FIELD_DESCRIPTION, FIELD_TAGS};
use favsync_core::{needs_update, CatalogPost, MetadataRecord};
use favsync_exiftool::{open_channel, ChannelConfig, ChannelMode, ProcessChannel};

use crate::error::{tool_err, LibraryError};

/// Tag present on every sidecar this program manages.
pub const MANAGED_TAG: &str = "{favsync}";

/// Result of [`SidecarManager::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOutcome {
    Unchanged,
    Updated,
}

/// Owns the tool channel; closed explicitly with [`SidecarManager::close`]
/// or implicitly when dropped.
pub struct SidecarManager {
    channel: Box<dyn ProcessChannel>,
}

impl SidecarManager {
    pub fn open(config: &ChannelConfig) -> Result<Self, LibraryError> {
        Ok(Self::with_channel(open_channel(config)?))
    }

    pub fn with_channel(channel: Box<dyn ProcessChannel>) -> Self {
        Self { channel }
    }

    pub fn mode(&self) -> ChannelMode {
        self.channel.mode()
    }

    /// The record stored in `sidecar`. A missing sidecar is an empty record.
    pub fn read(&self, sidecar: &Path) -> Result<MetadataRecord, LibraryError> {
        if !sidecar.exists() {
            return Ok(MetadataRecord::default());
        }
        let args = vec![
            format!("-{FIELD_CAPTURE_TIME}"),
            format!("-{FIELD_DESCRIPTION}"),
            format!("-{FIELD_TAGS}"),
            sidecar.display().to_string(),
        ];
        let response = self.channel.call(&args).map_err(|e| tool_err(sidecar, e))?;
        match response.document().map_err(|e| tool_err(sidecar, e))? {
            Some(document) => Ok(MetadataRecord::from_tool_document(&document)?),
            None => Ok(MetadataRecord::default()),
        }
    }

    /// Bring `sidecar` in line with `post`, calling the tool only when the
    /// stored record differs from the desired one.
    pub fn update(&self, post: &CatalogPost, sidecar: &Path) -> Result<ChangeOutcome, LibraryError> {
        let current = self.read(sidecar)?;
        let mut desired = MetadataRecord::from_catalog(post)?;
        desired.ensure_tag(MANAGED_TAG);

        if !needs_update(&current, &desired) {
            tracing::debug!(post = %post.id, sidecar = %sidecar.display(), "sidecar up to date");
            return Ok(ChangeOutcome::Unchanged);
        }

        let mut args = desired.to_tool_args();
        args.extend(clear_args(&current, &desired));
        args.push("-overwrite_original".to_string());
        args.push(sidecar.display().to_string());

        let response = self.channel.call(&args).map_err(|e| tool_err(sidecar, e))?;
        let summary = response.ensure_written().map_err(|e| tool_err(sidecar, e))?;
        tracing::info!(
            post = %post.id,
            sidecar = %sidecar.display(),
            created = summary.created,
            updated = summary.updated,
            "sidecar written"
        );
        Ok(ChangeOutcome::Updated)
    }

    pub fn close(&self) -> Result<(), LibraryError> {
        self.channel.close()?;
        Ok(())
    }
}

/// Empty assignments for fields the sidecar holds but the desired record
/// leaves unset, so a write converges instead of leaving stale values.
fn clear_args(current: &MetadataRecord, desired: &MetadataRecord) -> Vec<String> {
    let mut args = Vec::new();
    if current.capture_time.is_some() && desired.capture_time.is_none() {
        args.push(format!("-{FIELD_CAPTURE_TIME}="));
    }
    if current.description.is_some() && desired.description.is_none() {
        args.push(format!("-{FIELD_DESCRIPTION}="));
    }
    if !current.tags.is_empty() && desired.tags.is_empty() {
        args.push(format!("-{FIELD_TAGS}="));
    }
    args
}
