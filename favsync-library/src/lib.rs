//! # favsync-library
//!
//! The on-disk asset library and the sidecar update engine.
//!
//! Open a library with [`AssetRepository::open`]; older layouts are
//! migrated before it returns. Call [`AssetRepository::update_post`] per
//! catalog post, or hand posts to an [`UpdatePool`] for concurrent updates.

pub mod config;
pub mod download;
pub mod error;
pub mod marker;
pub mod migrate;
pub mod pool;
pub mod repository;
pub mod sidecar;

pub use config::LibraryConfig;
pub use download::Downloader;
pub use error::LibraryError;
pub use migrate::{LayoutMigrator, MigrationReport, MigrationState, LATEST_VERSION};
pub use pool::UpdatePool;
pub use repository::{AssetRepository, LibraryStats, PostOutcome};
pub use sidecar::{ChangeOutcome, SidecarManager, MANAGED_TAG};
