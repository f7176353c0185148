//! favsync core library: catalog entry types, metadata records, errors.
//!
//! Public API surface:
//! - [`types`]: catalog entries as delivered by the remote service
//! - [`record`]: [`MetadataRecord`] and the change detector
//! - [`escape`]: reversible description escaping
//! - [`paths`]: date-partitioned archive paths
//! - [`error`]: [`ParseError`]

pub mod error;
pub mod escape;
pub mod paths;
pub mod record;
pub mod types;

pub use error::ParseError;
pub use record::{needs_update, CaptureTime, MetadataRecord};
pub use types::{AssetId, CatalogPost, PostFile, TagGroups};
