use std::path::Path;

use crate::error::LibraryError;

/// Fetches asset bytes from a url into a local file.
///
/// Implementations write to `dest` only; the repository picks a temporary
/// `dest` and renames it into place once `fetch` returns.
pub trait Downloader: Send + Sync {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), LibraryError>;
}
