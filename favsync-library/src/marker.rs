//! The `library.json` version marker at the library root.
//!
//! Writes use an atomic `.tmp` + rename so a crash never leaves a
//! half-written marker behind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use favsync_core::paths::MARKER_FILE;

use crate::error::{io_err, LibraryError};

/// On-disk marker payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMarker {
    pub version: u32,
}

/// `<root>/library.json`
pub fn marker_path(root: &Path) -> PathBuf {
    root.join(MARKER_FILE)
}

/// Load the marker under `root`; `None` if the file does not exist.
pub fn load(root: &Path) -> Result<Option<LibraryMarker>, LibraryError> {
    let path = marker_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save the marker under `root` atomically.
pub fn save(root: &Path, marker: LibraryMarker) -> Result<(), LibraryError> {
    let path = marker_path(root);
    let json = serde_json::to_string(&marker)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_marker_is_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load(tmp.path()).unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), LibraryMarker { version: 1 }).unwrap();
        assert_eq!(load(tmp.path()).unwrap(), Some(LibraryMarker { version: 1 }));
        assert_eq!(
            std::fs::read_to_string(marker_path(tmp.path())).unwrap(),
            r#"{"version":1}"#
        );
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), LibraryMarker { version: 0 }).unwrap();
        assert!(!marker_path(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(marker_path(tmp.path()), r#"{"version": 1, "note": "x"}"#).unwrap();
        assert_eq!(load(tmp.path()).unwrap(), Some(LibraryMarker { version: 1 }));
    }

    #[test]
    fn malformed_marker_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(marker_path(tmp.path()), "not json").unwrap();
        assert!(matches!(load(tmp.path()), Err(LibraryError::Json(_))));
    }
}
