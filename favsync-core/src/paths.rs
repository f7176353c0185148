//! Archive path layout.
//!
//! ```text
//! <root>/
//!   library.json              (version marker)
//!   <YYYY>/<MM>/<DD>/
//!     <id>.<ext>              (asset)
//!     <id>.<ext>.xmp          (sidecar)
//! ```
//!
//! Version 0 archives keep `<id>.<ext>` and its sidecar directly in `<root>`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::Datelike;

use crate::record::CaptureTime;
use crate::types::AssetId;

/// Extension appended to an asset path to name its sidecar.
pub const SIDECAR_EXTENSION: &str = "xmp";

/// Name of the version marker file at the archive root.
pub const MARKER_FILE: &str = "library.json";

/// `YYYY/MM/DD` relative directory for a capture time.
pub fn date_dir(capture: &CaptureTime) -> PathBuf {
    let date = capture.date();
    PathBuf::from(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
        .join(format!("{:02}", date.day()))
}

/// `<id>.<ext>`
pub fn asset_file_name(id: AssetId, ext: &str) -> String {
    format!("{id}.{ext}")
}

/// `<root>/YYYY/MM/DD/<id>.<ext>`. Pure, no I/O.
pub fn asset_path_at(root: &Path, capture: &CaptureTime, id: AssetId, ext: &str) -> PathBuf {
    root.join(date_dir(capture)).join(asset_file_name(id, ext))
}

/// The sidecar of `asset`: same directory, `.xmp` appended to the full name.
pub fn sidecar_path(asset: &Path) -> PathBuf {
    with_appended_extension(asset, SIDECAR_EXTENSION)
}

/// `true` if `path` names a sidecar.
pub fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == SIDECAR_EXTENSION)
        .unwrap_or(false)
}

/// `path` with `.<ext>` appended to its file name (`a.jpg` -> `a.jpg.<ext>`).
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_dir_is_zero_padded() {
        let capture = CaptureTime::parse_tool("0987:03:04 05:06:07").unwrap();
        assert_eq!(date_dir(&capture), PathBuf::from("0987").join("03").join("04"));
    }

    #[test]
    fn asset_and_sidecar_share_directory() {
        let capture = CaptureTime::parse_catalog("2021-05-01T00:00:00.000000+00:00").unwrap();
        let asset = asset_path_at(Path::new("/lib"), &capture, AssetId(42), "png");
        assert_eq!(asset, PathBuf::from("/lib/2021/05/01/42.png"));

        let sidecar = sidecar_path(&asset);
        assert_eq!(sidecar, PathBuf::from("/lib/2021/05/01/42.png.xmp"));
        assert_eq!(sidecar.parent(), asset.parent());
        assert!(is_sidecar(&sidecar));
        assert!(!is_sidecar(&asset));
    }

    #[test]
    fn date_dir_uses_capture_local_date() {
        // 23:30 at -05:00 is already the next day in UTC.
        let capture = CaptureTime::parse_catalog("2021-12-31T23:30:00.000-05:00").unwrap();
        assert_eq!(date_dir(&capture), PathBuf::from("2021").join("12").join("31"));
    }
}
