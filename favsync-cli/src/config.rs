//! YAML config file and its merge with command-line options.
//!
//! ```yaml
//! user: someone
//! api_key: abc123
//! library: /srv/favorites
//! log: info
//! mode: pool
//! workers: 8
//! exiftool: /usr/bin/exiftool
//! catalog_url: https://e621.net
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use favsync_exiftool::{ChannelConfig, ChannelMode};
use favsync_library::config::DEFAULT_WORKERS;
use favsync_library::LibraryConfig;

use crate::GlobalArgs;

pub const DEFAULT_LOG: &str = "info";
pub const DEFAULT_LIBRARY: &str = "library";
pub const DEFAULT_CATALOG_URL: &str = "https://e621.net";

/// Contents of the config file. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub user: Option<String>,
    pub api_key: Option<String>,
    pub library: Option<PathBuf>,
    pub log: Option<String>,
    pub mode: Option<ChannelMode>,
    pub workers: Option<usize>,
    pub exiftool: Option<PathBuf>,
    pub catalog_url: Option<String>,
}

impl FileConfig {
    /// `<config dir>/favsync/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("favsync").join("config.yaml"))
    }

    /// Load `explicit` (which must exist), or the default file if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

/// Effective settings: command line over config file over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub user: Option<String>,
    pub api_key: Option<String>,
    pub library: PathBuf,
    pub log: String,
    pub mode: ChannelMode,
    pub workers: usize,
    pub exiftool: Option<PathBuf>,
    pub catalog_url: String,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, file: FileConfig) -> Self {
        Self {
            user: file.user,
            api_key: file.api_key,
            library: args
                .library
                .clone()
                .or(file.library)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY)),
            log: args
                .log
                .clone()
                .or(file.log)
                .unwrap_or_else(|| DEFAULT_LOG.to_string()),
            mode: args.mode.or(file.mode).unwrap_or_default(),
            workers: file.workers.unwrap_or(DEFAULT_WORKERS),
            exiftool: args.exiftool.clone().or(file.exiftool),
            catalog_url: file
                .catalog_url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
        }
    }

    pub fn channel(&self) -> ChannelConfig {
        let mut channel = ChannelConfig {
            mode: self.mode,
            ..ChannelConfig::default()
        };
        if let Some(program) = &self.exiftool {
            channel.program = program.clone();
        }
        channel
    }

    pub fn library_config(&self) -> LibraryConfig {
        LibraryConfig {
            root: self.library.clone(),
            workers: self.workers,
            channel: self.channel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field() {
        let file = FileConfig::parse(
            "user: someone\napi_key: k\nlibrary: /srv/favs\nlog: debug\nmode: pool\nworkers: 8\nexiftool: /opt/exiftool\n",
        )
        .unwrap();
        assert_eq!(file.user.as_deref(), Some("someone"));
        assert_eq!(file.mode, Some(ChannelMode::Pool));
        assert_eq!(file.workers, Some(8));
        assert_eq!(file.exiftool, Some(PathBuf::from("/opt/exiftool")));
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(FileConfig::parse("\n").unwrap(), FileConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::parse("libary: /typo\n").is_err());
    }

    #[test]
    fn command_line_overrides_file() {
        let args = GlobalArgs {
            library: Some(PathBuf::from("/cli")),
            mode: Some(ChannelMode::Session),
            ..GlobalArgs::default()
        };
        let file = FileConfig {
            library: Some(PathBuf::from("/file")),
            mode: Some(ChannelMode::Pool),
            log: Some("warn".to_string()),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(&args, file);
        assert_eq!(settings.library, PathBuf::from("/cli"));
        assert_eq!(settings.mode, ChannelMode::Session);
        assert_eq!(settings.log, "warn");
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let settings = Settings::resolve(&GlobalArgs::default(), FileConfig::default());
        assert_eq!(settings.library, PathBuf::from("library"));
        assert_eq!(settings.log, "info");
        assert_eq!(settings.mode, ChannelMode::Session);
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.channel().program, PathBuf::from("exiftool"));
    }
}
