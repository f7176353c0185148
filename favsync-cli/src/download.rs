use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use favsync_library::{Downloader, LibraryError};

use crate::catalog::USER_AGENT;

/// Streams asset bytes over HTTP into the destination file.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(120))
            .build();
        Self { agent }
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), LibraryError> {
        let failed = |reason: String| LibraryError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self.agent.get(url).call().map_err(|e| failed(e.to_string()))?;
        let file = File::create(dest).map_err(|e| LibraryError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let bytes = io::copy(&mut response.into_reader(), &mut writer)
            .and_then(|n| writer.flush().map(|()| n))
            .map_err(|e| failed(e.to_string()))?;
        tracing::debug!(url, bytes, "fetched");
        Ok(())
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}
