//! Interpreting what the tool sent back.

use serde_json::Value;

use crate::error::ChannelError;

/// The trimmed output of one completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResponse {
    pub call_id: u64,
    pub text: String,
}

impl ToolResponse {
    pub fn new(call_id: u64, text: impl Into<String>) -> Self {
        Self {
            call_id,
            text: text.into(),
        }
    }

    /// The structured JSON document; `None` when the tool printed nothing.
    pub fn document(&self) -> Result<Option<Value>, ChannelError> {
        if self.text.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.text)?))
    }

    /// Counters from the tool's write summary lines.
    pub fn write_summary(&self) -> WriteSummary {
        WriteSummary::parse(&self.text)
    }

    /// The write summary, or [`ChannelError::Tool`] if the tool reported
    /// any file it could not write.
    pub fn ensure_written(&self) -> Result<WriteSummary, ChannelError> {
        let summary = self.write_summary();
        if summary.failed > 0 {
            return Err(ChannelError::Tool {
                status: format!("{} file(s) not written", summary.failed),
                stdout: self.text.clone(),
                stderr: String::new(),
            });
        }
        Ok(summary)
    }
}

/// ```text
///     1 image files created
///     0 image files updated
///     1 files weren't updated due to errors
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl WriteSummary {
    pub fn parse(text: &str) -> Self {
        let mut summary = Self::default();
        for line in text.lines() {
            let line = line.trim();
            let Some((count, rest)) = line.split_once(' ') else {
                continue;
            };
            let Ok(count) = count.parse::<u32>() else {
                continue;
            };
            let rest = rest.trim();
            if rest.ends_with("files created") {
                summary.created += count;
            } else if rest.ends_with("files updated") {
                summary.updated += count;
            } else if rest.ends_with("files unchanged") {
                summary.unchanged += count;
            } else if rest.contains("weren't updated due to errors")
                || rest.contains("weren't created due to errors")
            {
                summary.failed += count;
            }
        }
        summary
    }
}
