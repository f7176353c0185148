//! The three tracked metadata fields and their translations.
//!
//! A [`MetadataRecord`] is built from two directions: a catalog post
//! ([`MetadataRecord::from_catalog`]) and the metadata tool's JSON read-back
//! ([`MetadataRecord::from_tool_output`]). [`needs_update`] compares the two
//! and is the only gate in front of every sidecar write.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::escape::escape_description;
use crate::types::CatalogPost;

/// Catalog `created_at` format.
pub const CATALOG_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Tool date-time format with fractional seconds and offset. Written by
/// [`CaptureTime::render`] whenever the offset is known.
pub const PRIMARY_FORMAT: &str = "%Y:%m:%d %H:%M:%S%.f%:z";

/// Tool date-time format without offset.
pub const NAIVE_FORMAT: &str = "%Y:%m:%d %H:%M:%S%.f";

pub const FIELD_CAPTURE_TIME: &str = "DateTimeOriginal";
pub const FIELD_DESCRIPTION: &str = "Description";
pub const FIELD_TAGS: &str = "TagsList";

// ---------------------------------------------------------------------------
// CaptureTime
// ---------------------------------------------------------------------------

/// When an asset was created: local date-time plus the UTC offset, if the
/// source carried one.
///
/// Equality is structural: the same instant written with two different
/// offsets is two different capture times, so a changed offset triggers a
/// rewrite. Precision is truncated to microseconds, the finest the tool
/// format round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureTime {
    local: NaiveDateTime,
    offset: Option<FixedOffset>,
}

impl CaptureTime {
    pub fn zoned(at: DateTime<FixedOffset>) -> Self {
        Self {
            local: truncate_to_micros(at.naive_local()),
            offset: Some(*at.offset()),
        }
    }

    pub fn naive(local: NaiveDateTime) -> Self {
        Self {
            local: truncate_to_micros(local),
            offset: None,
        }
    }

    /// Parse a catalog `created_at` value.
    pub fn parse_catalog(value: &str) -> Result<Self, ParseError> {
        DateTime::parse_from_str(value, CATALOG_FORMAT)
            .map(Self::zoned)
            .map_err(|_| timestamp_err(value))
    }

    /// Parse a tool date-time, trying [`PRIMARY_FORMAT`] then
    /// [`NAIVE_FORMAT`].
    pub fn parse_tool(value: &str) -> Result<Self, ParseError> {
        if let Ok(at) = DateTime::parse_from_str(value, PRIMARY_FORMAT) {
            return Ok(Self::zoned(at));
        }
        if let Ok(local) = NaiveDateTime::parse_from_str(value, NAIVE_FORMAT) {
            return Ok(Self::naive(local));
        }
        Err(timestamp_err(value))
    }

    /// Render in the tool's date-time syntax.
    pub fn render(&self) -> String {
        match self.offset {
            Some(offset) => format!("{}{}", self.local.format("%Y:%m:%d %H:%M:%S%.6f"), offset),
            None => self.local.format("%Y:%m:%d %H:%M:%S").to_string(),
        }
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// Calendar date in the capture's own time zone; drives the archive's
    /// date partitioning.
    pub fn date(&self) -> NaiveDate {
        self.local.date()
    }
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for CaptureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn truncate_to_micros(local: NaiveDateTime) -> NaiveDateTime {
    let nanos = local.nanosecond();
    local.with_nanosecond(nanos - nanos % 1_000).unwrap_or(local)
}

fn timestamp_err(value: &str) -> ParseError {
    ParseError::Timestamp {
        value: value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MetadataRecord
// ---------------------------------------------------------------------------

/// The metadata a sidecar carries for one asset.
///
/// `None` means "not recorded", which is distinct from an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetadataRecord {
    pub capture_time: Option<CaptureTime>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl MetadataRecord {
    /// Desired record for a catalog post.
    ///
    /// An empty description is left unset; a non-empty one is stored in
    /// its escaped form (see [`crate::escape`]). Tags are all category
    /// groups flattened in encounter order.
    pub fn from_catalog(post: &CatalogPost) -> Result<Self, ParseError> {
        let capture_time = CaptureTime::parse_catalog(&post.created_at)?;
        let description = if post.description.is_empty() {
            None
        } else {
            Some(escape_description(&post.description))
        };
        Ok(Self {
            capture_time: Some(capture_time),
            description,
            tags: post.tags.flatten(),
        })
    }

    /// Record from the tool's JSON output for a single file.
    ///
    /// Missing fields stay unset. List fields are accepted as an array, or
    /// as a bare scalar when the tool collapses a one-element list.
    pub fn from_tool_output(object: &Map<String, Value>) -> Result<Self, ParseError> {
        let capture_time = match object.get(FIELD_CAPTURE_TIME) {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) => Some(CaptureTime::parse_tool(value)?),
            Some(other) => return Err(timestamp_err(&other.to_string())),
        };

        let description = match object.get(FIELD_DESCRIPTION) {
            None | Some(Value::Null) => None,
            Some(value) => Some(scalar_text(FIELD_DESCRIPTION, value)?),
        };

        let tags = match object.get(FIELD_TAGS) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| scalar_text(FIELD_TAGS, item))
                .collect::<Result<_, _>>()?,
            Some(value) => vec![scalar_text(FIELD_TAGS, value)?],
        };

        Ok(Self {
            capture_time,
            description,
            tags,
        })
    }

    /// Record from a whole tool document: a JSON array with one object per
    /// file read. Only the first object is used.
    pub fn from_tool_document(document: &Value) -> Result<Self, ParseError> {
        let first = match document {
            Value::Array(items) => items.first(),
            _ => {
                return Err(ParseError::Document {
                    reason: "expected a JSON array".to_string(),
                })
            }
        };
        match first {
            Some(Value::Object(object)) => Self::from_tool_output(object),
            Some(_) => Err(ParseError::Document {
                reason: "expected an object per file".to_string(),
            }),
            None => Err(ParseError::Document {
                reason: "document lists no files".to_string(),
            }),
        }
    }

    /// One `-Field=value` token per set field, one per tag.
    pub fn to_tool_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(2 + self.tags.len());
        if let Some(capture_time) = &self.capture_time {
            args.push(format!("-{FIELD_CAPTURE_TIME}={}", capture_time.render()));
        }
        if let Some(description) = &self.description {
            args.push(format!("-{FIELD_DESCRIPTION}={description}"));
        }
        for tag in &self.tags {
            args.push(format!("-{FIELD_TAGS}={tag}"));
        }
        args
    }

    /// Append `tag` unless it is already present.
    pub fn ensure_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    /// `true` when nothing at all is recorded.
    pub fn is_empty(&self) -> bool {
        self.capture_time.is_none() && self.description.is_none() && self.tags.is_empty()
    }
}

fn scalar_text(field: &str, value: &Value) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ParseError::Document {
            reason: format!("{field}: unexpected value {other}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Change detection
// ---------------------------------------------------------------------------

/// `true` when a sidecar holding `current` must be rewritten to hold
/// `desired`. Pure and cheap; runs before every write.
pub fn needs_update(current: &MetadataRecord, desired: &MetadataRecord) -> bool {
    current != desired
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
