//! Catalog entry types as delivered by the remote favorites service.
//!
//! Only the fields the archive consumes are modelled; unknown fields in the
//! service's JSON are ignored on deserialization.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Numeric identifier of a catalog post, also the asset's file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for AssetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Tag groups
// ---------------------------------------------------------------------------

/// Tags grouped by category (`general`, `artist`, `species`, ...).
///
/// Group order is the order the service sent them in, which a plain
/// `HashMap` would lose.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagGroups(pub Vec<(String, Vec<String>)>);

impl TagGroups {
    /// All tags of all groups, concatenated in encounter order.
    pub fn flatten(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(_, tags)| tags.iter().cloned())
            .collect()
    }
}

impl<S, T> From<Vec<(S, Vec<T>)>> for TagGroups
where
    S: Into<String>,
    T: Into<String>,
{
    fn from(groups: Vec<(S, Vec<T>)>) -> Self {
        Self(
            groups
                .into_iter()
                .map(|(group, tags)| (group.into(), tags.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

impl Serialize for TagGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (group, tags) in &self.0 {
            map.serialize_entry(group, tags)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TagGroups {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupsVisitor;

        impl<'de> Visitor<'de> for GroupsVisitor {
            type Value = TagGroups;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of tag category to tag list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TagGroups, A::Error> {
                let mut groups = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((group, tags)) = access.next_entry::<String, Vec<String>>()? {
                    groups.push((group, tags));
                }
                Ok(TagGroups(groups))
            }
        }

        deserializer.deserialize_map(GroupsVisitor)
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// File reference of a post. `url` is absent for posts the service hides
/// from the requesting account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostFile {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A favorited post from the catalog's `/posts.json` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPost {
    pub id: AssetId,
    /// `YYYY-MM-DDTHH:MM:SS.ffffff+HH:MM`
    pub created_at: String,
    pub updated_at: String,
    pub file: PostFile,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: TagGroups,
}

impl CatalogPost {
    /// Extension of the asset file, taken from the last path segment of
    /// the file url (query and fragment ignored). `None` without a url or
    /// when the segment has no extension.
    pub fn extension(&self) -> Option<&str> {
        let url = self.file.url.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let segment = path.rsplit('/').next()?;
        match segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
