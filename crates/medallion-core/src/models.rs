//! Core data models used throughout Medallion.
//!
//! These types represent the tiers, documents, and chunks that flow through
//! the staged transformation pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data maturity tier. Each tier is a top-level folder in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Raw,
    Bronze,
    Silver,
    Gold,
    Lineage,
    DataQuality,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Lineage => "lineage",
            Tier::DataQuality => "data_quality",
        }
    }

    /// Folder prefix including the trailing slash (`"bronze/"`).
    pub fn prefix(&self) -> String {
        format!("{}/", self.as_str())
    }

    /// Qualify a relative path with this tier's folder.
    pub fn blob_name(&self, relative: &str) -> String {
        format!("{}/{}", self.as_str(), relative.trim_start_matches('/'))
    }

    /// Strip this tier's folder from a blob name, if present.
    pub fn relative<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Move a blob name from one tier to another, keeping its relative path.
///
/// When `extension` is given, the final path segment's extension is replaced
/// (or added). Only the leading tier folder is substituted, so a relative
/// path that happens to contain the tier name elsewhere is left intact.
///
/// ```rust
/// use medallion_core::models::{retier, Tier};
///
/// let bronze = retier("raw/books/a.txt", Tier::Raw, Tier::Bronze, Some("parquet")).unwrap();
/// assert_eq!(bronze, "bronze/books/a.parquet");
/// ```
pub fn retier(name: &str, from: Tier, to: Tier, extension: Option<&str>) -> Option<String> {
    let relative = from.relative(name)?;
    let relative = match extension {
        Some(ext) => replace_extension(relative, ext),
        None => relative.to_string(),
    };
    Some(to.blob_name(&relative))
}

fn replace_extension(path: &str, ext: &str) -> String {
    let (dir, file) = match path.rfind('/') {
        Some(pos) => (&path[..=pos], &path[pos + 1..]),
        None => ("", path),
    };
    let stem = match file.rfind('.') {
        Some(0) | None => file,
        Some(pos) => &file[..pos],
    };
    format!("{}{}.{}", dir, stem, ext)
}

/// One logical document moving through the tiers.
///
/// `source_file` is the original raw blob name and never changes once the
/// record enters bronze. `word_count` is populated from silver onward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRecord {
    pub source_file: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<i64>,
}

/// A bounded-length slice of a silver record's content, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub source_file: String,
    /// Position of this chunk within its record, starting at 0.
    pub chunk_index: i64,
    /// Character offset of the first character of `text` within the content.
    pub offset: usize,
    pub text: String,
}
