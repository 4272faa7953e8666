use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::Error;

/// Number of ID characters shown to humans and used for slug disambiguation.
pub const SHORT_ID_LEN: usize = 8;

/// A full note with all fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub category: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Provenance annotations. Not interpreted by the store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Note {
    /// Create a note with a fresh ID and `created == updated == now`.
    pub fn new(category: &str, title: &str, content: &str, tags: Vec<String>) -> Self {
        let now = Utc::now();
        let mut metadata = BTreeMap::new();
        metadata.insert("created_by".to_string(), "agent".to_string());
        metadata.insert("source".to_string(), "braindump".to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category: category.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            tags,
            created: now,
            updated: now,
            metadata,
        }
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// True if any tag of this note equals any of `wanted`, ignoring case.
    pub fn has_any_tag(&self, wanted: &[String]) -> bool {
        wanted.iter().any(|w| {
            let w = w.to_lowercase();
            self.tags.iter().any(|t| t.to_lowercase() == w)
        })
    }

    pub fn to_ref(&self) -> NoteRef {
        NoteRef {
            id: self.id.clone(),
            category: self.category.clone(),
            title: self.title.clone(),
        }
    }
}

pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Just enough of a note to tell candidates apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub id: String,
    pub category: String,
    pub title: String,
}

impl NoteRef {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Address of a durable record: `<category>/<file name>`, relative to the
/// store root. Always uses `/` regardless of platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(category: &str, file_name: &str) -> Self {
        Self(format!("{}/{}", category, file_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn category(&self) -> &str {
        self.0.split_once('/').map(|(c, _)| c).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.0.split_once('/').map(|(_, f)| f).unwrap_or(&self.0)
    }
}

/// Categories are directory names under the store root, so a category must
/// be one plain, visible path segment: non-empty, not starting with `.`, and
/// without `/` or `\`. Surrounding whitespace is rejected too.
pub fn validate_category(category: &str) -> Result<(), Error> {
    if category.trim().is_empty() {
        return Err(Error::Validation("category cannot be empty".into()));
    }
    if category.trim() != category
        || category.starts_with('.')
        || category.contains(['/', '\\'])
    {
        return Err(Error::Validation(format!(
            "invalid category \"{}\": must not start with '.' or contain path separators",
            category
        )));
    }
    Ok(())
}

impl From<String> for Location {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters for updating an existing note. `None` leaves a field as is.
#[derive(Debug, Default, Clone)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.category.is_none()
    }
}

/// Category with note count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// Outcome of rebuilding the index from durable records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub indexed: usize,
    pub skipped: usize,
}
