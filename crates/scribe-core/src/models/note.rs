//! Note model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use super::tag::Tag;
use crate::error::{Error, Result};
use crate::util::{normalize_text_option, now_millis};

/// Identifier of a note.
///
/// Synced notes carry the id assigned by the server. Notes created while
/// offline get a client-generated UUID v7 that stays temporary until the
/// queued create is replayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh client-side id (UUID v7, time-sortable)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("note id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A cached note record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    pub title: String,
    /// Markdown content
    pub content: String,
    pub category: Option<String>,
    /// Ordered, denormalized tag list
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms), authority for conflict detection
    pub updated_at: i64,
    /// Cached AI summary, if one was generated
    #[serde(default)]
    pub summary: Option<String>,
}

impl Note {
    /// Build a fresh local record from a mutation payload, stamped with the current time
    #[must_use]
    pub fn from_payload(id: NoteId, payload: &NotePayload) -> Self {
        let now = now_millis();
        Self {
            id,
            title: payload.title.clone(),
            content: payload.content.clone(),
            category: payload.category.clone(),
            tags: payload.tags.iter().map(Tag::new).collect(),
            created_at: now,
            updated_at: now,
            summary: None,
        }
    }

    /// Apply a payload to this record, bumping `updated_at` to now.
    ///
    /// Tags whose name is unchanged keep their id.
    pub fn apply_payload(&mut self, payload: &NotePayload) {
        let previous = std::mem::take(&mut self.tags);
        self.tags = payload
            .tags
            .iter()
            .map(|name| {
                previous
                    .iter()
                    .find(|tag| tag.name == *name)
                    .cloned()
                    .unwrap_or_else(|| Tag::new(name))
            })
            .collect();
        self.title.clone_from(&payload.title);
        self.content.clone_from(&payload.content);
        self.category.clone_from(&payload.category);
        self.updated_at = now_millis().max(self.updated_at);
    }

    /// Snapshot this record as a mutation payload
    #[must_use]
    pub fn payload(&self) -> NotePayload {
        NotePayload {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category.clone(),
            tags: self.tag_names(),
        }
    }

    /// Tag names in stored order
    #[must_use]
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.name.clone()).collect()
    }

    /// Get first line of content as a preview, truncated to `max_len` characters
    #[must_use]
    pub fn content_preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

/// The values a mutation applies to a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NotePayload {
    /// Build a normalized payload
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: Option<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let tags = tags.into_iter().map(Into::into).collect::<Vec<String>>();
        Self {
            title: title.into().trim().to_string(),
            content: content.into(),
            category: normalize_text_option(category),
            tags: normalize_tags(tags),
        }
    }

    /// Check the payload is acceptable to the server
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("note title cannot be empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(Error::InvalidInput("note content cannot be empty".into()));
        }
        if let Some(category) = &self.category {
            if !category_pattern().is_match(category) {
                return Err(Error::InvalidInput(format!(
                    "category '{category}' cannot contain whitespace"
                )));
            }
        }
        Ok(())
    }

    /// Tags as the comma-joined form used by form submissions
    #[must_use]
    pub fn tags_csv(&self) -> String {
        self.tags.join(",")
    }
}

fn category_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\S*$").expect("Invalid regex"))
}

/// Parse a comma-separated tag list
///
/// Names are trimmed, empties dropped and duplicates removed, keeping the
/// first occurrence.
///
/// # Examples
///
/// ```
/// use scribe_core::models::parse_tags;
///
/// assert_eq!(parse_tags("rust, notes,,rust"), vec!["rust", "notes"]);
/// ```
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(',').map(str::to_string))
}

fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
