use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bare Git repository below the managed root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// A namespace directory that holds repositories and nested groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Lightweight,
    Annotated,
}

/// A tag reference. Annotation fields are only present for annotated tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// Commit the tag ultimately points at.
    pub commit_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagger_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: TagKind,
}
