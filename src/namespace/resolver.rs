//! Classification of wildcard paths into repositories, groups and tags.
//!
//! Repository names, group names and the tag sub-namespace share a single URL
//! space below the API prefix:
//!
//! | Path                         | Kind            | Name       | Tag              |
//! | ---------------------------- | --------------- | ---------- | ---------------- |
//! | `/org/app`                   | `Repository`    | `org/app`  |                  |
//! | `/org`                       | `Group`         | `org`      |                  |
//! | `/org/app/tags`              | `TagCollection` | `org/app`  |                  |
//! | `/org/app/tags/release/v1.0` | `TagItem`       | `org/app`  | `release/v1.0`   |
//!
//! The first complete `tags` segment always starts the tag sub-namespace, so a
//! repository whose name contains a real `tags` segment (`org/tags/thing`)
//! cannot be addressed directly. There is no escape syntax.

use std::fmt;

use crate::namespace::{SEPARATOR, is_valid_name};

/// Segment that switches from the repository namespace to its tags.
pub const TAGS_MARKER: &str = "/tags";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Repository,
    Group,
    TagCollection,
    TagItem,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Repository => "repository",
            ResourceKind::Group => "group",
            ResourceKind::TagCollection => "tag collection",
            ResourceKind::TagItem => "tag",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful resolution. `tag` is set only for
/// [`ResourceKind::TagItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    kind: ResourceKind,
    name: String,
    tag: Option<String>,
}

impl ResolvedRequest {
    pub fn repository(name: impl Into<String>) -> Self {
        Self::without_tag(ResourceKind::Repository, name)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::without_tag(ResourceKind::Group, name)
    }

    pub fn tag_collection(name: impl Into<String>) -> Self {
        Self::without_tag(ResourceKind::TagCollection, name)
    }

    pub fn tag_item(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::TagItem,
            name: name.into(),
            tag: Some(tag.into()),
        }
    }

    fn without_tag(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            tag: None,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Repository or group name the path addresses.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Read-only view of the store used to tell repositories from groups.
///
/// Implementations must be side-effect free. At most one of `is_repository`
/// and `is_group` is expected to hold for a name; if both do, the resolver
/// picks the repository.
pub trait ExistenceOracle {
    type Error;

    fn is_repository(&self, name: &str) -> bool;

    fn is_group(&self, name: &str) -> bool;

    /// Like `is_repository`, but distinguishes "absent" from a failure to
    /// look.
    fn repository_exists(&self, name: &str) -> Result<bool, Self::Error>;
}

/// Byte offset of the first `/tags` occurrence that forms a whole segment,
/// i.e. is followed by the end of the path or by a separator.
pub fn find_tags_marker(path: &str) -> Option<usize> {
    let mut offset = 0;

    while let Some(found) = path[offset..].find(TAGS_MARKER) {
        let start = offset + found;
        let end = start + TAGS_MARKER.len();

        if end == path.len() || path[end..].starts_with(SEPARATOR) {
            return Some(start);
        }

        offset = end;
    }

    None
}

/// Resolves a wildcard path against the store.
///
/// `Ok(None)` means the path addresses nothing: the name is malformed, does
/// not exist, or the tag sub-path is malformed. Callers report all of these
/// the same way. `Err` only carries store failures from
/// [`ExistenceOracle::repository_exists`].
pub fn resolve<O>(raw_path: &str, oracle: &O) -> Result<Option<ResolvedRequest>, O::Error>
where
    O: ExistenceOracle + ?Sized,
{
    let path = raw_path.strip_prefix(SEPARATOR).unwrap_or(raw_path);
    if path.is_empty() {
        return Ok(None);
    }

    let Some(marker) = find_tags_marker(path) else {
        if !is_valid_name(path) {
            return Ok(None);
        }

        if oracle.is_repository(path) {
            return Ok(Some(ResolvedRequest::repository(path)));
        }

        if oracle.is_group(path) {
            return Ok(Some(ResolvedRequest::group(path)));
        }

        return Ok(None);
    };

    let name = &path[..marker];
    let name = name.strip_suffix(SEPARATOR).unwrap_or(name);
    if name.is_empty() || !is_valid_name(name) {
        return Ok(None);
    }

    // Tags hang off repositories only.
    if !oracle.repository_exists(name)? {
        return Ok(None);
    }

    let rest = &path[marker + TAGS_MARKER.len()..];
    if rest.is_empty() {
        return Ok(Some(ResolvedRequest::tag_collection(name)));
    }

    let Some(tag) = rest.strip_prefix(SEPARATOR) else {
        return Ok(None);
    };

    if tag.is_empty() {
        return Ok(None);
    }

    Ok(Some(ResolvedRequest::tag_item(name, tag)))
}
