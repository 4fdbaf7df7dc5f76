//! Error types for the repository manager

use std::fmt;
use std::io;

use thiserror::Error;

use crate::namespace::NameError;

/// Kind of stored object an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Repository,
    Group,
    Tag,
    Commit,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceType::Repository => "repository",
            ResourceType::Group => "group",
            ResourceType::Tag => "tag",
            ResourceType::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while managing repositories, groups and tags
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("invalid {kind} name: {source}")]
    InvalidName {
        kind: ResourceType,
        #[source]
        source: NameError,
    },

    #[error("invalid name {0:?}: \".git\" segments are reserved for repository directories")]
    ReservedName(String),

    #[error("tag name cannot be empty")]
    TagNameEmpty,

    #[error("invalid tag name: {0}")]
    InvalidTagName(String),

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ResourceType, name: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceType, name: String },

    #[error("{kind} is not empty: {name}")]
    NotEmpty { kind: ResourceType, name: String },

    #[error("not a group: {0}")]
    NotAGroup(String),

    #[error("{0}")]
    Conflict(String),

    #[error("failed to {op}: {source}")]
    Git {
        op: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("failed to {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Result type for repository manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;

impl ManagerError {
    pub(crate) fn not_found(kind: ResourceType, name: &str) -> Self {
        ManagerError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: ResourceType, name: &str) -> Self {
        ManagerError::AlreadyExists {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn git(op: &'static str) -> impl FnOnce(git2::Error) -> Self {
        move |source| ManagerError::Git { op, source }
    }

    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| ManagerError::Io { op, source }
    }
}
