//! Filesystem backed store for repositories, groups and tags
//!
//! Every name is validated before it is joined onto the root, so a stored
//! object always lives below [`RepositoryManager::root`]. The on-disk layout
//! is:
//!
//! ```text
//! <root>/
//! ├── org/                 group "org"
//! │   ├── .groupinfo       group description (optional)
//! │   ├── app.git/         bare repository "org/app"
//! │   └── team/            group "org/team"
//! └── tools.git/           bare repository "tools"
//! ```
//!
//! Existence checks and the create/delete operations below are not atomic
//! with respect to each other. Creates claim their final directory with a
//! single `create_dir`, so two racing creates of the same name cannot both
//! succeed.

pub mod error;
pub mod model;

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use git2::{ConfigLevel, ErrorCode, Oid, Signature};
use log::{info, warn};

pub use error::*;
pub use model::*;

use crate::namespace::{ExistenceOracle, SEPARATOR, validate_name};

const REPOSITORY_SUFFIX: &str = ".git";
const GROUP_INFO_FILE: &str = ".groupinfo";
const DESCRIPTION_KEY: &str = "repository.description";
const RECEIVE_PACK_KEY: &str = "http.receivepack";

pub struct RepositoryManager {
    root: PathBuf,
}

impl RepositoryManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base directory where repositories and groups are stored
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{REPOSITORY_SUFFIX}"))
    }

    fn group_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn check_name(kind: ResourceType, name: &str) -> ManagerResult<()> {
        validate_name(name).map_err(|source| ManagerError::InvalidName { kind, source })
    }

    /// A repository may not live inside another repository's directory.
    fn check_repository_name(name: &str) -> ManagerResult<()> {
        Self::check_name(ResourceType::Repository, name)?;
        if inside_repository(name) {
            return Err(ManagerError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    /// Name of `path` relative to the root, with `/` separators
    fn relative_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|component| match component {
                Component::Normal(segment) => segment.to_str(),
                _ => None,
            })
            .collect();

        segments.map(|segments| segments.join("/"))
    }

    /// Creates a new bare Git repository
    pub fn create_repository(&self, name: &str, description: &str) -> ManagerResult<Repository> {
        Self::check_repository_name(name)?;

        let path = self.repository_path(name);
        if path.exists() {
            return Err(ManagerError::already_exists(ResourceType::Repository, name));
        }

        if self.is_group(name) {
            return Err(ManagerError::Conflict(format!("group with name already exists: {name}")));
        }

        // For multi-level names like "org/app" this creates "org" as well.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ManagerError::io("create parent directories"))?;
        }

        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ManagerError::already_exists(ResourceType::Repository, name));
            }
            Err(e) => return Err(ManagerError::io("create repository directory")(e)),
        }

        let repo = match git2::Repository::init_bare(&path) {
            Ok(repo) => repo,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&path) {
                    warn!("Failed to clean up repository directory {}: {cleanup}", path.display());
                }
                return Err(ManagerError::git("initialize git repository")(e));
            }
        };

        if let Err(e) = write_repository_config(&repo, description) {
            warn!("Failed to save config for repository {name}: {e}");
        }

        let created_at = modified_time(&path).map_err(ManagerError::io("stat repository"))?;

        info!("Repository created: {name} at {}", path.display());

        Ok(Repository {
            name: name.to_string(),
            description: description.to_string(),
            path,
            created_at,
        })
    }

    /// Retrieves a repository by name
    pub fn get_repository(&self, name: &str) -> ManagerResult<Repository> {
        Self::check_repository_name(name)?;

        let path = self.repository_path(name);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => return Err(ManagerError::not_found(ResourceType::Repository, name)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManagerError::not_found(ResourceType::Repository, name));
            }
            Err(e) => return Err(ManagerError::io("stat repository")(e)),
        };

        // Fail on anything that is not actually a repository.
        git2::Repository::open_bare(&path).map_err(ManagerError::git("open repository"))?;

        Ok(Repository {
            name: name.to_string(),
            description: repository_description(&path),
            created_at: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .map_err(ManagerError::io("stat repository"))?,
            path,
        })
    }

    /// Lists every repository below the root, sorted by name
    pub fn list_repositories(&self) -> ManagerResult<Vec<Repository>> {
        let mut repositories = Vec::new();

        for path in self.walk()? {
            let Some(name) = self.relative_name(&path) else {
                warn!("Skipping repository with unrepresentable path {}", path.display());
                continue;
            };
            let Some(name) = name.strip_suffix(REPOSITORY_SUFFIX) else {
                continue;
            };

            let created_at = match modified_time(&path) {
                Ok(created_at) => created_at,
                Err(e) => {
                    warn!("Failed to get info for repository {name}: {e}");
                    continue;
                }
            };

            repositories.push(Repository {
                name: name.to_string(),
                description: repository_description(&path),
                path,
                created_at,
            });
        }

        repositories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repositories)
    }

    /// Deletes a repository and everything in it
    pub fn delete_repository(&self, name: &str) -> ManagerResult<()> {
        Self::check_repository_name(name)?;

        let path = self.repository_path(name);
        if !path.is_dir() {
            return Err(ManagerError::not_found(ResourceType::Repository, name));
        }

        fs::remove_dir_all(&path).map_err(ManagerError::io("delete repository directory"))?;

        info!("Repository deleted: {name} at {}", path.display());
        Ok(())
    }

    /// Creates a new group (namespace/organization)
    pub fn create_group(&self, name: &str, description: &str) -> ManagerResult<Group> {
        Self::check_name(ResourceType::Group, name)?;

        if !is_group_name(name) {
            return Err(ManagerError::ReservedName(name.to_string()));
        }

        let path = self.group_path(name);
        if path.exists() {
            return Err(ManagerError::already_exists(ResourceType::Group, name));
        }

        if self.repository_path(name).exists() {
            return Err(ManagerError::Conflict(format!(
                "repository with name already exists: {name}"
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ManagerError::io("create parent directories"))?;
        }

        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ManagerError::already_exists(ResourceType::Group, name));
            }
            Err(e) => return Err(ManagerError::io("create group directory")(e)),
        }

        if !description.is_empty()
            && let Err(e) = fs::write(path.join(GROUP_INFO_FILE), description)
        {
            warn!("Failed to write group info for {name}: {e}");
        }

        let created_at = modified_time(&path).map_err(ManagerError::io("stat group"))?;

        info!("Group created: {name} at {}", path.display());

        Ok(Group {
            name: name.to_string(),
            description: description.to_string(),
            path,
            created_at,
        })
    }

    /// Retrieves a group by name
    pub fn get_group(&self, name: &str) -> ManagerResult<Group> {
        Self::check_name(ResourceType::Group, name)?;

        if !is_group_name(name) {
            return Err(ManagerError::NotAGroup(name.to_string()));
        }

        let path = self.group_path(name);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManagerError::not_found(ResourceType::Group, name));
            }
            Err(e) => return Err(ManagerError::io("stat group")(e)),
        };

        if !metadata.is_dir() {
            return Err(ManagerError::NotAGroup(name.to_string()));
        }

        Ok(Group {
            name: name.to_string(),
            description: group_description(&path),
            created_at: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .map_err(ManagerError::io("stat group"))?,
            path,
        })
    }

    /// Lists every group below the root, sorted by name
    pub fn list_groups(&self) -> ManagerResult<Vec<Group>> {
        let mut groups = Vec::new();

        for path in self.walk()? {
            let Some(name) = self.relative_name(&path) else {
                warn!("Skipping group with unrepresentable path {}", path.display());
                continue;
            };
            if name.ends_with(REPOSITORY_SUFFIX) {
                continue;
            }

            let created_at = match modified_time(&path) {
                Ok(created_at) => created_at,
                Err(e) => {
                    warn!("Failed to get info for group {name}: {e}");
                    continue;
                }
            };

            groups.push(Group {
                description: group_description(&path),
                name,
                path,
                created_at,
            });
        }

        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    /// Deletes a group. Only groups without repositories or subgroups can be
    /// deleted.
    pub fn delete_group(&self, name: &str) -> ManagerResult<()> {
        Self::check_name(ResourceType::Group, name)?;

        let path = self.group_path(name);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManagerError::not_found(ResourceType::Group, name));
            }
            Err(e) => return Err(ManagerError::io("stat group")(e)),
        };

        if !metadata.is_dir() || !is_group_name(name) {
            return Err(ManagerError::NotAGroup(name.to_string()));
        }

        let entries = fs::read_dir(&path).map_err(ManagerError::io("read group directory"))?;
        for entry in entries {
            let entry = entry.map_err(ManagerError::io("read group directory"))?;
            if entry.file_name() != GROUP_INFO_FILE {
                return Err(ManagerError::NotEmpty {
                    kind: ResourceType::Group,
                    name: name.to_string(),
                });
            }
        }

        fs::remove_dir_all(&path).map_err(ManagerError::io("delete group directory"))?;

        info!("Group deleted: {name} at {}", path.display());
        Ok(())
    }

    /// Directory of an existing repository, for handing over to the Git
    /// protocol engine
    pub fn repository_dir(&self, name: &str) -> ManagerResult<PathBuf> {
        Self::check_repository_name(name)?;

        let path = self.repository_path(name);
        if !path.is_dir() {
            return Err(ManagerError::not_found(ResourceType::Repository, name));
        }

        Ok(path)
    }

    /// Whether pushes over HTTP are enabled for a repository
    pub fn receive_pack_enabled(&self, name: &str) -> ManagerResult<bool> {
        let repo = self.open_repository(name)?;
        let config = repo.config().map_err(ManagerError::git("open repository config"))?;

        match config.get_bool(RECEIVE_PACK_KEY) {
            Ok(enabled) => Ok(enabled),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(ManagerError::git("read repository config")(e)),
        }
    }

    fn open_repository(&self, name: &str) -> ManagerResult<git2::Repository> {
        let path = self.repository_dir(name)?;
        git2::Repository::open_bare(&path).map_err(ManagerError::git("open repository"))
    }

    /// Creates a tag on `commit_hash`, or on HEAD when no commit is given.
    /// The tag is annotated when a non-empty message is given and lightweight
    /// otherwise.
    pub fn create_tag(
        &self,
        repo_name: &str,
        tag_name: &str,
        commit_hash: Option<&str>,
        message: Option<&str>,
        tagger: Option<&str>,
    ) -> ManagerResult<Tag> {
        if tag_name.is_empty() {
            return Err(ManagerError::TagNameEmpty);
        }

        let repo = self.open_repository(repo_name)?;

        let target = match commit_hash.filter(|hash| !hash.is_empty()) {
            Some(hash) => repo
                .revparse_single(hash)
                .and_then(|object| object.peel_to_commit())
                .map_err(|e| commit_lookup_error(e, hash))?,
            None => repo
                .head()
                .and_then(|head| head.peel_to_commit())
                .map_err(|e| commit_lookup_error(e, "HEAD"))?,
        };

        match message.filter(|message| !message.is_empty()) {
            Some(message) => {
                let committer = target.committer();
                let signature = match tagger.filter(|tagger| !tagger.is_empty()) {
                    Some(tagger) => Signature::new(tagger, committer.email().unwrap_or("unknown"), &committer.when())
                        .map_err(ManagerError::git("build tagger signature"))?,
                    None => committer.to_owned(),
                };

                repo.tag(tag_name, target.as_object(), &signature, message, false)
                    .map_err(|e| tag_write_error(e, tag_name))?;
            }
            None => {
                repo.tag_lightweight(tag_name, target.as_object(), false)
                    .map_err(|e| tag_write_error(e, tag_name))?;
            }
        }

        info!("Tag created: {repo_name} {tag_name} -> {}", target.id());

        describe_tag(&repo, tag_name)
    }

    /// Retrieves a single tag
    pub fn get_tag(&self, repo_name: &str, tag_name: &str) -> ManagerResult<Tag> {
        if tag_name.is_empty() {
            return Err(ManagerError::TagNameEmpty);
        }

        let repo = self.open_repository(repo_name)?;
        describe_tag(&repo, tag_name)
    }

    /// Lists all tags of a repository, sorted by name
    pub fn list_tags(&self, repo_name: &str) -> ManagerResult<Vec<Tag>> {
        let repo = self.open_repository(repo_name)?;
        let names = repo.tag_names(None).map_err(ManagerError::git("list tags"))?;

        let mut tags = Vec::with_capacity(names.len());
        for name in names.iter().flatten() {
            tags.push(describe_tag(&repo, name)?);
        }

        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    /// Deletes a tag reference
    pub fn delete_tag(&self, repo_name: &str, tag_name: &str) -> ManagerResult<()> {
        if tag_name.is_empty() {
            return Err(ManagerError::TagNameEmpty);
        }

        let repo = self.open_repository(repo_name)?;
        repo.tag_delete(tag_name).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::InvalidSpec => ManagerError::not_found(ResourceType::Tag, tag_name),
            _ => ManagerError::git("delete tag")(e),
        })?;

        info!("Tag deleted: {repo_name} {tag_name}");
        Ok(())
    }

    /// Every directory below the root, repositories included but not
    /// descended into
    fn walk(&self) -> ManagerResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        if !self.root.is_dir() {
            return Ok(found);
        }

        let mut stack = vec![self.root.clone()];
        while let Some(current) = stack.pop() {
            let entries = fs::read_dir(&current).map_err(ManagerError::io("walk repositories directory"))?;

            for entry in entries {
                let entry = entry.map_err(ManagerError::io("walk repositories directory"))?;
                let path = entry.path();
                if !is_walkable_dir(&path, entry.file_type()) {
                    continue;
                }

                if !entry.file_name().to_string_lossy().ends_with(REPOSITORY_SUFFIX) {
                    stack.push(path.clone());
                }
                found.push(path);
            }
        }

        Ok(found)
    }
}

impl ExistenceOracle for RepositoryManager {
    type Error = ManagerError;

    fn is_repository(&self, name: &str) -> bool {
        validate_name(name).is_ok() && !inside_repository(name) && self.repository_path(name).is_dir()
    }

    fn is_group(&self, name: &str) -> bool {
        validate_name(name).is_ok() && is_group_name(name) && self.group_path(name).is_dir()
    }

    fn repository_exists(&self, name: &str) -> ManagerResult<bool> {
        if validate_name(name).is_err() || inside_repository(name) {
            return Ok(false);
        }

        match fs::metadata(self.repository_path(name)) {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ManagerError::io("stat repository")(e)),
        }
    }
}

/// Whether a segment before the last one ends in `.git`, i.e. the name
/// points into a repository directory
/// Entries whose type cannot be read are logged and left out of listings
fn is_walkable_dir(path: &Path, file_type: io::Result<fs::FileType>) -> bool {
    match file_type {
        Ok(file_type) => file_type.is_dir(),
        Err(e) => {
            warn!("Skipping {} while walking repositories: {e}", path.display());
            false
        }
    }
}

fn inside_repository(name: &str) -> bool {
    name.rsplit_once(SEPARATOR).is_some_and(|(parent, _)| {
        parent
            .split(SEPARATOR)
            .any(|segment| segment.ends_with(REPOSITORY_SUFFIX))
    })
}

/// Group names may not have a `.git` segment anywhere
fn is_group_name(name: &str) -> bool {
    !name.split(SEPARATOR).any(|segment| segment.ends_with(REPOSITORY_SUFFIX))
}

fn write_repository_config(repo: &git2::Repository, description: &str) -> Result<(), git2::Error> {
    let mut config = repo.config()?.open_level(ConfigLevel::Local)?;
    config.set_bool(RECEIVE_PACK_KEY, true)?;
    if !description.is_empty() {
        config.set_str(DESCRIPTION_KEY, description)?;
    }
    Ok(())
}

/// Description from the repository config; empty when unset or unreadable
fn repository_description(path: &Path) -> String {
    let description = git2::Repository::open_bare(path)
        .and_then(|repo| repo.config())
        .and_then(|config| config.get_string(DESCRIPTION_KEY));

    match description {
        Ok(description) => description,
        Err(e) if e.code() == ErrorCode::NotFound => String::new(),
        Err(e) => {
            warn!("Failed to read description of {}: {e}", path.display());
            String::new()
        }
    }
}

/// Contents of `.groupinfo`; empty when missing or unreadable
fn group_description(path: &Path) -> String {
    match fs::read_to_string(path.join(GROUP_INFO_FILE)) {
        Ok(description) => description,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            warn!("Failed to read group info of {}: {e}", path.display());
            String::new()
        }
    }
}

fn modified_time(path: &Path) -> io::Result<DateTime<Utc>> {
    let modified: SystemTime = fs::metadata(path)?.modified()?;
    Ok(modified.into())
}

fn commit_lookup_error(e: git2::Error, reference: &str) -> ManagerError {
    match e.code() {
        ErrorCode::NotFound | ErrorCode::UnbornBranch | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
            ManagerError::not_found(ResourceType::Commit, reference)
        }
        _ => ManagerError::git("resolve commit")(e),
    }
}

fn tag_write_error(e: git2::Error, tag_name: &str) -> ManagerError {
    match e.code() {
        ErrorCode::Exists => ManagerError::already_exists(ResourceType::Tag, tag_name),
        ErrorCode::InvalidSpec => ManagerError::InvalidTagName(tag_name.to_string()),
        _ => ManagerError::git("create tag")(e),
    }
}

fn describe_tag(repo: &git2::Repository, tag_name: &str) -> ManagerResult<Tag> {
    let reference = repo
        .find_reference(&format!("refs/tags/{tag_name}"))
        .map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::InvalidSpec => ManagerError::not_found(ResourceType::Tag, tag_name),
            _ => ManagerError::git("find tag")(e),
        })?;

    let target: Oid = reference
        .target()
        .ok_or_else(|| ManagerError::not_found(ResourceType::Tag, tag_name))?;

    let tag = match repo.find_tag(target) {
        Ok(annotated) => {
            let tagger = annotated.tagger();
            Tag {
                name: tag_name.to_string(),
                commit_hash: annotated.target_id().to_string(),
                message: Some(annotated.message().unwrap_or_default().to_string()),
                tagger: tagger.as_ref().and_then(|s| s.name()).map(str::to_string),
                tagger_date: tagger
                    .as_ref()
                    .and_then(|s| DateTime::from_timestamp(s.when().seconds(), 0)),
                kind: TagKind::Annotated,
            }
        }
        Err(_) => Tag {
            name: tag_name.to_string(),
            commit_hash: target.to_string(),
            message: None,
            tagger: None,
            tagger_date: None,
            kind: TagKind::Lightweight,
        },
    };

    Ok(tag)
}
