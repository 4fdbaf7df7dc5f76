use std::path::PathBuf;

pub const DEFAULT_REPOS_PATH: &str = "./git/repos";
pub const DEFAULT_URL_PREFIX: &str = "/apis/v1/repos";
pub const DEFAULT_GIT_PREFIX: &str = "/git";

/// Where repositories live and where the two HTTP surfaces are mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub repos_path: PathBuf,
    pub url_prefix: String,
    pub git_prefix: String,
}

impl Config {
    pub fn new(repos_path: impl Into<PathBuf>) -> Self {
        Self {
            repos_path: repos_path.into(),
            ..Self::default()
        }
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = normalize_prefix(prefix.into());
        self
    }

    pub fn with_git_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.git_prefix = normalize_prefix(prefix.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repos_path: PathBuf::from(DEFAULT_REPOS_PATH),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            git_prefix: DEFAULT_GIT_PREFIX.to_string(),
        }
    }
}

/// `repos/` and `/repos` both become `/repos`; `/` becomes the empty prefix.
fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_normalized() {
        let config = Config::new("/srv/git")
            .with_url_prefix("api/repos/")
            .with_git_prefix("/");

        assert_eq!(config.repos_path, PathBuf::from("/srv/git"));
        assert_eq!(config.url_prefix, "/api/repos");
        assert_eq!(config.git_prefix, "");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.url_prefix, DEFAULT_URL_PREFIX);
        assert_eq!(config.git_prefix, DEFAULT_GIT_PREFIX);
    }
}
