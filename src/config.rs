//! Run configuration.
//!
//! The target directory remembers how its site was produced in
//! `.gitsite.toml`. That file is read first, then values given on the command
//! line or in the environment replace the stored ones key by key. The merged
//! [`Config`] is built once at startup and only read afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILENAME: &str = ".gitsite.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid configuration in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no repository given, pass --repository")]
    MissingRepository,
    #[error("repository {0:?} does not exist")]
    RepositoryNotFound(PathBuf),
}

/// On-disk form, every key optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub project: Option<String>,
    pub repository: Option<PathBuf>,
    pub link: Option<String>,
    pub target: Option<PathBuf>,
    pub branches: Option<Vec<String>>,
    pub fingerprint: Option<String>,
}

impl StoredConfig {
    pub fn load(target: &Path) -> Result<Self, ConfigError> {
        let path = target.join(CONFIG_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// Values supplied for this run, from the command line or environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub project: Option<String>,
    pub repository: Option<PathBuf>,
    pub link: Option<String>,
    pub branches: Option<Vec<String>>,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project: String,
    pub repository: PathBuf,
    /// Public clone URL shown on the index page.
    pub link: Option<String>,
    pub target: PathBuf,
    /// Branches to publish, all backend branches when unset.
    pub branches: Option<Vec<String>>,
    /// Fingerprint of the generator that produced the current output.
    pub fingerprint: Option<String>,
    pub force: bool,
}

impl Config {
    /// Merges the stored configuration of `target` with `overrides`.
    pub fn load(target: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        let stored = StoredConfig::load(target)?;
        let repository = overrides
            .repository
            .or(stored.repository)
            .ok_or(ConfigError::MissingRepository)?;
        let project = overrides
            .project
            .or(stored.project)
            .unwrap_or_else(|| default_project(&repository));
        Ok(Config {
            project,
            repository,
            link: overrides.link.or(stored.link),
            target: target.to_owned(),
            branches: overrides.branches.or(stored.branches),
            fingerprint: stored.fingerprint,
            force: overrides.force,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.repository.exists() {
            return Err(ConfigError::RepositoryNotFound(self.repository.clone()));
        }
        Ok(())
    }

    /// Records this configuration in the target, with the fingerprint of the
    /// generator that produced the output.
    pub fn save(&self, fingerprint: &str) -> Result<(), ConfigError> {
        let stored = StoredConfig {
            project: Some(self.project.clone()),
            repository: Some(self.repository.clone()),
            link: self.link.clone(),
            target: Some(self.target.clone()),
            branches: self.branches.clone(),
            fingerprint: Some(fingerprint.to_owned()),
        };
        let path = self.target.join(CONFIG_FILENAME);
        let content = toml::to_string(&stored)?;
        fs::write(&path, content).map_err(|source| ConfigError::Write { path, source })
    }
}

/// Repository directory name without a `.git` suffix.
fn default_project(repository: &Path) -> String {
    let path = repository.canonicalize().unwrap_or_else(|_| repository.to_owned());
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".git") {
        Some(stripped) if !stripped.is_empty() => stripped.to_owned(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn overrides(repository: &str) -> Overrides {
        Overrides {
            repository: Some(repository.into()),
            ..Overrides::default()
        }
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(StoredConfig::load(tmp.path()).unwrap(), StoredConfig::default());
    }

    #[test]
    fn repository_is_required() {
        let tmp = TempDir::new().unwrap();
        let error = Config::load(tmp.path(), Overrides::default()).unwrap_err();
        assert!(matches!(error, ConfigError::MissingRepository));
    }

    #[test]
    fn project_defaults_to_repository_name() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(tmp.path(), overrides("/srv/git/demo.git")).unwrap();
        assert_eq!(config.project, "demo");
    }

    #[test]
    fn saved_values_are_loaded_back() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::load(tmp.path(), overrides("/srv/git/demo")).unwrap();
        config.link = Some("https://example.com/demo.git".into());
        config.branches = Some(vec!["main".into(), "dev".into()]);
        config.save("f1").unwrap();

        let loaded = Config::load(tmp.path(), Overrides::default()).unwrap();
        assert_eq!(loaded.repository, PathBuf::from("/srv/git/demo"));
        assert_eq!(loaded.link.as_deref(), Some("https://example.com/demo.git"));
        assert_eq!(loaded.branches, Some(vec!["main".into(), "dev".into()]));
        assert_eq!(loaded.fingerprint.as_deref(), Some("f1"));
        assert_eq!(loaded.target, tmp.path());
    }

    #[test]
    fn overrides_win_over_stored_values() {
        let tmp = TempDir::new().unwrap();
        Config::load(tmp.path(), overrides("/srv/git/old"))
            .unwrap()
            .save("f1")
            .unwrap();
        let config = Config::load(
            tmp.path(),
            Overrides {
                project: Some("renamed".into()),
                repository: Some("/srv/git/new".into()),
                force: true,
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.project, "renamed");
        assert_eq!(config.repository, PathBuf::from("/srv/git/new"));
        assert!(config.force);
        assert_eq!(config.fingerprint.as_deref(), Some("f1"));
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "project = [").unwrap();
        assert!(matches!(
            StoredConfig::load(tmp.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn nonexistent_repository_fails_validation() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(tmp.path(), overrides("/does/not/exist")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RepositoryNotFound(_))
        ));
    }
}
