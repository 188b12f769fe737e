//! Configuration management with layered hierarchy

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::policy::{Family, IndexPolicy};
use crate::core::store::StoreOptions;
use crate::yaml::{YamlError, YamlSyntaxError};

/// Environment variable naming an extra config file
pub const CONFIG_ENV: &str = "NAVTREE_CONFIG";
pub const AUTHOR_ENV: &str = "NAVTREE_AUTHOR";
pub const DATABASE_ENV: &str = "NAVTREE_DB";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Engine configuration with layered hierarchy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Actor recorded on containers when no explicit one is given
    pub author: Option<String>,

    /// Path of the SQLite store
    pub database: Option<PathBuf>,

    /// How long a writer waits on a locked store
    pub busy_timeout_ms: Option<u64>,

    /// Index policy overrides keyed by family name
    pub families: BTreeMap<String, IndexPolicy>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    ///
    /// Unreadable or invalid files are skipped with a warning.
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/navtree/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.merge_file(&global_path);
            }
        }

        // 3. Explicit config file
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            config.merge_file(Path::new(&path));
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    /// Parse one config file
    pub fn from_file(path: &Path) -> Result<Self, YamlError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&contents, &path.display().to_string())?)
    }

    /// Parse config text; `filename` labels diagnostics
    pub fn from_yaml(source: &str, filename: &str) -> Result<Self, YamlSyntaxError> {
        let config: Config = serde_yml::from_str(source)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, source, filename))?;

        for (name, policy) in &config.families {
            if let Err(message) = policy.validate() {
                let line = source
                    .lines()
                    .position(|l| l.trim_start().starts_with(&format!("{name}:")))
                    .map_or(1, |n| n + 1);
                return Err(YamlSyntaxError::at_location(
                    format!("invalid index policy for family '{name}': {message}"),
                    source,
                    filename,
                    line,
                    1,
                    Some(format!(
                        "Use a base between 0 and {} and a step between 1 and {}",
                        IndexPolicy::MAX_BASE,
                        IndexPolicy::MAX_STEP
                    )),
                ));
            }
        }

        Ok(config)
    }

    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "navtree")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn default_database_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "navtree")
            .map(|dirs| dirs.data_dir().join("entries.db"))
            .unwrap_or_else(|| PathBuf::from("entries.db"))
    }

    fn merge_file(&mut self, path: &Path) {
        match Self::from_file(path) {
            Ok(other) => self.merge(other),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping config file"),
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(author) = lookup(AUTHOR_ENV) {
            self.author = Some(author);
        }
        if let Some(database) = lookup(DATABASE_ENV) {
            self.database = Some(PathBuf::from(database));
        }
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.busy_timeout_ms.is_some() {
            self.busy_timeout_ms = other.busy_timeout_ms;
        }
        self.families.extend(other.families);
    }

    /// The default actor, falling back to the login name
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "system".to_string())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(Self::default_database_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(
                self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
            ..Default::default()
        }
    }

    /// Index policy of a family: configured override, then built-in default
    pub fn policy_for(&self, family: &str) -> IndexPolicy {
        if let Some(policy) = self.families.get(family) {
            return *policy;
        }
        match family {
            Family::PROFILE_ENTRY => IndexPolicy::PROFILE_ENTRY,
            _ => IndexPolicy::MENU,
        }
    }

    pub fn family(&self, name: &str) -> Family {
        Family::new(name, self.policy_for(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.policy_for(Family::APPLICATION_MENU), IndexPolicy::MENU);
        assert_eq!(
            config.policy_for(Family::PROFILE_ENTRY),
            IndexPolicy::PROFILE_ENTRY
        );
        assert_eq!(
            config.store_options().busy_timeout,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_from_yaml_with_family_override() {
        let config = Config::from_yaml(
            "author: alice\nbusy_timeout_ms: 250\nfamilies:\n  profile_entry: { base: 10, step: 5 }\n",
            "config.yaml",
        )
        .unwrap();

        assert_eq!(config.author(), "alice");
        assert_eq!(config.store_options().busy_timeout, Duration::from_millis(250));
        assert_eq!(
            config.family(Family::PROFILE_ENTRY).policy(),
            IndexPolicy { base: 10, step: 5 }
        );
        assert_eq!(config.policy_for(Family::APPLICATION_MENU), IndexPolicy::MENU);
    }

    #[test]
    fn test_invalid_policy_is_a_diagnostic() {
        let source = "families:\n  application_menu: { base: 1, step: 0 }\n";
        let err = Config::from_yaml(source, "config.yaml").unwrap_err();
        assert!(err.message().contains("application_menu"));
        assert_eq!(err.offset(), 10);
    }

    #[test]
    fn test_oversized_policy_is_rejected() {
        let source = "families:\n  big: { base: 0, step: 9223372036854775807 }\n";
        let err = Config::from_yaml(source, "config.yaml").unwrap_err();
        assert!(err.message().contains("big"));
        assert!(Config::from_yaml("families:\n  big: { base: 9223372036854775807, step: 1 }\n", "c.yaml").is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_yaml("autor: alice\n", "config.yaml").is_err());
    }

    #[test]
    fn test_merge_and_env_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "author: file-author\ndatabase: /tmp/file.db\n").unwrap();

        let mut config = Config {
            author: Some("global".into()),
            busy_timeout_ms: Some(100),
            ..Default::default()
        };
        config.merge(Config::from_file(&path).unwrap());
        assert_eq!(config.author(), "file-author");
        assert_eq!(config.busy_timeout_ms, Some(100));

        let env = HashMap::from([(DATABASE_ENV, "/tmp/env.db")]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/env.db"));
        assert_eq!(config.author(), "file-author");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, YamlError::Io(_)));
    }
}
