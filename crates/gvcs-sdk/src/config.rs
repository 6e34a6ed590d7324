//! Repository configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults
//! (adjusted by the active [`Profile`]), `config.toml` inside the repository
//! directory, and `GRAPHVCS_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use gvcs_types::Author;

use crate::error::{SdkError, SdkResult};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "GRAPHVCS_";

/// Deployment profile, selected by `GRAPHVCS_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Test,
    Production,
}

impl Profile {
    pub fn default_log_level(self) -> &'static str {
        match self {
            Self::Development | Self::Test => "debug",
            Self::Production => "info",
        }
    }
}

impl FromStr for Profile {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(SdkError::Config(format!("unknown environment: {other}"))),
        }
    }
}

/// Identity recorded on commits when the caller supplies none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub repo_dir_name: String,
    pub objects_dir_name: String,
    pub refs_dir_name: String,
    pub commits_dir_name: String,
    /// Log files, relative to the repository directory. An absolute path
    /// is used as is.
    pub logs_dir_name: String,
    pub default_branch: String,
    /// zstd-compress objects in the filesystem store.
    pub compression_enabled: bool,
    /// Attribute values whose encoding exceeds this many bytes are stored
    /// as separate blobs.
    pub inline_threshold: usize,
    pub log_level: String,
    pub user: UserConfig,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            repo_dir_name: ".gvcs".into(),
            objects_dir_name: "objects".into(),
            refs_dir_name: "refs".into(),
            commits_dir_name: "commits".into(),
            logs_dir_name: "logs".into(),
            default_branch: "main".into(),
            compression_enabled: true,
            inline_threshold: gvcs_snapshot::DEFAULT_INLINE_THRESHOLD,
            log_level: "info".into(),
            user: UserConfig::default(),
        }
    }
}

impl RepoConfig {
    /// Defaults for a deployment profile.
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            log_level: profile.default_log_level().into(),
            ..Self::default()
        }
    }

    /// Defaults for the profile named by `GRAPHVCS_ENVIRONMENT`, with
    /// environment overrides applied.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`RepoConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SdkResult<Self> {
        let mut config = match lookup(&env_key("ENVIRONMENT")) {
            Some(name) => Self::for_profile(name.parse()?),
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Overlay `GRAPHVCS_*` variables onto this config.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> SdkResult<()> {
        if let Some(name) = lookup(&env_key("REPO_DIR_NAME")) {
            self.repo_dir_name = name;
        }
        if let Some(dir) = lookup(&env_key("LOGS_DIR")) {
            self.logs_dir_name = dir;
        }
        if let Some(level) = lookup(&env_key("LOG_LEVEL")) {
            self.log_level = level.to_ascii_lowercase();
        }
        if let Some(value) = lookup(&env_key("COMPRESSION_ENABLED")) {
            self.compression_enabled = parse_bool("COMPRESSION_ENABLED", &value)?;
        }
        if let Some(branch) = lookup(&env_key("DEFAULT_BRANCH")) {
            self.default_branch = branch;
        }
        if let Some(name) = lookup(&env_key("USER_NAME")) {
            self.user.name = Some(name);
        }
        if let Some(email) = lookup(&env_key("USER_EMAIL")) {
            self.user.email = Some(email);
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Read a `config.toml`.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> SdkResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Where log files go for a repository stored in `repo_dir`.
    pub fn logs_dir(&self, repo_dir: &Path) -> PathBuf {
        repo_dir.join(&self.logs_dir_name)
    }

    /// The configured identity, if both name and email are set.
    pub fn author(&self) -> Option<Author> {
        match (&self.user.name, &self.user.email) {
            (Some(name), Some(email)) => Some(Author::new(name.clone(), email.clone())),
            _ => None,
        }
    }
}

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

fn parse_bool(name: &str, value: &str) -> SdkResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SdkError::Config(format!(
            "{ENV_PREFIX}{name}: expected a boolean, got {value:?}"
        ))),
    }
}
