//! Runtime configuration for a relgate run.
//!
//! # Config file: `.relgaterc`
//!
//! TOML files, merged in order:
//!
//! - **Global**: `~/.relgaterc`
//! - **Local**: `.relgaterc` or `.relgate/.relgaterc`, searched upward from
//!   the working directory; overrides global values
//!
//! ```toml
//! project_key = "ZZZ"
//! remote_name = "origin"
//! git_enabled = true
//! error_policy = "record"      # or "abort"
//! status_rule = "zero-is-ok"   # or "truthy"
//! commit_cache_size = 1024
//! ```
//!
//! All fields are optional. Command line flags override both files.

use crate::checks::{EngineOptions, ErrorPolicy, StatusRule};
use anyhow::{Context, Result};
use relgate_git::ResolverOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const RC_FILE: &str = ".relgaterc";

/// TOML-friendly intermediate representation (all fields optional).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    project_key: Option<String>,
    remote_name: Option<String>,
    git_enabled: Option<bool>,
    error_policy: Option<ErrorPolicy>,
    status_rule: Option<StatusRule>,
    commit_cache_size: Option<usize>,
}

/// # Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | `project_key` | `"ZZZ"` |
/// | `remote_name` | `"origin"` |
/// | `git_enabled` | `true` |
/// | `error_policy` | `abort` |
/// | `status_rule` | `zero-is-ok` |
/// | `commit_cache_size` | `1024` |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Commit messages must start with `<project_key>-`.
    pub project_key: String,
    /// Remote whose branches are searched for containment.
    pub remote_name: String,
    /// Whether the `git` namespace is populated at all.
    pub git_enabled: bool,
    pub error_policy: ErrorPolicy,
    pub status_rule: StatusRule,
    /// Commits kept in memory per opened repository.
    pub commit_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_key: "ZZZ".to_string(),
            remote_name: "origin".to_string(),
            git_enabled: true,
            error_policy: ErrorPolicy::Abort,
            status_rule: StatusRule::ZeroIsOk,
            commit_cache_size: 1024,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `~/.relgaterc` and the nearest local `.relgaterc` on top of
    /// the defaults. A broken global file is logged and ignored; a broken
    /// local file is an error.
    pub fn load(start_dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::find_global_config() {
            match read_file(&global_path) {
                Ok(file) => config.merge(file),
                Err(e) => tracing::warn!(file = %global_path.display(), error = %format!("{:#}", e), "ignoring global config"),
            }
        }

        if let Some(local_path) = Self::find_local_config(start_dir) {
            tracing::debug!(file = %local_path.display(), "loading local config");
            config.merge(read_file(&local_path)?);
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge(read_file(path)?);
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(toml_str).context("Failed to parse config")?;
        let mut config = Self::default();
        config.merge(file);
        Ok(config)
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(key) = file.project_key {
            self.project_key = key;
        }
        if let Some(remote) = file.remote_name {
            self.remote_name = remote;
        }
        if let Some(enabled) = file.git_enabled {
            self.git_enabled = enabled;
        }
        if let Some(policy) = file.error_policy {
            self.error_policy = policy;
        }
        if let Some(rule) = file.status_rule {
            self.status_rule = rule;
        }
        if let Some(size) = file.commit_cache_size {
            self.commit_cache_size = size;
        }
    }

    fn find_global_config() -> Option<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(RC_FILE))
            .filter(|p| p.is_file())
    }

    /// Walks up from `start_dir` looking for `.relgaterc` or
    /// `.relgate/.relgaterc`.
    fn find_local_config(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
        let mut dir = start_dir.as_ref().to_path_buf();
        if let Ok(abs) = dir.canonicalize() {
            dir = abs;
        }

        loop {
            let rc_file = dir.join(RC_FILE);
            if rc_file.is_file() {
                return Some(rc_file);
            }

            let nested = dir.join(".relgate").join(RC_FILE);
            if nested.is_file() {
                return Some(nested);
            }

            if !dir.pop() {
                return None;
            }
        }
    }

    pub fn with_project_key(mut self, key: impl Into<String>) -> Self {
        self.project_key = key.into();
        self
    }

    pub fn with_git_enabled(mut self, enabled: bool) -> Self {
        self.git_enabled = enabled;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_status_rule(mut self, rule: StatusRule) -> Self {
        self.status_rule = rule;
        self
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            remote_name: self.remote_name.clone(),
            commit_cache_size: self.commit_cache_size,
        }
    }

    /// Engine options with this config's policies; paths are left unset.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            error_policy: self.error_policy,
            status_rule: self.status_rule,
            ..EngineOptions::default()
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
