//! Environment-driven runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::DEFAULT_POLL_INTERVAL_SECS;
use crate::paths;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingEnv(&'static str),

    #[error("{0} must be a valid integer")]
    InvalidInt(&'static str),
}

/// Settings for the multi-target daemon (`argo-lite serve`).
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Address the control plane listens on.
    pub listen_addr: String,
    /// Encrypted catalog file.
    pub storage_file: PathBuf,
    /// Base directory under which per-target worktrees are cloned.
    pub repos_dir: PathBuf,
    /// Directory holding the static UI.
    pub static_dir: PathBuf,
}

impl ServeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            listen_addr: lookup("ARGO_LITE_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            storage_file: lookup("ARGO_LITE_STORAGE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(crate::catalog::DEFAULT_STORAGE_FILE)),
            repos_dir: lookup("ARGO_LITE_REPOS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(paths::DEFAULT_REPOS_DIR)),
            static_dir: lookup("ARGO_LITE_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ui/static")),
        }
    }
}

/// Settings for single-target mode (`argo-lite standalone`), read from plain
/// unprefixed environment variables.
#[derive(Debug, Clone)]
pub struct StandaloneConfig {
    pub repo_url: String,
    pub repo_branch: String,
    pub manifest_path: String,
    /// Kubeconfig file; in-cluster defaults when unset.
    pub kubeconfig_path: Option<PathBuf>,
    pub poll_interval: Duration,
    /// Where the single working copy is cloned. Kept on exit.
    pub clone_path: PathBuf,
}

impl StandaloneConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let repo_url = lookup("REPO_URL").ok_or(ConfigError::MissingEnv("REPO_URL"))?;
        let repo_branch = lookup("REPO_BRANCH").ok_or(ConfigError::MissingEnv("REPO_BRANCH"))?;

        let poll_interval_seconds = match lookup("POLL_INTERVAL_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidInt("POLL_INTERVAL_SECONDS"))?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            repo_url,
            repo_branch,
            manifest_path: lookup("MANIFEST_PATH").unwrap_or_else(|| "manifests".into()),
            kubeconfig_path: lookup("KUBECONFIG_PATH").map(PathBuf::from),
            poll_interval: Duration::from_secs(poll_interval_seconds.max(1)),
            clone_path: lookup("REPO_CLONE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.argo-lite-repo")),
        })
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
