//! Sync-target records and request validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Reconciliation period substituted when a request omits or zeroes the
/// interval.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// A declarative binding of one repository branch and sub-path to one
/// cluster. The unit of management: persisted in the catalog, indexed by the
/// registry, driven by one supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Opaque unique identifier, assigned at creation, stable for the
    /// target's lifetime.
    pub id: String,

    /// Remote repository locator.
    pub repo_url: String,

    /// Branch to track.
    pub repo_branch: String,

    /// Directory relative to the repository root under which `.yaml`/`.yml`
    /// files are selected for apply.
    pub manifest_path: String,

    /// Reconciliation period in seconds.
    pub poll_interval_seconds: u64,

    /// Opaque kubeconfig document, consumed verbatim by the cluster applier.
    pub cluster_credentials_blob: String,

    /// Reserved for repository credentials; not consulted.
    #[serde(default)]
    pub repo_credentials_blob: String,
}

/// Request body for `POST /sync-targets`: a target minus its `id`.
///
/// Every field defaults so that omissions surface as validation failures
/// with a field name, not as deserialization errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSyncTarget {
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub repo_branch: String,
    #[serde(default)]
    pub manifest_path: String,
    /// Signed so explicit zero or negative values normalize instead of
    /// failing to decode.
    #[serde(default)]
    pub poll_interval_seconds: i64,
    #[serde(default)]
    pub cluster_credentials_blob: String,
    #[serde(default)]
    pub repo_credentials_blob: String,
}

/// Client-visible rejection of a target description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
}

impl NewSyncTarget {
    /// Validate required fields and mint a registered target with a fresh
    /// unique id. `poll_interval_seconds <= 0` normalizes to 60.
    pub fn into_target(self) -> Result<SyncTarget, ValidationError> {
        if self.repo_url.is_empty() {
            return Err(ValidationError::MissingField("RepoURL"));
        }
        if self.repo_branch.is_empty() {
            return Err(ValidationError::MissingField("RepoBranch"));
        }
        if self.cluster_credentials_blob.is_empty() {
            return Err(ValidationError::MissingField("ClusterCredentials"));
        }
        if self.manifest_path.is_empty() {
            return Err(ValidationError::MissingField("ManifestPath"));
        }

        let poll_interval_seconds = if self.poll_interval_seconds <= 0 {
            DEFAULT_POLL_INTERVAL_SECS
        } else {
            self.poll_interval_seconds as u64
        };

        Ok(SyncTarget {
            id: Uuid::new_v4().to_string(),
            repo_url: self.repo_url,
            repo_branch: self.repo_branch,
            manifest_path: self.manifest_path,
            poll_interval_seconds,
            cluster_credentials_blob: self.cluster_credentials_blob,
            repo_credentials_blob: self.repo_credentials_blob,
        })
    }
}
