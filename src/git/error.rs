//! Worktree manager error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from clone/open/fetch/reset/enumeration of a target's worktree.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RepoError {
    #[error("failed to clone {url} into {path}: {source}")]
    Clone {
        url: String,
        path: PathBuf,
        source: git2::Error,
    },

    #[error("failed to open repository at {path}: {source}")]
    Open { path: PathBuf, source: git2::Error },

    #[error("branch {branch} not found locally or on origin: {source}")]
    BranchLookup { branch: String, source: git2::Error },

    #[error("failed to checkout branch {branch}: {source}")]
    Checkout { branch: String, source: git2::Error },

    #[error("failed to fetch branch {branch} from origin: {source}")]
    Fetch { branch: String, source: git2::Error },

    #[error("failed to resolve {reference}: {source}")]
    Reference {
        reference: String,
        source: git2::Error,
    },

    #[error("failed to hard-reset worktree to {reference}: {source}")]
    Reset {
        reference: String,
        source: git2::Error,
    },

    #[error("failed to read HEAD: {0}")]
    Head(#[source] git2::Error),

    #[error("repository not initialized")]
    NotInitialized,

    #[error("manifest directory {path} not found in repository")]
    ManifestPathMissing { path: PathBuf },

    #[error("failed to walk manifest directory {path}: {source}")]
    Walk { path: PathBuf, source: std::io::Error },
}
