//! Applier error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to derive cluster-access handles from the provided credentials.
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("failed to parse kubeconfig content: {0}")]
    ParseBlob(#[source] kube::config::KubeconfigError),

    #[error("failed to read kubeconfig at {path}: {source}")]
    ReadPath {
        path: PathBuf,
        source: kube::config::KubeconfigError,
    },

    #[error("failed to load kubeconfig: {0}")]
    Load(#[source] kube::config::KubeconfigError),

    #[error("in-cluster configuration unavailable: {0}")]
    InCluster(#[source] kube::config::InClusterError),

    #[error("failed to build cluster client: {0}")]
    Client(#[source] kube::Error),
}

/// Why one document never converged.
#[derive(Error, Debug)]
pub enum DocError {
    #[error("YAML parse failed: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("missing kind or apiVersion")]
    MissingKindOrApiVersion,

    #[error("API discovery failed for {gvk}: {source}")]
    Discovery { gvk: String, source: kube::Error },

    #[error("apply failed for {kind} {name}: {source}")]
    Apply {
        kind: String,
        name: String,
        source: kube::Error,
    },
}

/// One failed document within an apply pass.
#[derive(Debug)]
pub struct DocFailure {
    /// 1-based partition ordinal within the file.
    pub index: usize,
    pub error: DocError,
}

/// Outcome of `apply_file`: an unreadable file, or a per-document aggregate.
/// The aggregate means the pass was partial, not void: documents that did
/// not fail were applied.
#[derive(Error, Debug)]
pub enum ApplyFileError {
    #[error("failed to read manifest file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Aggregate(AggregateError),
}

/// Per-document failures collected over one manifest file.
#[derive(Debug)]
pub struct AggregateError {
    pub path: PathBuf,
    pub failures: Vec<DocFailure>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} document(s) failed in {}:",
            self.failures.len(),
            self.path.display()
        )?;
        for failure in &self.failures {
            write!(f, "\n - doc #{}: {}", failure.index, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
