use thiserror::Error;

use crate::catalog::CatalogError;
use crate::cluster::{ApplyFileError, CredentialsError};
use crate::config::ConfigError;
use crate::daemon::RegistryError;
use crate::git::RepoError;

/// Crate-level convenience error.
///
/// Not a "god error": a thin wrapper over the per-subsystem error types.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Apply(#[from] ApplyFileError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
