//! Declarative manifest application against a Kubernetes cluster.
//!
//! Schema-less by design: resource types are discovered at apply time, so
//! the agent can target arbitrary CRD-bearing clusters without rebuild.

mod applier;
mod error;
mod manifest;

pub use applier::{Applier, ClusterAccess, FIELD_MANAGER};
pub use error::{AggregateError, ApplyFileError, CredentialsError, DocError, DocFailure};
