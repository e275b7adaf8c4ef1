//! Server-side apply of manifest files.

use std::fs;
use std::path::{Path, PathBuf};

use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::GroupVersionKind;
use kube::discovery::{self, Scope};
use kube::{Client, Config};
use tokio::runtime::Handle;

use super::error::{AggregateError, ApplyFileError, CredentialsError, DocError, DocFailure};
use super::manifest::{self, RawDocument};

/// Field-manager identity for server-side apply. Deliberately shared across
/// processes so re-applies keep updating the same field set.
pub const FIELD_MANAGER: &str = "argo-lite";

/// Namespace substituted for namespace-scoped objects that declare none.
const DEFAULT_NAMESPACE: &str = "default";

/// How to reach the target cluster, in credential priority order.
#[derive(Debug, Clone)]
pub enum ClusterAccess {
    /// Kubeconfig document carried verbatim by the sync target.
    KubeconfigBlob(String),
    /// Kubeconfig file on the local filesystem.
    KubeconfigPath(PathBuf),
    /// In-cluster service-account defaults.
    InCluster,
}

impl ClusterAccess {
    /// Resolve per the credential priority: blob bytes, then an explicit
    /// path, then in-cluster defaults.
    pub fn resolve(blob: Option<&str>, path: Option<&Path>) -> Self {
        match (blob, path) {
            (Some(blob), _) if !blob.is_empty() => Self::KubeconfigBlob(blob.to_string()),
            (_, Some(path)) => Self::KubeconfigPath(path.to_path_buf()),
            _ => Self::InCluster,
        }
    }
}

/// Cluster-access handles for one target, built once from its credentials.
///
/// The kube stack is async-only; the applier bridges onto `runtime` so the
/// owning supervisor thread stays synchronous.
pub struct Applier {
    client: Client,
    runtime: Handle,
}

impl Applier {
    pub fn connect(runtime: Handle, access: &ClusterAccess) -> Result<Self, CredentialsError> {
        let config = runtime.block_on(resolve_config(access))?;
        let client = Client::try_from(config).map_err(CredentialsError::Client)?;
        Ok(Self { client, runtime })
    }

    /// Apply every document in one YAML file via server-side apply.
    ///
    /// One malformed or rejected document does not block the others; any
    /// failure makes the whole call return an aggregate naming each failed
    /// document and its cause.
    pub fn apply_file(&self, path: &Path) -> Result<(), ApplyFileError> {
        self.runtime.block_on(self.apply_file_inner(path))
    }

    async fn apply_file_inner(&self, path: &Path) -> Result<(), ApplyFileError> {
        tracing::debug!(file = %path.display(), "applying manifest file");
        let content = fs::read_to_string(path).map_err(|source| ApplyFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut failures = Vec::new();
        for raw in manifest::split_documents(&content) {
            let index = raw.index;
            if let Err(error) = self.apply_document(&raw).await {
                tracing::warn!(
                    file = %path.display(),
                    doc = index,
                    %error,
                    "document apply failed"
                );
                failures.push(DocFailure { index, error });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ApplyFileError::Aggregate(AggregateError {
                path: path.to_path_buf(),
                failures,
            }))
        }
    }

    async fn apply_document(&self, raw: &RawDocument) -> Result<(), DocError> {
        let document = manifest::parse_document(raw)?;

        let (resource, capabilities) = discovery::pinned_kind(&self.client, &document.gvk)
            .await
            .map_err(|source| DocError::Discovery {
                gvk: display_gvk(&document.gvk),
                source,
            })?;

        let api: Api<DynamicObject> = if matches!(capabilities.scope, Scope::Namespaced) {
            let namespace = document
                .namespace
                .as_deref()
                .unwrap_or(DEFAULT_NAMESPACE);
            Api::namespaced_with(self.client.clone(), namespace, &resource)
        } else {
            // Cluster-scoped kinds ignore any declared namespace.
            Api::all_with(self.client.clone(), &resource)
        };

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&document.name, &params, &Patch::Apply(&document.value))
            .await
            .map_err(|source| DocError::Apply {
                kind: document.gvk.kind.clone(),
                name: document.name.clone(),
                source,
            })?;

        tracing::debug!(
            kind = %document.gvk.kind,
            name = %document.name,
            "applied document"
        );
        Ok(())
    }
}

async fn resolve_config(access: &ClusterAccess) -> Result<Config, CredentialsError> {
    match access {
        ClusterAccess::KubeconfigBlob(blob) => {
            let kubeconfig = Kubeconfig::from_yaml(blob).map_err(CredentialsError::ParseBlob)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(CredentialsError::Load)
        }
        ClusterAccess::KubeconfigPath(path) => {
            tracing::debug!(path = %path.display(), "loading kubeconfig from path");
            let kubeconfig =
                Kubeconfig::read_from(path).map_err(|source| CredentialsError::ReadPath {
                    path: path.clone(),
                    source,
                })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(CredentialsError::Load)
        }
        ClusterAccess::InCluster => Config::incluster().map_err(CredentialsError::InCluster),
    }
}

fn display_gvk(gvk: &GroupVersionKind) -> String {
    format!("{}/{}", gvk.api_version(), gvk.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_priority_prefers_blob_over_path() {
        let access = ClusterAccess::resolve(Some("apiVersion: v1"), Some(Path::new("/kc")));
        assert!(matches!(access, ClusterAccess::KubeconfigBlob(_)));
    }

    #[test]
    fn access_falls_back_to_path_then_in_cluster() {
        let access = ClusterAccess::resolve(Some(""), Some(Path::new("/kc")));
        assert!(matches!(access, ClusterAccess::KubeconfigPath(_)));

        let access = ClusterAccess::resolve(None, None);
        assert!(matches!(access, ClusterAccess::InCluster));
    }

    #[test]
    fn unparseable_blob_fails_connect() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let access = ClusterAccess::KubeconfigBlob("{not a kubeconfig".into());
        let result = Applier::connect(runtime.handle().clone(), &access);
        assert!(matches!(result, Err(CredentialsError::ParseBlob(_))));
    }
}
