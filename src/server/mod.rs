//! HTTP control plane.
//!
//! Accepts sync-target registrations and serves the static UI. Catalog
//! writes are serialized here behind one lock and run off the reactor; the
//! catalog itself does not provide that discipline.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use serde::Serialize;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::daemon::Registry;
use crate::model::NewSyncTarget;

/// Shared state for control-plane handlers.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<Mutex<Catalog>>,
    registry: Registry,
}

impl AppState {
    pub fn new(catalog: Catalog, registry: Registry) -> Self {
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            registry,
        }
    }
}

/// Response body for a successful registration.
#[derive(Serialize)]
struct Created {
    id: String,
    message: String,
}

/// Client-visible failure: a status code plus a plain-text reason.
struct ApiError {
    status: StatusCode,
    reason: String,
}

impl ApiError {
    fn bad_request(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason: reason.into(),
        }
    }

    fn internal(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.reason).into_response()
    }
}

/// Build the control-plane router.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/sync-targets", post(create_sync_target))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_sync_target(
    State(state): State<AppState>,
    Json(body): Json<NewSyncTarget>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let target = body
        .into_target()
        .map_err(|error| ApiError::bad_request(error.to_string()))?;
    let id = target.id.clone();

    let catalog = Arc::clone(&state.catalog);
    let persisted = target.clone();
    tokio::task::spawn_blocking(move || {
        let catalog = catalog.lock().unwrap_or_else(PoisonError::into_inner);
        catalog.upsert(persisted)
    })
    .await
    .map_err(|error| ApiError::internal(format!("catalog write interrupted: {error}")))?
    .map_err(|error| ApiError::internal(format!("failed to save sync target: {error}")))?;

    if let Err(error) = state.registry.register(target) {
        tracing::error!(id = %id, %error, "registration failed after persistence");
        return Err(ApiError::internal(format!(
            "sync target saved, but failed to start processing: {error}"
        )));
    }

    tracing::info!(id = %id, "sync target created");
    Ok((
        StatusCode::CREATED,
        Json(Created {
            id,
            message: "SyncTarget created successfully".into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Parseable kubeconfig pointing at a closed port: client construction
    /// succeeds, every API call fails fast.
    const UNREACHABLE_KUBECONFIG: &str = "\
apiVersion: v1
kind: Config
clusters:
- cluster:
    server: http://127.0.0.1:1
  name: test
contexts:
- context:
    cluster: test
    user: test
  name: test
current-context: test
users:
- name: test
  user: {}
";

    struct Harness {
        router: Router,
        catalog_path: std::path::PathBuf,
        registry: Registry,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().expect("tempdir");
        let catalog_path = dir.path().join("synctargets.json.enc");
        let catalog = Catalog::open(Some(catalog_path.clone()), Some(vec![7u8; 32]))
            .expect("open catalog");
        let registry = Registry::new(
            dir.path().join("repos"),
            tokio::runtime::Handle::current(),
        );
        let state = AppState::new(catalog, registry.clone());
        let router = router(state, dir.path());
        Harness {
            router,
            catalog_path,
            registry,
            _dir: dir,
        }
    }

    fn post_json(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/sync-targets")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    /// A source repository the supervisor can actually clone.
    fn fixture_repo(dir: &Path) -> String {
        let mut options = git2::RepositoryInitOptions::new();
        options.initial_head("main");
        let repo = git2::Repository::init_opts(dir, &options).expect("git init");
        let mut config = repo.config().expect("config");
        config.set_str("user.name", "Test").expect("user.name");
        config
            .set_str("user.email", "test@test.com")
            .expect("user.email");
        std::fs::create_dir_all(dir.join("k8s")).expect("mkdir");
        std::fs::write(dir.join("k8s/app.yaml"), "kind: ConfigMap\n").expect("write");
        let mut index = repo.index().expect("index");
        index
            .add_path(Path::new("k8s/app.yaml"))
            .expect("add");
        index.write().expect("index write");
        let tree_id = index.write_tree().expect("tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let sig = git2::Signature::now("Test", "test@test.com").expect("sig");
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .expect("commit");
        dir.to_str().expect("utf8").to_string()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_manifest_path_is_rejected_without_persisting() {
        let harness = harness();
        let request = post_json(&serde_json::json!({
            "repo_url": "https://git.example/x.git",
            "repo_branch": "main",
            "cluster_credentials_blob": UNREACHABLE_KUBECONFIG,
        }));
        let response = harness.router.clone().oneshot(request).await.expect("send");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("ManifestPath is required"));
        assert!(!harness.catalog_path.exists());
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn valid_registration_persists_and_supervises() {
        let harness = harness();
        let origin = TempDir::new().expect("origin dir");
        let request = post_json(&serde_json::json!({
            "repo_url": fixture_repo(origin.path()),
            "repo_branch": "main",
            "manifest_path": "k8s",
            "poll_interval_seconds": 1,
            "cluster_credentials_blob": UNREACHABLE_KUBECONFIG,
        }));

        let response = harness.router.clone().oneshot(request).await.expect("send");
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload: Value =
            serde_json::from_str(&body_string(response).await).expect("json body");
        let id = payload["id"].as_str().expect("id").to_string();
        assert!(!id.is_empty());

        let raw = std::fs::read(&harness.catalog_path).expect("catalog written");
        assert!(!raw.is_empty());
        assert!(harness.registry.contains(&id));

        harness.registry.stop_all();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_interval_is_persisted_as_sixty() {
        let harness = harness();
        let origin = TempDir::new().expect("origin dir");
        let request = post_json(&serde_json::json!({
            "repo_url": fixture_repo(origin.path()),
            "repo_branch": "main",
            "manifest_path": "k8s",
            "poll_interval_seconds": 0,
            "cluster_credentials_blob": UNREACHABLE_KUBECONFIG,
        }));
        let response = harness.router.clone().oneshot(request).await.expect("send");
        assert_eq!(response.status(), StatusCode::CREATED);

        let catalog = Catalog::open(Some(harness.catalog_path.clone()), Some(vec![7u8; 32]))
            .expect("reopen");
        let targets = catalog.load().expect("load");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].poll_interval_seconds, 60);

        harness.registry.stop_all();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrong_verb_and_unknown_path_status_codes() {
        let harness = harness();
        let get = Request::builder()
            .method("GET")
            .uri("/sync-targets")
            .body(Body::empty())
            .expect("request");
        let response = harness.router.clone().oneshot(get).await.expect("send");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let unknown = Request::builder()
            .uri("/definitely-not-here")
            .body(Body::empty())
            .expect("request");
        let response = harness.router.clone().oneshot(unknown).await.expect("send");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
