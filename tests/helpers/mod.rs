#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use shipyard::config::Config;
use shipyard::git::{GitError, VcsGateway};
use shipyard::provision::{Coordinator, ProvisionQueue};
use shipyard::registry::ProjectRegistry;
use shipyard::store::AppState;
use shipyard::store::memory::MemoryStore;

/// Gateway double: a clone creates the directory; branches listed in
/// `missing_branches` fail checkout.
#[derive(Default)]
pub struct FakeGit {
    pub clones: AtomicUsize,
    pub missing_branches: Vec<String>,
}

#[async_trait]
impl VcsGateway for FakeGit {
    fn default_branch(&self) -> &str {
        "master"
    }

    async fn ensure_cloned(&self, path: &Path, _url: &str) -> Result<(), GitError> {
        if path.exists() {
            return Err(GitError::AlreadyExists(path.to_path_buf()));
        }
        self.clones.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(path.join(".git"))
            .await
            .map_err(|e| GitError::CloneFailed(e.to_string()))
    }

    async fn ensure_branch(&self, _path: &Path, branch: &str) -> Result<(), GitError> {
        if self.missing_branches.iter().any(|b| b == branch) {
            return Err(GitError::CheckoutFailed(format!(
                "'origin/{branch}' is not a commit"
            )));
        }
        Ok(())
    }
}

/// Caller identity sent as gateway headers.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: i64,
    pub role: &'static str,
    pub groups: &'static str,
}

pub const ADMIN: Identity = Identity {
    user_id: 1,
    role: "admin",
    groups: "",
};

/// A running app: router, state, and the temp dirs backing it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub git: Arc<FakeGit>,
    root: tempfile::TempDir,
    _shutdown: watch::Sender<()>,
}

impl TestApp {
    pub fn repository_root(&self) -> PathBuf {
        self.root.path().join("repository")
    }

    pub fn package_root(&self) -> PathBuf {
        self.root.path().join("package")
    }

    /// Wait for any pending reconcile of `project_id` to finish.
    pub async fn settle(&self, project_id: i64) {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.state.provisioner.wait_idle(project_id),
        )
        .await
        .expect("provisioning did not settle");
    }
}

pub fn test_app() -> TestApp {
    test_app_with(FakeGit::default())
}

pub fn test_app_with(git: FakeGit) -> TestApp {
    let root = tempfile::tempdir().expect("tempdir");
    let config = Config {
        listen: "127.0.0.1:0".into(),
        database_url: None,
        repository_path: root.path().join("repository"),
        package_path: root.path().join("package"),
        git_bin: "git".into(),
        default_branch: "master".into(),
        git_timeout: Duration::from_secs(5),
        max_upload_bytes: 1024 * 1024,
    };

    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(ProjectRegistry::new(store.clone()));
    let git = Arc::new(git);
    let coordinator = Arc::new(Coordinator::new(
        registry.clone(),
        git.clone(),
        config.repository_path.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let state = AppState {
        registry,
        bindings: store.clone(),
        packages: store,
        provisioner: ProvisionQueue::spawn(coordinator, shutdown_rx),
        config: Arc::new(config),
    };

    TestApp {
        router: shipyard::router(state.clone()),
        state,
        git,
        root,
        _shutdown: shutdown_tx,
    }
}

/// Add a project through the API. Returns its id.
pub async fn add_project(app: &Router, name: &str, branch: &str) -> i64 {
    let (status, body) = post_json(
        app,
        ADMIN,
        "/api/projects",
        serde_json::json!({
            "name": name,
            "url": "https://example/repo.git",
            "branch": branch,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "add project failed: {body}");
    body["data"]["id"].as_i64().expect("response missing id")
}

fn request(method: &str, path: &str, who: Identity) -> axum::http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("X-User-Id", who.user_id.to_string())
        .header("X-User-Role", who.role);
    if !who.groups.is_empty() {
        builder = builder.header("X-Manage-Groups", who.groups);
    }
    builder
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

pub async fn get_json(app: &Router, who: Identity, path: &str) -> (StatusCode, Value) {
    let req = request("GET", path, who).body(Body::empty()).unwrap();
    send(app, req).await
}

pub async fn post_json(
    app: &Router,
    who: Identity,
    path: &str,
    body: Value,
) -> (StatusCode, Value) {
    let req = request("POST", path, who)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();
    send(app, req).await
}

pub async fn put_json(app: &Router, who: Identity, path: &str, body: Value) -> (StatusCode, Value) {
    let req = request("PUT", path, who)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();
    send(app, req).await
}

pub async fn delete_json(app: &Router, who: Identity, path: &str) -> (StatusCode, Value) {
    let req = request("DELETE", path, who).body(Body::empty()).unwrap();
    send(app, req).await
}

/// Send a request without any identity headers.
pub async fn get_anonymous(app: &Router, path: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

/// POST a single-file multipart body.
pub async fn upload(
    app: &Router,
    who: Identity,
    path: &str,
    file_name: &str,
    contents: &[u8],
) -> (StatusCode, Value) {
    const BOUNDARY: &str = "shipyard-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let req = request("POST", path, who)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, req).await
}

/// Extract JSON body from a response.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
