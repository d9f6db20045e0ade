use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{Notify, mpsc, watch};

use crate::model::Project;

use super::coordinator::Coordinator;

/// Where a project sits in the provisioning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Queued,
    Running,
    /// Running, with another pass requested after the current one.
    Rerun,
}

/// Snapshot returned by the provisioning status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionStatus {
    pub project_id: i64,
    pub path: PathBuf,
    pub present: bool,
    pub task: TaskState,
}

/// Hands reconcile requests to a background worker without blocking the
/// caller. At most one reconcile runs per project; requests arriving while
/// one is pending collapse into a single follow-up pass.
#[derive(Clone)]
pub struct ProvisionQueue {
    inner: Arc<Inner>,
}

struct Inner {
    tx: mpsc::UnboundedSender<i64>,
    /// Only non-idle projects have an entry.
    slots: Mutex<HashMap<i64, TaskState>>,
    idle: Notify,
    coordinator: Arc<Coordinator>,
}

impl ProvisionQueue {
    /// Start the dispatcher. It stops accepting work once `shutdown` fires;
    /// reconciles already running are left to finish or be dropped with the
    /// runtime.
    pub fn spawn(coordinator: Arc<Coordinator>, shutdown: watch::Receiver<()>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            inner: Arc::new(Inner {
                tx,
                slots: Mutex::default(),
                idle: Notify::new(),
                coordinator,
            }),
        };
        tokio::spawn(dispatch(queue.clone(), rx, shutdown));
        queue
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<i64, TaskState>> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a reconcile of `project_id`. Returns immediately.
    pub fn submit(&self, project_id: i64) {
        let mut slots = self.slots();
        match slots.get(&project_id).copied() {
            None | Some(TaskState::Idle) => {
                if self.inner.tx.send(project_id).is_err() {
                    tracing::warn!(project_id, "provisioning worker stopped, request dropped");
                    return;
                }
                slots.insert(project_id, TaskState::Queued);
            }
            Some(TaskState::Running) => {
                slots.insert(project_id, TaskState::Rerun);
            }
            Some(TaskState::Queued | TaskState::Rerun) => {
                tracing::debug!(project_id, "reconcile already pending");
            }
        }
    }

    pub fn state(&self, project_id: i64) -> TaskState {
        self.slots()
            .get(&project_id)
            .copied()
            .unwrap_or(TaskState::Idle)
    }

    pub async fn status(&self, project: &Project) -> ProvisionStatus {
        let coordinator = &self.inner.coordinator;
        ProvisionStatus {
            project_id: project.id,
            path: coordinator.repository_path(project),
            present: coordinator.is_provisioned(project).await,
            task: self.state(project.id),
        }
    }

    /// Resolves once `project_id` has no pending or running reconcile.
    pub async fn wait_idle(&self, project_id: i64) {
        loop {
            let notified = self.inner.idle.notified();
            if self.state(project_id) == TaskState::Idle {
                return;
            }
            notified.await;
        }
    }

    /// Run reconciles for one project until no rerun is pending.
    async fn drive(&self, project_id: i64) {
        loop {
            self.slots().insert(project_id, TaskState::Running);

            let coordinator = self.inner.coordinator.clone();
            let handle = tokio::spawn(async move { coordinator.run(project_id).await });
            if let Err(e) = handle.await {
                tracing::error!(project_id, error = %e, "reconcile task panicked");
            }

            let rerun = {
                let mut slots = self.slots();
                let rerun = slots.get(&project_id) == Some(&TaskState::Rerun);
                if !rerun {
                    slots.remove(&project_id);
                }
                rerun
            };
            if !rerun {
                break;
            }
        }
        self.inner.idle.notify_waiters();
    }
}

async fn dispatch(
    queue: ProvisionQueue,
    mut rx: mpsc::UnboundedReceiver<i64>,
    mut shutdown: watch::Receiver<()>,
) {
    tracing::info!("provisioning worker started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("provisioning worker shutting down");
                break;
            }
            Some(project_id) = rx.recv() => {
                let queue = queue.clone();
                tokio::spawn(async move { queue.drive(project_id).await });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::model::ProjectFields;
    use crate::provision::coordinator::tests::FakeGit;
    use crate::registry::ProjectRegistry;
    use crate::store::memory::MemoryStore;

    struct Harness {
        registry: Arc<ProjectRegistry>,
        git: Arc<FakeGit>,
        queue: ProvisionQueue,
        _shutdown: watch::Sender<()>,
        _root: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let registry = Arc::new(ProjectRegistry::new(Arc::new(MemoryStore::new())));
        let git = Arc::new(FakeGit::default());
        let root = tempfile::tempdir().unwrap();
        let coordinator = Arc::new(Coordinator::new(
            registry.clone(),
            git.clone(),
            root.path().to_path_buf(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        Harness {
            registry,
            git,
            queue: ProvisionQueue::spawn(coordinator, shutdown_rx),
            _shutdown: shutdown_tx,
            _root: root,
        }
    }

    async fn create(registry: &ProjectRegistry, name: &str) -> Project {
        registry
            .create(&ProjectFields {
                name: name.into(),
                url: "https://example/repo.git".into(),
                branch: "main".into(),
                ..ProjectFields::default()
            })
            .await
            .unwrap()
    }

    async fn settle(queue: &ProvisionQueue, project_id: i64) {
        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle(project_id))
            .await
            .expect("reconcile did not settle");
    }

    #[tokio::test]
    async fn submitted_project_is_provisioned() {
        let h = harness();
        let p = create(&h.registry, "api").await;

        h.queue.submit(p.id);
        settle(&h.queue, p.id).await;

        let status = h.queue.status(&p).await;
        assert!(status.present);
        assert_eq!(status.task, TaskState::Idle);
        assert_eq!(h.git.clones.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn burst_of_submissions_clones_once() {
        let h = harness();
        let p = create(&h.registry, "api").await;

        for _ in 0..10 {
            h.queue.submit(p.id);
        }
        settle(&h.queue, p.id).await;

        assert_eq!(h.git.clones.load(Ordering::SeqCst), 1);
        assert_eq!(h.git.checkouts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_submission_while_queued_is_coalesced() {
        let h = harness();
        let p = create(&h.registry, "api").await;

        h.queue.submit(p.id);
        assert_ne!(h.queue.state(p.id), TaskState::Idle);
        h.queue.submit(p.id);
        settle(&h.queue, p.id).await;

        assert_eq!(h.queue.state(p.id), TaskState::Idle);
    }

    #[tokio::test]
    async fn unknown_project_is_idle() {
        let h = harness();
        assert_eq!(h.queue.state(99), TaskState::Idle);
        h.queue.submit(99);
        settle(&h.queue, 99).await;
        assert_eq!(h.git.clones.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn projects_are_provisioned_independently() {
        let h = harness();
        let api = create(&h.registry, "api").await;
        let web = create(&h.registry, "web").await;

        h.queue.submit(api.id);
        h.queue.submit(web.id);
        settle(&h.queue, api.id).await;
        settle(&h.queue, web.id).await;

        assert!(h.queue.status(&api).await.present);
        assert!(h.queue.status(&web).await.present);
        assert_eq!(h.git.clones.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn task_state_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TaskState::Rerun).unwrap(), "rerun");
    }
}
