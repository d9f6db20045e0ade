use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::git::{GitError, VcsGateway};
use crate::model::Project;
use crate::registry::ProjectRegistry;
use crate::store::StoreError;

use super::error::ProvisionError;

/// Result of a reconcile that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No project with that id.
    ProjectMissing,
    /// The project was removed; its repository is left for manual cleanup.
    Inactive,
    /// The repository directory already exists. The branch is not re-checked.
    AlreadyProvisioned,
    /// Cloned, and switched to the declared branch if it is not the default.
    Provisioned,
}

/// Brings a project's on-disk repository in line with its declared URL and
/// branch. Stateless: every call re-reads the project and the disk.
pub struct Coordinator {
    registry: Arc<ProjectRegistry>,
    gateway: Arc<dyn VcsGateway>,
    repository_root: PathBuf,
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(true)
}

impl Coordinator {
    pub fn new(
        registry: Arc<ProjectRegistry>,
        gateway: Arc<dyn VcsGateway>,
        repository_root: PathBuf,
    ) -> Self {
        Self {
            registry,
            gateway,
            repository_root,
        }
    }

    pub fn repository_path(&self, project: &Project) -> PathBuf {
        self.repository_root.join(&project.name)
    }

    /// Whether the project's repository directory is present.
    pub async fn is_provisioned(&self, project: &Project) -> bool {
        path_exists(&self.repository_path(project)).await
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn reconcile(&self, project_id: i64) -> Result<Outcome, ProvisionError> {
        let project = match self.registry.get_by_id(project_id).await {
            Ok(project) => project,
            Err(StoreError::NotFound(_)) => return Ok(Outcome::ProjectMissing),
            Err(e) => return Err(e.into()),
        };
        if !project.is_active {
            return Ok(Outcome::Inactive);
        }

        let path = self.repository_path(&project);
        if path_exists(&path).await {
            return Ok(Outcome::AlreadyProvisioned);
        }

        tokio::fs::create_dir_all(&self.repository_root).await?;

        match self.gateway.ensure_cloned(&path, &project.url).await {
            Ok(()) => {}
            Err(GitError::AlreadyExists(_)) => return Ok(Outcome::AlreadyProvisioned),
            Err(e) => return Err(e.into()),
        }

        if project.branch != self.gateway.default_branch()
            && let Err(e) = self.gateway.ensure_branch(&path, &project.branch).await
        {
            // A clone left on the wrong branch would pass for provisioned.
            if let Err(rm_err) = tokio::fs::remove_dir_all(&path).await {
                tracing::warn!(
                    project_id,
                    path = %path.display(),
                    error = %rm_err,
                    "failed to discard clone after checkout failure"
                );
            }
            return Err(e.into());
        }

        Ok(Outcome::Provisioned)
    }

    /// Reconcile and log the result; never returns an error.
    pub async fn run(&self, project_id: i64) {
        match self.reconcile(project_id).await {
            Ok(Outcome::ProjectMissing) => {
                tracing::warn!(project_id, "project not found, nothing to provision");
            }
            Ok(Outcome::Inactive) => {
                tracing::debug!(project_id, "project removed, skipping provisioning");
            }
            Ok(Outcome::AlreadyProvisioned) => {
                tracing::debug!(project_id, "repository already present");
            }
            Ok(Outcome::Provisioned) => {
                tracing::info!(project_id, "repository provisioned");
            }
            Err(e) => {
                tracing::error!(project_id, error = %e, "repository provisioning failed");
            }
        }
    }
}
