use std::sync::Arc;

use crate::model::{Page, PageRequest, Project, ProjectFields};
use crate::store::{ProjectStore, StoreError};

/// Owner of project rows. Pure data component: it never schedules
/// provisioning, that is left to the caller.
pub struct ProjectRegistry {
    store: Arc<dyn ProjectStore>,
}

impl ProjectRegistry {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// Insert a new project. Fails with `Conflict` if an active project
    /// already uses the name; the store re-checks atomically on insert.
    #[tracing::instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create(&self, input: &ProjectFields) -> Result<Project, StoreError> {
        if self.store.active_project_by_name(&input.name).await?.is_some() {
            return Err(StoreError::Conflict(format!("project name '{}'", input.name)));
        }
        self.store.insert_project(input).await
    }

    /// Replace the mutable fields of project `id`. The name may stay the same
    /// but must not collide with a different active project.
    #[tracing::instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn update(&self, id: i64, input: &ProjectFields) -> Result<Project, StoreError> {
        if let Some(existing) = self.store.active_project_by_name(&input.name).await?
            && existing.id != id
        {
            return Err(StoreError::Conflict(format!("project name '{}'", input.name)));
        }
        self.store.update_project(id, input).await
    }

    /// Soft-delete. Bindings and the on-disk repository are left in place.
    #[tracing::instrument(skip(self), err)]
    pub async fn remove(&self, id: i64) -> Result<(), StoreError> {
        self.store.deactivate_project(id).await
    }

    /// Includes removed projects.
    pub async fn get_by_id(&self, id: i64) -> Result<Project, StoreError> {
        self.store
            .project_by_id(id)
            .await?
            .ok_or(StoreError::NotFound("project"))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Project, StoreError> {
        self.store
            .active_project_by_name(name)
            .await?
            .ok_or(StoreError::NotFound("project"))
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<Project>, StoreError> {
        self.store.list_projects(None, page).await
    }

    pub async fn list_by_groups(
        &self,
        group_ids: &[i64],
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError> {
        self.store.list_projects(Some(group_ids), page).await
    }

    pub async fn list_all(&self) -> Result<Vec<Project>, StoreError> {
        self.store.all_active_projects().await
    }
}
