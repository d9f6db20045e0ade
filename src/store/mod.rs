pub mod error;
pub mod memory;
pub mod pool;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::model::{Package, Page, PageRequest, Project, ProjectFields, ProjectServer, ProjectUser};
use crate::provision::ProvisionQueue;
use crate::registry::ProjectRegistry;

pub use error::StoreError;

/// Project rows. Implementations enforce name uniqueness among active
/// projects atomically with the write.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, fields: &ProjectFields) -> Result<Project, StoreError>;

    /// Overwrite every mutable field of an active project.
    async fn update_project(&self, id: i64, fields: &ProjectFields) -> Result<Project, StoreError>;

    /// Mark inactive. Succeeds for already-inactive rows; `NotFound` only
    /// when the id was never assigned.
    async fn deactivate_project(&self, id: i64) -> Result<(), StoreError>;

    /// Any project, active or removed.
    async fn project_by_id(&self, id: i64) -> Result<Option<Project>, StoreError>;

    async fn active_project_by_name(&self, name: &str) -> Result<Option<Project>, StoreError>;

    /// Active projects, newest first. `group_ids = None` means unrestricted.
    async fn list_projects(
        &self,
        group_ids: Option<&[i64]>,
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError>;

    async fn all_active_projects(&self) -> Result<Vec<Project>, StoreError>;
}

/// Project↔Server and Project↔User binding rows. Each binding has its own id
/// so it can be removed without knowing both sides of the pair. Inserts are
/// additive: an already-bound target gets a second row.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn add_servers(
        &self,
        project_id: i64,
        server_ids: &[i64],
    ) -> Result<Vec<ProjectServer>, StoreError>;

    async fn remove_server(&self, binding_id: i64) -> Result<(), StoreError>;

    async fn servers_by_project(&self, project_id: i64) -> Result<Vec<ProjectServer>, StoreError>;

    async fn add_users(&self, project_id: i64, user_ids: &[i64])
    -> Result<Vec<ProjectUser>, StoreError>;

    async fn remove_user(&self, binding_id: i64) -> Result<(), StoreError>;

    async fn users_by_project(&self, project_id: i64) -> Result<Vec<ProjectUser>, StoreError>;

    async fn users_by_user(&self, user_id: i64) -> Result<Vec<ProjectUser>, StoreError>;
}

#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn insert_package(&self, name: &str, size: i64) -> Result<Package, StoreError>;

    /// Replace name and size of an existing package row.
    async fn overwrite_package(&self, id: i64, name: &str, size: i64)
    -> Result<Package, StoreError>;

    async fn package_by_id(&self, id: i64) -> Result<Option<Package>, StoreError>;

    async fn package_by_name(&self, name: &str) -> Result<Option<Package>, StoreError>;

    async fn list_packages(&self, page: PageRequest) -> Result<Page<Package>, StoreError>;

    async fn all_packages(&self) -> Result<Vec<Package>, StoreError>;
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProjectRegistry>,
    pub bindings: Arc<dyn BindingStore>,
    pub packages: Arc<dyn PackageStore>,
    pub provisioner: ProvisionQueue,
    pub config: Arc<Config>,
}
