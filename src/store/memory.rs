use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::model::{
    Package, Page, PageRequest, Pagination, Project, ProjectFields, ProjectServer, ProjectUser,
    next_timestamp,
};

use super::{BindingStore, PackageStore, ProjectStore, StoreError};

#[derive(Default)]
struct Tables {
    projects: BTreeMap<i64, Project>,
    servers: BTreeMap<i64, ProjectServer>,
    users: BTreeMap<i64, ProjectUser>,
    packages: BTreeMap<i64, Package>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn active_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.projects
            .values()
            .any(|p| p.is_active && p.name == name && Some(p.id) != except)
    }

    fn require_project(&self, project_id: i64) -> Result<(), StoreError> {
        if self.projects.contains_key(&project_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound("project"))
        }
    }
}

/// In-process store behind one lock, so every check-then-write is atomic.
/// Backs tests and runs without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let start = usize::try_from(page.offset()).unwrap_or(usize::MAX).min(items.len());
    let end = start
        .saturating_add(usize::try_from(page.rows).unwrap_or(usize::MAX))
        .min(items.len());
    let items = items.drain(start..end).collect();
    Page {
        items,
        pagination: Pagination {
            page: page.page,
            rows: page.rows,
            total,
        },
    }
}

fn apply_fields(project: &mut Project, fields: &ProjectFields) {
    project.group_id = fields.group_id;
    project.name.clone_from(&fields.name);
    project.url.clone_from(&fields.url);
    project.path.clone_from(&fields.path);
    project.environment.clone_from(&fields.environment);
    project.branch.clone_from(&fields.branch);
    project.after_pull_script.clone_from(&fields.after_pull_script);
    project.after_deploy_script.clone_from(&fields.after_deploy_script);
    project.transfer_options.clone_from(&fields.transfer_options);
    project.auto_deploy = fields.auto_deploy;
    project.notify_type = fields.notify_type;
    project.notify_target.clone_from(&fields.notify_target);
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, fields: &ProjectFields) -> Result<Project, StoreError> {
        let mut t = self.tables.write().await;
        if t.active_name_taken(&fields.name, None) {
            return Err(StoreError::Conflict(format!("project name '{}'", fields.name)));
        }
        let now = Utc::now();
        let mut project = Project {
            id: t.next_id(),
            group_id: 0,
            name: String::new(),
            url: String::new(),
            path: String::new(),
            environment: String::new(),
            branch: String::new(),
            after_pull_script: String::new(),
            after_deploy_script: String::new(),
            transfer_options: String::new(),
            auto_deploy: false,
            notify_type: 0,
            notify_target: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        apply_fields(&mut project, fields);
        t.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: i64, fields: &ProjectFields) -> Result<Project, StoreError> {
        let mut t = self.tables.write().await;
        if !t.projects.get(&id).is_some_and(|p| p.is_active) {
            return Err(StoreError::NotFound("project"));
        }
        if t.active_name_taken(&fields.name, Some(id)) {
            return Err(StoreError::Conflict(format!("project name '{}'", fields.name)));
        }
        let project = t
            .projects
            .get_mut(&id)
            .ok_or(StoreError::NotFound("project"))?;
        apply_fields(project, fields);
        project.updated_at = next_timestamp(project.updated_at);
        Ok(project.clone())
    }

    async fn deactivate_project(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let project = t
            .projects
            .get_mut(&id)
            .ok_or(StoreError::NotFound("project"))?;
        project.is_active = false;
        project.updated_at = next_timestamp(project.updated_at);
        Ok(())
    }

    async fn project_by_id(&self, id: i64) -> Result<Option<Project>, StoreError> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn active_project_by_name(&self, name: &str) -> Result<Option<Project>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .projects
            .values()
            .find(|p| p.is_active && p.name == name)
            .cloned())
    }

    async fn list_projects(
        &self,
        group_ids: Option<&[i64]>,
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError> {
        let t = self.tables.read().await;
        let matching: Vec<Project> = t
            .projects
            .values()
            .rev()
            .filter(|p| p.is_active)
            .filter(|p| group_ids.is_none_or(|groups| groups.contains(&p.group_id)))
            .cloned()
            .collect();
        Ok(paginate(matching, page))
    }

    async fn all_active_projects(&self) -> Result<Vec<Project>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.projects.values().rev().filter(|p| p.is_active).cloned().collect())
    }
}

#[async_trait]
impl BindingStore for MemoryStore {
    async fn add_servers(
        &self,
        project_id: i64,
        server_ids: &[i64],
    ) -> Result<Vec<ProjectServer>, StoreError> {
        if server_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut t = self.tables.write().await;
        t.require_project(project_id)?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(server_ids.len());
        for &server_id in server_ids {
            let binding = ProjectServer {
                id: t.next_id(),
                project_id,
                server_id,
                created_at: now,
                updated_at: now,
            };
            t.servers.insert(binding.id, binding.clone());
            created.push(binding);
        }
        Ok(created)
    }

    async fn remove_server(&self, binding_id: i64) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .servers
            .remove(&binding_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("project server binding"))
    }

    async fn servers_by_project(&self, project_id: i64) -> Result<Vec<ProjectServer>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.servers
            .values()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn add_users(
        &self,
        project_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<ProjectUser>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut t = self.tables.write().await;
        t.require_project(project_id)?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            let binding = ProjectUser {
                id: t.next_id(),
                project_id,
                user_id,
                created_at: now,
                updated_at: now,
            };
            t.users.insert(binding.id, binding.clone());
            created.push(binding);
        }
        Ok(created)
    }

    async fn remove_user(&self, binding_id: i64) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .users
            .remove(&binding_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("project user binding"))
    }

    async fn users_by_project(&self, project_id: i64) -> Result<Vec<ProjectUser>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn users_by_user(&self, user_id: i64) -> Result<Vec<ProjectUser>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn insert_package(&self, name: &str, size: i64) -> Result<Package, StoreError> {
        let mut t = self.tables.write().await;
        if t.packages.values().any(|p| p.name == name) {
            return Err(StoreError::Conflict(format!("package '{name}'")));
        }
        let now = Utc::now();
        let package = Package {
            id: t.next_id(),
            name: name.to_owned(),
            size,
            created_at: now,
            updated_at: now,
        };
        t.packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn overwrite_package(
        &self,
        id: i64,
        name: &str,
        size: i64,
    ) -> Result<Package, StoreError> {
        let mut t = self.tables.write().await;
        if t.packages.values().any(|p| p.name == name && p.id != id) {
            return Err(StoreError::Conflict(format!("package '{name}'")));
        }
        let package = t
            .packages
            .get_mut(&id)
            .ok_or(StoreError::NotFound("package"))?;
        name.clone_into(&mut package.name);
        package.size = size;
        package.updated_at = next_timestamp(package.updated_at);
        Ok(package.clone())
    }

    async fn package_by_id(&self, id: i64) -> Result<Option<Package>, StoreError> {
        Ok(self.tables.read().await.packages.get(&id).cloned())
    }

    async fn package_by_name(&self, name: &str) -> Result<Option<Package>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.packages.values().find(|p| p.name == name).cloned())
    }

    async fn list_packages(&self, page: PageRequest) -> Result<Page<Package>, StoreError> {
        let t = self.tables.read().await;
        Ok(paginate(t.packages.values().rev().cloned().collect(), page))
    }

    async fn all_packages(&self) -> Result<Vec<Package>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.packages.values().rev().cloned().collect())
    }
}
