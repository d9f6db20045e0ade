//! Configuration operations. Each validates, writes through the registry and
//! binding store, and hands reconciliation to the provisioning queue without
//! waiting for it.

use std::collections::BTreeSet;

use anyhow::Context;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::model::{Package, Page, PageRequest, Project, ProjectFields, ProjectServer, ProjectUser};
use crate::provision::ProvisionStatus;
use crate::store::{AppState, StoreError};
use crate::validation;

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// Persist a project with its initial bindings and schedule provisioning.
#[tracing::instrument(skip(state, input, server_ids, user_ids), fields(name = %input.name), err)]
pub async fn add_project(
    state: &AppState,
    input: &ProjectFields,
    server_ids: &[i64],
    user_ids: &[i64],
) -> Result<Project, ApiError> {
    validation::check_project_fields(input)?;

    let project = state.registry.create(input).await?;
    state.bindings.add_servers(project.id, server_ids).await?;
    state.bindings.add_users(project.id, user_ids).await?;

    state.provisioner.submit(project.id);
    tracing::info!(project_id = project.id, "project added");
    Ok(project)
}

/// Overwrite a project's fields and schedule provisioning. Bindings are
/// left alone.
#[tracing::instrument(skip(state, input), fields(name = %input.name), err)]
pub async fn edit_project(
    state: &AppState,
    id: i64,
    input: &ProjectFields,
) -> Result<Project, ApiError> {
    validation::check_project_fields(input)?;

    let project = state.registry.update(id, input).await?;

    state.provisioner.submit(project.id);
    Ok(project)
}

/// Soft-delete. Bindings and the repository directory stay behind.
#[tracing::instrument(skip(state), err)]
pub async fn remove_project(state: &AppState, id: i64) -> Result<(), ApiError> {
    state.registry.remove(id).await?;
    tracing::info!(project_id = id, "project removed");
    Ok(())
}

pub async fn get_project(state: &AppState, id: i64) -> Result<Project, ApiError> {
    Ok(state.registry.get_by_id(id).await?)
}

/// Active projects visible to `caller`, newest first.
pub async fn list_projects(
    state: &AppState,
    caller: &Caller,
    page: PageRequest,
) -> Result<Page<Project>, ApiError> {
    let page = match caller.visible_groups() {
        None => state.registry.list(page).await?,
        Some(groups) => state.registry.list_by_groups(groups, page).await?,
    };
    Ok(page)
}

pub async fn list_all_projects(state: &AppState) -> Result<Vec<Project>, ApiError> {
    Ok(state.registry.list_all().await?)
}

/// Active projects `user_id` is bound to as an operator. Callers without an
/// unrestricted role may only ask about themselves.
pub async fn list_projects_for_user(
    state: &AppState,
    caller: &Caller,
    user_id: i64,
) -> Result<Vec<Project>, ApiError> {
    if !caller.role.is_unrestricted() && caller.user_id != user_id {
        return Err(ApiError::Forbidden);
    }

    let project_ids: BTreeSet<i64> = state
        .bindings
        .users_by_user(user_id)
        .await?
        .into_iter()
        .map(|b| b.project_id)
        .collect();

    let mut projects = Vec::with_capacity(project_ids.len());
    for id in project_ids {
        match state.registry.get_by_id(id).await {
            Ok(project) if project.is_active => projects.push(project),
            Ok(_) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(projects)
}

pub async fn provision_status(state: &AppState, id: i64) -> Result<ProvisionStatus, ApiError> {
    let project = state.registry.get_by_id(id).await?;
    Ok(state.provisioner.status(&project).await)
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Additive: an id that is already bound gets a second binding row.
#[tracing::instrument(skip(state), err)]
pub async fn attach_servers(
    state: &AppState,
    project_id: i64,
    server_ids: &[i64],
) -> Result<Vec<ProjectServer>, ApiError> {
    Ok(state.bindings.add_servers(project_id, server_ids).await?)
}

#[tracing::instrument(skip(state), err)]
pub async fn attach_users(
    state: &AppState,
    project_id: i64,
    user_ids: &[i64],
) -> Result<Vec<ProjectUser>, ApiError> {
    Ok(state.bindings.add_users(project_id, user_ids).await?)
}

#[tracing::instrument(skip(state), err)]
pub async fn detach_server_binding(state: &AppState, binding_id: i64) -> Result<(), ApiError> {
    Ok(state.bindings.remove_server(binding_id).await?)
}

#[tracing::instrument(skip(state), err)]
pub async fn detach_user_binding(state: &AppState, binding_id: i64) -> Result<(), ApiError> {
    Ok(state.bindings.remove_user(binding_id).await?)
}

pub async fn server_bindings(
    state: &AppState,
    project_id: i64,
) -> Result<Vec<ProjectServer>, ApiError> {
    state.registry.get_by_id(project_id).await?;
    Ok(state.bindings.servers_by_project(project_id).await?)
}

pub async fn user_bindings(
    state: &AppState,
    project_id: i64,
) -> Result<Vec<ProjectUser>, ApiError> {
    state.registry.get_by_id(project_id).await?;
    Ok(state.bindings.users_by_project(project_id).await?)
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

/// Store an uploaded artifact under the package directory. A name already
/// in use is rejected unless `package_id` names that same package, in which
/// case the row and file are overwritten.
#[tracing::instrument(skip(state, bytes), fields(size = bytes.len()), err)]
pub async fn upload_package(
    state: &AppState,
    name: &str,
    bytes: &[u8],
    package_id: Option<i64>,
) -> Result<Package, ApiError> {
    validation::check_name(name)?;
    let size = i64::try_from(bytes.len())
        .map_err(|_| ApiError::BadRequest("package is too large".into()))?;

    if let Some(existing) = state.packages.package_by_name(name).await?
        && Some(existing.id) != package_id
    {
        return Err(ApiError::Conflict(format!("package '{name}' already exists")));
    }
    let previous = match package_id {
        Some(id) => Some(
            state
                .packages
                .package_by_id(id)
                .await?
                .ok_or(StoreError::NotFound("package"))?,
        ),
        None => None,
    };

    let dir = &state.config.package_path;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create package directory {}", dir.display()))?;
    // Unique per upload; removed on drop unless persisted.
    let staged = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(dir)
        .with_context(|| format!("stage upload in {}", dir.display()))?
        .into_temp_path();
    tokio::fs::write(&staged, bytes)
        .await
        .with_context(|| format!("write {}", staged.display()))?;

    let package = match package_id {
        Some(id) => state.packages.overwrite_package(id, name, size).await?,
        None => state.packages.insert_package(name, size).await?,
    };

    let target = dir.join(name);
    staged
        .persist(&target)
        .with_context(|| format!("move package into {}", target.display()))?;

    if let Some(previous) = previous.filter(|p| p.name != name) {
        let old = dir.join(&previous.name);
        if let Err(e) = tokio::fs::remove_file(&old).await {
            tracing::warn!(
                path = %old.display(),
                error = %e,
                "failed to remove renamed package file"
            );
        }
    }

    tracing::info!(package_id = package.id, %name, "package stored");
    Ok(package)
}

pub async fn list_packages(
    state: &AppState,
    page: PageRequest,
) -> Result<Page<Package>, ApiError> {
    Ok(state.packages.list_packages(page).await?)
}

pub async fn all_packages(state: &AppState) -> Result<Vec<Package>, ApiError> {
    Ok(state.packages.all_packages().await?)
}
