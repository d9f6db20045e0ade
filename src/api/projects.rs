use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Deserialize;

use crate::api::helpers::{
    CreatedResponse, Envelope, JsonBody, ListResponse, OptionsResponse, PageParams, PathParam,
    QueryParams,
};
use crate::auth::Caller;
use crate::error::ApiError;
use crate::model::{Project, ProjectFields};
use crate::provision::ProvisionStatus;
use crate::service;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProjectRequest {
    #[serde(flatten)]
    pub project: ProjectFields,
    #[serde(default)]
    pub server_ids: Vec<i64>,
    #[serde(default)]
    pub user_ids: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(add_project))
        .route("/api/projects/options", get(project_options))
        .route(
            "/api/projects/{id}",
            get(get_project).put(edit_project).delete(remove_project),
        )
        .route("/api/projects/{id}/provision", get(provision_status))
        .route("/api/users/{user_id}/projects", get(projects_for_user))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, body), fields(user_id = caller.user_id), err)]
async fn add_project(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(body): JsonBody<AddProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project =
        service::add_project(&state, &body.project, &body.server_ids, &body.user_ids).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::ok(CreatedResponse { id: project.id }),
    ))
}

async fn list_projects(
    State(state): State<AppState>,
    caller: Caller,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Envelope<ListResponse<Project>>, ApiError> {
    let page = params.validate()?;
    let page = service::list_projects(&state, &caller, page).await?;
    Ok(Envelope::ok(page.into()))
}

async fn project_options(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Envelope<OptionsResponse<Project>>, ApiError> {
    let items = service::list_all_projects(&state).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}

async fn get_project(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<i64>,
) -> Result<Envelope<Project>, ApiError> {
    Ok(Envelope::ok(service::get_project(&state, id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = caller.user_id), err)]
async fn edit_project(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<ProjectFields>,
) -> Result<Envelope<Project>, ApiError> {
    Ok(Envelope::ok(service::edit_project(&state, id, &body).await?))
}

#[tracing::instrument(skip(state), fields(user_id = caller.user_id), err)]
async fn remove_project(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<i64>,
) -> Result<Envelope<()>, ApiError> {
    service::remove_project(&state, id).await?;
    Ok(Envelope::empty())
}

async fn provision_status(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<i64>,
) -> Result<Envelope<ProvisionStatus>, ApiError> {
    Ok(Envelope::ok(service::provision_status(&state, id).await?))
}

async fn projects_for_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(user_id): PathParam<i64>,
) -> Result<Envelope<OptionsResponse<Project>>, ApiError> {
    let items = service::list_projects_for_user(&state, &caller, user_id).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}
