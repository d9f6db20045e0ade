use axum::Router;
use axum::extract::State;
use axum::routing::{delete, get};
use serde::Deserialize;

use crate::api::helpers::{Envelope, JsonBody, OptionsResponse, PathParam};
use crate::auth::Caller;
use crate::error::ApiError;
use crate::model::{ProjectServer, ProjectUser};
use crate::service;
use crate::store::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachServersRequest {
    pub server_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachUsersRequest {
    pub user_ids: Vec<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/{id}/servers",
            get(list_servers).post(attach_servers),
        )
        .route("/api/projects/{id}/users", get(list_users).post(attach_users))
        .route("/api/project-servers/{binding_id}", delete(detach_server))
        .route("/api/project-users/{binding_id}", delete(detach_user))
}

// -- Servers ----------------------------------------------------------------

async fn list_servers(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<i64>,
) -> Result<Envelope<OptionsResponse<ProjectServer>>, ApiError> {
    let items = service::server_bindings(&state, id).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}

#[tracing::instrument(skip(state, body), fields(user_id = caller.user_id), err)]
async fn attach_servers(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<AttachServersRequest>,
) -> Result<Envelope<OptionsResponse<ProjectServer>>, ApiError> {
    let items = service::attach_servers(&state, id, &body.server_ids).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}

#[tracing::instrument(skip(state), fields(user_id = caller.user_id), err)]
async fn detach_server(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(binding_id): PathParam<i64>,
) -> Result<Envelope<()>, ApiError> {
    service::detach_server_binding(&state, binding_id).await?;
    Ok(Envelope::empty())
}

// -- Users ------------------------------------------------------------------

async fn list_users(
    State(state): State<AppState>,
    _caller: Caller,
    PathParam(id): PathParam<i64>,
) -> Result<Envelope<OptionsResponse<ProjectUser>>, ApiError> {
    let items = service::user_bindings(&state, id).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}

#[tracing::instrument(skip(state, body), fields(user_id = caller.user_id), err)]
async fn attach_users(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<AttachUsersRequest>,
) -> Result<Envelope<OptionsResponse<ProjectUser>>, ApiError> {
    let items = service::attach_users(&state, id, &body.user_ids).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}

#[tracing::instrument(skip(state), fields(user_id = caller.user_id), err)]
async fn detach_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(binding_id): PathParam<i64>,
) -> Result<Envelope<()>, ApiError> {
    service::detach_user_binding(&state, binding_id).await?;
    Ok(Envelope::empty())
}
