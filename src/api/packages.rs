use axum::Router;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use serde::Deserialize;

use crate::api::helpers::{Envelope, ListResponse, OptionsResponse, PageParams, QueryParams};
use crate::auth::Caller;
use crate::error::ApiError;
use crate::model::Package;
use crate::service;
use crate::store::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub package_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/packages", get(list_packages))
        .route("/api/packages/options", get(package_options))
        .route("/api/packages/upload", post(upload_package))
}

async fn list_packages(
    State(state): State<AppState>,
    _caller: Caller,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Envelope<ListResponse<Package>>, ApiError> {
    let page = params.validate()?;
    Ok(Envelope::ok(service::list_packages(&state, page).await?.into()))
}

async fn package_options(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Envelope<OptionsResponse<Package>>, ApiError> {
    let items = service::all_packages(&state).await?;
    Ok(Envelope::ok(OptionsResponse { items }))
}

/// POST /api/packages/upload[?packageId=]
///
/// Multipart body with a single `file` field; the uploaded file name becomes
/// the package name.
#[tracing::instrument(skip(state, multipart), fields(user_id = caller.user_id), err)]
async fn upload_package(
    State(state): State<AppState>,
    caller: Caller,
    QueryParams(params): QueryParams<UploadParams>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Envelope<Package>, ApiError> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadRequest("file field has no file name".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        file = Some((name, data.to_vec()));
    }

    let (name, data) =
        file.ok_or_else(|| ApiError::BadRequest("missing required 'file' field".into()))?;

    let package = service::upload_package(&state, &name, &data, params.package_id).await?;
    Ok(Envelope::ok(package))
}
