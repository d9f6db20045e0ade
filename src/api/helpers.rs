use axum::Json;
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, CODE_PASS};
use crate::model::{Page, PageRequest, Pagination};

const DEFAULT_ROWS: u64 = 10;
const MAX_ROWS: u64 = 100;

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// `axum::Json` whose rejection is an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Path` whose rejection is an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// `axum::extract::Query` whose rejection is an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Uniform response body: `{code, message, data}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_PASS,
            message: String::new(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// Success with no payload.
    pub fn empty() -> Self {
        Self {
            code: CODE_PASS,
            message: String::new(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T: Serialize> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            pagination: page.pagination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse<T: Serialize> {
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub rows: Option<u64>,
}

impl PageParams {
    pub fn validate(&self) -> Result<PageRequest, ApiError> {
        let page = self.page.unwrap_or(1);
        let rows = self.rows.unwrap_or(DEFAULT_ROWS);
        if page == 0 {
            return Err(ApiError::BadRequest("page must be at least 1".into()));
        }
        if rows == 0 || rows > MAX_ROWS {
            return Err(ApiError::BadRequest(format!(
                "rows must be between 1 and {MAX_ROWS}"
            )));
        }
        Ok(PageRequest { page, rows })
    }
}
