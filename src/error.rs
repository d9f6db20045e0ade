use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Envelope `code` for a successful call.
pub const CODE_PASS: i32 = 0;
/// Envelope `code` for a denied call (validation, conflict, missing row, storage).
pub const CODE_DENY: i32 = 1;
/// Envelope `code` when the caller identity is missing or malformed.
pub const CODE_ILLEGAL_REQUEST: i32 = 10001;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, CODE_DENY),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, CODE_ILLEGAL_REQUEST),
            Self::Forbidden => (StatusCode::FORBIDDEN, CODE_DENY),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, CODE_DENY),
            Self::Conflict(_) => (StatusCode::CONFLICT, CODE_DENY),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, CODE_DENY),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                "internal server error".to_owned()
            }
            Self::Unauthorized | Self::Forbidden => self.to_string(),
        };

        let body = serde_json::json!({
            "code": code,
            "message": message,
            "data": null,
        });
        (status, axum::Json(body)).into_response()
    }
}

// Extractor rejections render as a deny envelope instead of axum's plain text.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource".into()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                Self::Conflict("resource already exists".into())
            }
            _ => {
                tracing::error!(error = %err, "database error");
                Self::Internal(err.into())
            }
        }
    }
}
