use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::error;

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, code: &str, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": code, "message": message.to_string() })))
}

pub fn bad_request(e: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "bad_request", e)
}

/// Status and body for a library error.
pub fn from_domain(e: equipment::Error) -> ApiError {
    let status = match &e {
        equipment::Error::Ingest(_) => StatusCode::BAD_REQUEST,
        equipment::Error::NotFound(_) => StatusCode::NOT_FOUND,
        equipment::Error::Store(_) | equipment::Error::Render(_) => {
            error!(error = %e, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.code(), &e)
}
