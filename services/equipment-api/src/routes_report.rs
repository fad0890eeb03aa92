use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use chrono::Utc;
use equipment::DatasetId;

use crate::errors::{from_domain, ApiError};
use crate::state::SharedState;

pub async fn get_report(
    State(state): State<SharedState>,
    Path(id): Path<DatasetId>,
) -> Result<impl IntoResponse, ApiError> {
    let artifact = state.datasets.report(id, Utc::now()).await.map_err(from_domain)?;

    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok((
        [(CONTENT_TYPE, "application/pdf".to_string()), (CONTENT_DISPOSITION, disposition)],
        artifact.bytes,
    ))
}
