use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use equipment::{HistoryEntry, UploadReceipt, FALLBACK_DATASET_NAME};

use crate::errors::{api_error, bad_request, from_domain, ApiError};
use crate::state::SharedState;

pub async fn post_upload(
    State(state): State<SharedState>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<UploadReceipt>), ApiError> {
    let mut upload: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or(FALLBACK_DATASET_NAME).to_string();
        let bytes = field.bytes().await.map_err(bad_request)?;
        upload = Some((file_name, bytes));
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing_file", "Missing file"))?;

    let id = state.datasets.ingest(&file_name, &bytes).await.map_err(from_domain)?;

    Ok((StatusCode::CREATED, Json(UploadReceipt::success(id))))
}

pub async fn get_history(State(state): State<SharedState>) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let history = state.datasets.history().await.map_err(from_domain)?;
    Ok(Json(history))
}
