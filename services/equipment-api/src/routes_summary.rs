use axum::extract::{Path, State};
use axum::Json;
use equipment::{DatasetId, SummaryView};

use crate::errors::{from_domain, ApiError};
use crate::state::SharedState;

pub async fn get_summary(
    State(state): State<SharedState>,
    Path(id): Path<DatasetId>,
) -> Result<Json<SummaryView>, ApiError> {
    let summary = state.datasets.summary(id).await.map_err(from_domain)?;
    Ok(Json(summary))
}
