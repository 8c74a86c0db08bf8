//! Statistics endpoints

use std::sync::Arc;

use axum::{extract::State, Json};

use super::{blocking, ApiError};
use crate::api::state::AppState;
use crate::types::{LogStats, Summary};

/// GET /stats - Count readings of each type in the log
pub async fn log_stats(State(state): State<Arc<AppState>>) -> Result<Json<LogStats>, ApiError> {
    let stats = blocking(move || state.replay.stats()).await?;
    Ok(Json(stats))
}

/// GET /processing/stats - The persisted summary
pub async fn processing_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Summary>, ApiError> {
    match blocking(move || state.summaries.load()).await? {
        Some(summary) => Ok(Json(summary)),
        None => Err(ApiError::NotFound("Statistics do not exist".to_string())),
    }
}
