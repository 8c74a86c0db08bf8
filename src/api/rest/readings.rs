//! Ingest and indexed replay endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{blocking, ApiError};
use crate::api::state::AppState;
use crate::types::{EventType, Reading, TemperatureReading, TrafficReading};

async fn submit(state: Arc<AppState>, reading: Reading) -> Result<StatusCode, ApiError> {
    blocking(move || state.producer.submit(reading)).await?;
    Ok(StatusCode::CREATED)
}

/// POST /temperature - Append a temperature reading
pub async fn post_temperature(
    State(state): State<Arc<AppState>>,
    Json(reading): Json<TemperatureReading>,
) -> Result<StatusCode, ApiError> {
    submit(state, reading.into()).await
}

/// POST /traffic - Append a traffic reading
pub async fn post_traffic(
    State(state): State<Arc<AppState>>,
    Json(reading): Json<TrafficReading>,
) -> Result<StatusCode, ApiError> {
    submit(state, reading.into()).await
}

async fn nth(
    state: Arc<AppState>,
    event_type: EventType,
    index: u64,
) -> Result<Json<serde_json::Value>, ApiError> {
    let found = blocking(move || state.replay.nth_of_type(event_type, index)).await?;
    match found {
        Some(reading) => Ok(Json(reading.payload_json()?)),
        None => Err(ApiError::NotFound(format!("No message at index {}!", index))),
    }
}

/// GET /temperature/:index - The index-th temperature reading in the log
pub async fn get_temperature(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    nth(state, EventType::Temperature, index).await
}

/// GET /traffic/:index - The index-th traffic reading in the log
pub async fn get_traffic(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    nth(state, EventType::Traffic, index).await
}
