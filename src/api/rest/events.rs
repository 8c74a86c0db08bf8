//! Time-window queries over persisted rows

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{blocking, ApiError};
use crate::api::state::AppState;
use crate::types::{TemperatureEventView, TrafficEventView};
use crate::utils::parse_timestamp;

/// Query parameters for a window query
#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// Inclusive lower bound on `date_created`
    pub start_timestamp: String,
    /// Exclusive upper bound on `date_created`
    pub end_timestamp: String,
}

impl WindowParams {
    fn parse(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
        let start = parse_timestamp(&self.start_timestamp).map_err(|e| {
            ApiError::BadRequest(format!("invalid start_timestamp `{}`: {}", self.start_timestamp, e))
        })?;
        let end = parse_timestamp(&self.end_timestamp).map_err(|e| {
            ApiError::BadRequest(format!("invalid end_timestamp `{}`: {}", self.end_timestamp, e))
        })?;
        Ok((start, end))
    }
}

/// GET /events/temperature - Temperature rows created in the window
pub async fn temperature_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<TemperatureEventView>>, ApiError> {
    let (start, end) = params.parse()?;
    let rows = blocking(move || state.store.temperature_between(start, end)).await?;

    info!(%start, %end, found = rows.len(), "Served temperature events");
    Ok(Json(rows.iter().map(TemperatureEventView::from).collect()))
}

/// GET /events/traffic - Traffic rows created in the window
pub async fn traffic_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<TrafficEventView>>, ApiError> {
    let (start, end) = params.parse()?;
    let rows = blocking(move || state.store.traffic_between(start, end)).await?;

    info!(%start, %end, found = rows.len(), "Served traffic events");
    Ok(Json(rows.iter().map(TrafficEventView::from).collect()))
}
