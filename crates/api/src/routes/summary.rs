//! Summary Route

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{internal_error, AppState, ErrorResponse};
use storage::{StorageSummary, TileAggregate, WindowPolicy};

/// System-wide summary: event totals plus the most recently active tiles
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub totals: StorageSummary,
    pub recent_tiles: Vec<TileAggregate>,
}

const RECENT_TILE_LIMIT: usize = 10;

/// Get system-wide totals
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummaryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let totals = state
        .repository
        .summary()
        .map_err(|e| internal_error(e.to_string()))?;
    let recent_tiles = state
        .repository
        .all_aggregates(RECENT_TILE_LIMIT, WindowPolicy::default())
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(SummaryResponse {
        totals,
        recent_tiles,
    }))
}
