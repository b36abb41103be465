//! Event Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{bad_request, internal_error, AppState, ErrorResponse};
use storage::{Event, EventKind};
use tile_grid::TileId;

/// Query parameters for the per-tile events endpoint
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// Maximum number of events to return
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Filter by event kind: pothole, crack or congestion
    pub kind: Option<String>,
}

fn default_limit() -> usize {
    50
}

/// Response for the per-tile events endpoint
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub tile_id: String,
    pub data: Vec<Event>,
    pub count: usize,
}

fn parse_kind(kind: &str) -> Option<EventKind> {
    match kind {
        "pothole" => Some(EventKind::Pothole),
        "crack" => Some(EventKind::Crack),
        "congestion" => Some(EventKind::Congestion),
        _ => None,
    }
}

/// Get the most recent events for one tile, newest first
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Path(tile_id): Path<String>,
    Query(params): Query<EventQuery>,
) -> Result<Json<EventResponse>, (StatusCode, Json<ErrorResponse>)> {
    let tile_id: TileId = tile_id
        .parse()
        .map_err(|e: tile_grid::TileError| bad_request(e.to_string()))?;

    let kind = match params.kind.as_deref() {
        Some(raw) => Some(
            parse_kind(raw).ok_or_else(|| bad_request(format!("Unknown event kind: {}", raw)))?,
        ),
        None => None,
    };

    let limit = params.limit.min(1000);
    let data = state
        .repository
        .recent_events(&tile_id, limit, kind)
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(EventResponse {
        tile_id: tile_id.to_string(),
        count: data.len(),
        data,
    }))
}
