//! Tile Routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{bad_request, internal_error, AppState, ErrorResponse};
use storage::{TileAggregate, WindowPolicy};
use tile_grid::{coordinate_to_tile, tile_bounds, tile_center, TileBounds};

/// Query parameters for the viewport endpoint
#[derive(Debug, Deserialize)]
pub struct ViewportQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    /// Hide tiles with fewer events than this
    #[serde(default = "default_min_events")]
    pub min_events: usize,
}

fn default_min_events() -> usize {
    1
}

/// Response for the viewport endpoint
#[derive(Debug, Serialize)]
pub struct ViewportResponse {
    pub data: Vec<TileAggregate>,
    pub count: usize,
    pub window: WindowPolicy,
}

/// Get tile aggregates inside a viewport, worst first
pub async fn get_tiles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewportQuery>,
) -> Result<Json<ViewportResponse>, (StatusCode, Json<ErrorResponse>)> {
    if params.min_lat > params.max_lat || params.min_lon > params.max_lon {
        return Err(bad_request("viewport bounds are inverted"));
    }

    let window = WindowPolicy::default();
    let data = state
        .repository
        .aggregates_in_viewport(
            params.min_lat,
            params.max_lat,
            params.min_lon,
            params.max_lon,
            params.min_events,
            window,
        )
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ViewportResponse {
        count: data.len(),
        data,
        window,
    }))
}

/// Query parameters for the locate endpoint
#[derive(Debug, Deserialize)]
pub struct LocateQuery {
    pub lat: f64,
    pub lon: f64,
}

/// Response for the locate endpoint
#[derive(Debug, Serialize)]
pub struct LocateResponse {
    pub tile_id: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub bounds: TileBounds,
}

/// Map a coordinate to its tile id, center and bounds
pub async fn locate(Query(params): Query<LocateQuery>) -> Json<LocateResponse> {
    let tile_id = coordinate_to_tile(params.lat, params.lon);
    let (center_lat, center_lon) = tile_center(&tile_id);

    Json(LocateResponse {
        tile_id: tile_id.to_string(),
        center_lat,
        center_lon,
        bounds: tile_bounds(&tile_id),
    })
}
