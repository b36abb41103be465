//! Grid Projection Implementation

use crate::TileError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// ~1 km in degrees latitude (constant over the globe)
pub const KM_TO_DEG_LAT: f64 = 0.009;

/// Edge length of one grid cell in kilometers
pub const TILE_SIZE_KM: f64 = 1.0;

/// Earth radius in km for haversine distance
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Clamp on cos(lat) so the longitude scale stays finite near the poles
const MIN_COS_LAT: f64 = 0.01;

/// Degrees of longitude per kilometer at the given latitude
fn km_to_deg_lon(lat: f64) -> f64 {
    KM_TO_DEG_LAT / lat.to_radians().cos().max(MIN_COS_LAT)
}

/// Identifier of one ~1km x 1km grid cell.
///
/// Serializes as the string key `T_{lat_idx}_{lon_idx}`, which is also the
/// persistence key for events and aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TileId {
    pub lat_idx: i64,
    pub lon_idx: i64,
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T_{}_{}", self.lat_idx, self.lon_idx)
    }
}

impl FromStr for TileId {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let tag = parts.next();
        let lat = parts.next().and_then(|p| p.parse::<i64>().ok());
        let lon = parts.next().and_then(|p| p.parse::<i64>().ok());
        match (tag, lat, lon, parts.next()) {
            (Some("T"), Some(lat_idx), Some(lon_idx), None) => Ok(Self { lat_idx, lon_idx }),
            _ => Err(TileError::InvalidTileId(s.to_string())),
        }
    }
}

impl From<TileId> for String {
    fn from(id: TileId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TileId {
    type Error = TileError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Geographic bounds of a tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub tile_id: TileId,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub center_lat: f64,
    pub center_lon: f64,
}

/// Convert a coordinate to the tile containing it.
///
/// Latitude uses a constant step; the longitude step shrinks with
/// cos(lat) so cells stay ~1 km wide away from the equator.
pub fn coordinate_to_tile(lat: f64, lon: f64) -> TileId {
    let lat_idx = (lat / KM_TO_DEG_LAT).floor() as i64;
    let lon_idx = (lon / km_to_deg_lon(lat)).floor() as i64;
    TileId { lat_idx, lon_idx }
}

/// Center coordinate of a tile.
pub fn tile_center(tile_id: &TileId) -> (f64, f64) {
    let center_lat = (tile_id.lat_idx as f64 + 0.5) * KM_TO_DEG_LAT;
    let center_lon = (tile_id.lon_idx as f64 + 0.5) * km_to_deg_lon(center_lat);
    (center_lat, center_lon)
}

/// Exact cell rectangle of a tile.
///
/// The longitude width is computed from the cell's own center latitude,
/// not from any query latitude, so bounds are internally consistent.
pub fn tile_bounds(tile_id: &TileId) -> TileBounds {
    let min_lat = tile_id.lat_idx as f64 * KM_TO_DEG_LAT;
    let max_lat = (tile_id.lat_idx as f64 + 1.0) * KM_TO_DEG_LAT;
    let center_lat = (min_lat + max_lat) / 2.0;

    let deg_lon = km_to_deg_lon(center_lat);
    let min_lon = tile_id.lon_idx as f64 * deg_lon;
    let max_lon = (tile_id.lon_idx as f64 + 1.0) * deg_lon;
    let center_lon = (min_lon + max_lon) / 2.0;

    TileBounds {
        tile_id: *tile_id,
        min_lat,
        max_lat,
        min_lon,
        max_lon,
        center_lat,
        center_lon,
    }
}

/// All tiles intersecting a viewport box.
///
/// The longitude scale is fixed at the viewport's midpoint latitude for
/// the whole sweep. For very tall viewports this is a known approximation:
/// cells near the top/bottom edges may use a slightly different true
/// scale. Kept as-is intentionally.
pub fn tiles_in_viewport(
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
) -> BTreeSet<TileId> {
    let min_lat_idx = (min_lat / KM_TO_DEG_LAT).floor() as i64;
    let max_lat_idx = (max_lat / KM_TO_DEG_LAT).ceil() as i64;

    let mid_lat = (min_lat + max_lat) / 2.0;
    let deg_lon = km_to_deg_lon(mid_lat);
    let min_lon_idx = (min_lon / deg_lon).floor() as i64;
    let max_lon_idx = (max_lon / deg_lon).ceil() as i64;

    let mut tiles = BTreeSet::new();
    for lat_idx in min_lat_idx..max_lat_idx {
        for lon_idx in min_lon_idx..max_lon_idx {
            tiles.insert(TileId { lat_idx, lon_idx });
        }
    }
    tiles
}

/// All tiles within a radius of a point, via a bounding degree box.
pub fn tiles_within_radius(lat: f64, lon: f64, radius_km: f64) -> BTreeSet<TileId> {
    let radius_deg_lat = radius_km * KM_TO_DEG_LAT;
    let radius_deg_lon = radius_km * km_to_deg_lon(lat);
    tiles_in_viewport(
        lat - radius_deg_lat,
        lat + radius_deg_lat,
        lon - radius_deg_lon,
        lon + radius_deg_lon,
    )
}

/// Great-circle (haversine) distance between two tile centers, in km.
pub fn tile_distance(a: &TileId, b: &TileId) -> f64 {
    let (lat1, lon1) = tile_center(a);
    let (lat2, lon2) = tile_center(b);

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
