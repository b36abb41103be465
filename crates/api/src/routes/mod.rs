//! Route Handlers

pub mod events;
pub mod summary;
pub mod tiles;
