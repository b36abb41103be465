//! RoadSight Server - Main Entry Point

use api::{init_logging, run_server};
use serde::Deserialize;
use std::sync::Arc;
use storage::Repository;
use tracing::info;

/// Server configuration, overridable through `ROADSIGHT_*` environment
/// variables.
#[derive(Debug, Deserialize)]
struct ServerConfig {
    bind_addr: String,
}

fn load_config() -> Result<ServerConfig, config::ConfigError> {
    config::Config::builder()
        .set_default("bind_addr", "0.0.0.0:8080")?
        .add_source(config::Environment::with_prefix("ROADSIGHT"))
        .build()?
        .try_deserialize()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== RoadSight v{} ===", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let repository = Arc::new(Repository::new());

    run_server(&config.bind_addr, repository).await?;

    Ok(())
}
