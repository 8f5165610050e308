//! Decision Trust - Main Entry Point

use std::path::PathBuf;
use tracing::info;
use trust_service::{init_logging, Settings, TrustServices};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    init_logging(&settings.log)?;

    info!("=== Decision Trust v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!(path = %path.display(), "Loaded settings");
    }

    let services = TrustServices::build(&settings)?;
    services.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    services.shutdown().await;
    info!(status = %serde_json::to_string(&services.status())?, "Final status");

    Ok(())
}
