use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;
use vits_core::{ModelCache, ModelManifest, TtsService, VitsLoader};
use vits_server::{build_app, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    info!("Starting VITS server...");
    let config = ServerConfig::from_env();

    std::fs::create_dir_all(&config.sound_dir).map_err(|e| {
        anyhow::anyhow!("Failed to create sound directory {}: {e}", config.sound_dir.display())
    })?;

    // Models load lazily on first request
    let manifest = ModelManifest::load(&config.manifest_path);
    info!(
        "Found {} model(s) in {}",
        manifest.models().len(),
        config.manifest_path.display()
    );
    let cache = ModelCache::with_reload_period(Arc::new(VitsLoader::default()), config.reload_period);
    let service = TtsService::new(manifest, cache, &config.sound_dir);

    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, reload_period={}",
        config.port, config.rate_limit_per_minute, config.reload_period
    );
    let port = config.port;
    let app = build_app(AppState::new(service, config))?;

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
