use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use nowplaying::config::Config;
use nowplaying::server::{self, AppState};
use nowplaying::storage::HistoryCache;

fn init_logging() {
    let debug = std::env::var("DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|a| a == "--print-config") {
        println!("{}", Config::example_config());
        return Ok(());
    }

    init_logging();

    let config = Config::load().context("Failed to load configuration")?;
    if config.plex.token.is_none() {
        tracing::warn!("No PLEX_TOKEN configured; requests must pass ?token=");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.history.request_timeout_secs.max(1)))
        .build()
        .context("Failed to build HTTP client")?;
    let cache = Arc::new(HistoryCache::from_config(&config.cache).await);
    tracing::info!(backend = cache.backend_name(), "history cache ready");

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = Arc::new(AppState::new(config, http, cache));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
