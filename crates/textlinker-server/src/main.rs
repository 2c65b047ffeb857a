use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use textlinker_api::{AppState, router};
use textlinker_relay::{RelayConfig, RelayService, cleanup};
use textlinker_types::MAX_TEXT_CHARS;

struct Config {
    host: String,
    port: u16,
    body_limit: usize,
    relay: RelayConfig,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("TEXTLINKER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("TEXTLINKER_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;

        let chunk_ttl_secs: i64 = env_or("TEXTLINKER_CHUNK_TTL_SECS", 30 * 60)?;
        let sweep_interval_secs: u64 = env_or("TEXTLINKER_SWEEP_INTERVAL_SECS", 60)?;
        let retention_hours: i64 = env_or("TEXTLINKER_MESSAGE_RETENTION_HOURS", 24)?;
        let max_direct_chars: usize = env_or("TEXTLINKER_MAX_DIRECT_CHARS", MAX_TEXT_CHARS)?;
        let body_limit: usize = env_or("TEXTLINKER_BODY_LIMIT_BYTES", 1024 * 1024)?;

        if sweep_interval_secs == 0 {
            anyhow::bail!("TEXTLINKER_SWEEP_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            host,
            port,
            body_limit,
            relay: RelayConfig {
                chunk_ttl: chrono::Duration::seconds(chunk_ttl_secs),
                sweep_interval: Duration::from_secs(sweep_interval_secs),
                message_retention: chrono::Duration::hours(retention_hours),
                max_direct_chars,
            },
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "textlinker=debug,textlinker_api=debug,textlinker_relay=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // One relay per process, shared by every handler and the sweep task
    let relay = RelayService::new(config.relay.clone());
    tokio::spawn(cleanup::run_sweep_loop(
        relay.clone(),
        config.relay.sweep_interval,
    ));

    // Web and app clients are served from anywhere
    let app = router(AppState::new(relay))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("TextLinker relay listening on {}", addr);
    info!(
        "Chunk TTL: {} min, sweep every {}s, message retention {} h",
        config.relay.chunk_ttl.num_minutes(),
        config.relay.sweep_interval.as_secs(),
        config.relay.message_retention.num_hours()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
