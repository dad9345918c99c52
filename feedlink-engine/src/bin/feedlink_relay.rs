use anyhow::Context;
use feedlink_engine::signaling::{RelayHub, relay_router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_RELAY_ADDR: &str = "0.0.0.0:8787";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr: SocketAddr = std::env::var("FEEDLINK_RELAY_ADDR")
        .unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_string())
        .parse()
        .context("FEEDLINK_RELAY_ADDR is not a socket address")?;

    // Browser clients connect from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = relay_router(RelayHub::new()).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Relay listening on ws://{}/relay/{{space_id}}/{{feed_id}}", addr);

    axum::serve(listener, app).await.context("Relay server stopped")?;
    Ok(())
}
