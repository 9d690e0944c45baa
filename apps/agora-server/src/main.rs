#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use agora_server::{build_router, init_tracing, AppConfig};
use tokio::net::TcpListener;

fn env_limit(name: &str, default: usize) -> anyhow::Result<usize> {
    std::env::var(name).map_or_else(
        |_| Ok(default),
        |value| {
            value
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("invalid {name} value {value:?}: {e}"))
        },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let defaults = AppConfig::default();
    let app_config = AppConfig {
        database_url: std::env::var("AGORA_DATABASE_URL").ok(),
        upload_root: std::env::var("AGORA_UPLOAD_ROOT").ok().map(PathBuf::from),
        max_communities_per_user: env_limit(
            "AGORA_MAX_COMMUNITIES_PER_USER",
            defaults.max_communities_per_user,
        )?,
        max_channels_per_community: env_limit(
            "AGORA_MAX_CHANNELS_PER_COMMUNITY",
            defaults.max_channels_per_community,
        )?,
        ..defaults
    };
    if app_config.database_url.is_none() {
        tracing::warn!("AGORA_DATABASE_URL not set, using in-memory repositories");
    }
    let app = build_router(&app_config)?;
    let addr = std::env::var("AGORA_BIND_ADDR")
        .unwrap_or_else(|_| String::from("0.0.0.0:3000"))
        .parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("invalid AGORA_BIND_ADDR: {e}"))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "agora-server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
