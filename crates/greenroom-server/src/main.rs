//! Greenroom server binary: config, logging, store selection and the HTTP
//! listener hosting the signaling endpoint.

use std::sync::Arc;

use axum::routing::get;
use axum::Json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use greenroom_common::config;
use greenroom_signaling::identity::HttpIdentityGate;
use greenroom_signaling::{build_router, SignalingState};
use greenroom_store::{ClientStore, MemoryStore, RedisStore, RoomStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::init()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (rooms, clients): (Arc<dyn RoomStore>, Arc<dyn ClientStore>) =
        if cfg.store.redis_url.is_empty() {
            tracing::info!("Using in-memory store");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        } else {
            tracing::info!(url = %cfg.store.redis_url, "Connecting to Redis");
            let store = Arc::new(
                RedisStore::connect(&cfg.store.redis_url, cfg.store.entity_ttl_secs).await?,
            );
            (store.clone(), store)
        };

    let identity = Arc::new(HttpIdentityGate::new(
        &cfg.identity.base_url,
        &cfg.identity.service_key,
        &cfg.identity.jwt_secret,
    ));

    let state = Arc::new(SignalingState::new(rooms, clients, identity));

    let app = build_router(state)
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!(%addr, "Greenroom signaling server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "pong": "it worked!" }))
}
