//! Liveness endpoint for uptime monitors. Always answers 200 while the
//! process is alive.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tracing::info;

use crate::birthday::BirthdayStore;
use crate::version::VERSION;

pub async fn serve(addr: SocketAddr, store: BirthdayStore) -> Result<()> {
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(store);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind health endpoint")?;
    info!(%addr, "Health endpoint listening");

    axum::serve(listener, app)
        .await
        .context("Health server error")?;

    Ok(())
}

async fn root() -> &'static str {
    "🤖 Birthday bot is running"
}

async fn health(State(store): State<BirthdayStore>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "birthdays": store.load().len(),
        "version": VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
