//! HTTP surface: `/servers.json` directory listing, `/metrics` Prometheus
//! exposition, and the WebSocket upgrade endpoint.
//!
//! Mirrors the teacher's `api::router()` shape — one handler per route,
//! composed into a single `Router` over a small `Clone` state — generalized
//! from a REST-only surface to one that also upgrades a route to a raw
//! binary-framed connection.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use crate::dispatch::context::Context;
use crate::telemetry;
use crate::transport::websocket;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Context,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/servers.json", get(servers_json))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn servers_json(State(state): State<AppState>) -> impl IntoResponse {
    let servers: Vec<_> = state
        .ctx
        .store
        .list_directory_servers()
        .into_iter()
        .filter(|s| s.is_public)
        .map(|s| {
            json!({
                "hostname": s.hostname,
                "port": s.port,
                "name": s.name,
                "description": s.description,
                "user_count": s.user_count,
                "channel_count": s.channel_count,
                "max_users": s.max_users,
                "uptime_seconds": s.uptime_seconds,
                "heartbeat_interval_seconds": s.heartbeat_interval_secs,
                "last_heartbeat": s.last_heartbeat.to_rfc3339(),
            })
        })
        .collect();
    axum::Json(json!({ "servers": servers }))
}

async fn metrics() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        telemetry::render(),
    )
}

async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state.ctx, addr))
}
