//! Realtime exposure over websockets
//!
//! Streams the change feed of the two tables to subscribed clients.
//!
//! # Architecture
//!
//! ```text
//! Client ──ws──▶ /realtime/v1/websocket ──▶ ws_handler() ──▶ ConnectionManager
//!                                                               │
//!                                                      subscribe(filter)
//!                                                               │
//!                             EventBus ──broadcast──▶ filter ──▶ Client
//! ```
//!
//! # Protocol
//!
//! Client → Server (JSON):
//! - `{"type": "subscribe", "filter": {"table": "rsvp_messages"}}`
//! - `{"type": "unsubscribe", "subscription_id": "..."}`
//! - `{"type": "ping"}`
//!
//! Server → Client (JSON):
//! - `{"type": "welcome", "connection_id": "..."}`
//! - `{"type": "event", "subscription_id": "...", "data": {...}}`
//! - `{"type": "subscribed", "subscription_id": "...", "filter": {...}}`
//! - `{"type": "unsubscribed", "subscription_id": "..."}`
//! - `{"type": "pong"}`
//! - `{"type": "error", "message": "..."}`

mod handler;
mod manager;
pub mod protocol;

pub use manager::ConnectionManager;

use super::rest::auth::require_api_key;
use crate::server::host::ServerHost;
use anyhow::Result;
use axum::{Router, middleware, routing::get};
use std::sync::Arc;

/// Path of the realtime endpoint
pub const REALTIME_PATH: &str = "/realtime/v1/websocket";

/// Websocket exposure implementation
///
/// Subscribes a `ConnectionManager` to the host's `EventBus`, spawns the
/// dispatch loop and returns a router with the realtime endpoint, guarded
/// by the same API key as the REST routes.
pub struct WebSocketExposure;

impl WebSocketExposure {
    /// Build the websocket router from a host
    ///
    /// Must be called from within a tokio runtime.
    pub fn build_router(host: Arc<ServerHost>) -> Result<Router> {
        let connection_manager = Arc::new(ConnectionManager::new());

        let cm = connection_manager.clone();
        let rx = host.event_bus.subscribe();
        tokio::spawn(async move {
            cm.run_dispatch_loop(rx).await;
        });

        let router = Router::new()
            .route(REALTIME_PATH, get(handler::ws_handler))
            .with_state(connection_manager)
            .layer(middleware::from_fn_with_state(host, require_api_key));

        Ok(router)
    }
}
