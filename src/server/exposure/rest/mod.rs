//! REST API exposure
//!
//! The REST exposure consumes a `ServerHost` and produces an Axum `Router`
//! with the two tables under `/rest/v1`:
//!
//! | Method | Path | |
//! |--------|------|-|
//! | GET | `/rest/v1/guest_invitations?limit=N` | newest first |
//! | POST | `/rest/v1/guest_invitations` | `{guest_name, link?}` → 201 |
//! | DELETE | `/rest/v1/guest_invitations/{id}` | → 204 |
//! | DELETE | `/rest/v1/guest_invitations?id=neq.0` | bulk → `{deleted}` |
//! | GET | `/rest/v1/rsvp_messages?limit=N` | newest 20 by default |
//! | POST | `/rest/v1/rsvp_messages` | → 201 |
//! | DELETE | `/rest/v1/rsvp_messages?id=neq.<nil uuid>` | bulk → `{deleted}` |
//! | GET | `/rest/v1/rsvp_messages/stats` | attendance statistics |
//!
//! Every `/rest/v1` route requires the public API key.

pub mod auth;
pub mod handlers;
pub mod params;

use super::super::host::ServerHost;
use crate::core::model::{GuestInvitation, RsvpMessage};
use anyhow::Result;
use axum::routing::{delete, get};
use axum::{Json, Router, middleware};
use handlers::{
    create_invitation, create_message, delete_row, delete_rows, list_rows, message_stats,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Base path of the table routes
pub const REST_PREFIX: &str = "/rest/v1";

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes (unauthenticated)
    /// - Table routes under `/rest/v1` (API key required)
    /// - Custom routes
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let table_routes = Self::table_routes(host.clone());

        let mut app = Self::health_routes().nest(REST_PREFIX, table_routes);

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app)
    }

    fn table_routes(host: Arc<ServerHost>) -> Router {
        Router::new()
            .route(
                "/guest_invitations",
                get(list_rows::<GuestInvitation>)
                    .post(create_invitation)
                    .delete(delete_rows::<GuestInvitation>),
            )
            .route(
                "/guest_invitations/{id}",
                delete(delete_row::<GuestInvitation>),
            )
            .route(
                "/rsvp_messages",
                get(list_rows::<RsvpMessage>)
                    .post(create_message)
                    .delete(delete_rows::<RsvpMessage>),
            )
            .route("/rsvp_messages/stats", get(message_stats))
            .layer(middleware::from_fn_with_state(
                host.clone(),
                auth::require_api_key,
            ))
            .with_state(host)
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}
