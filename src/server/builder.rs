//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::ServerHost;
use crate::config::InviteConfig;
use crate::core::events::EventBus;
use crate::core::service::Backend;
use anyhow::Result;
use axum::Router;
use axum::http::{HeaderName, Method};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builder for creating the invitation server
///
/// # Example
///
/// ```rust,ignore
/// ServerBuilder::new()
///     .with_config(InviteConfig::load(Some("invite.yaml"))?)
///     .with_event_bus(1024)
///     .serve("0.0.0.0:3000")
///     .await?;
/// ```
pub struct ServerBuilder {
    config: Option<InviteConfig>,
    backend: Option<Backend>,
    custom_routes: Vec<Router>,
    event_bus: Option<EventBus>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: None,
            backend: None,
            custom_routes: Vec::new(),
            event_bus: None,
        }
    }

    /// Set the configuration (required)
    pub fn with_config(mut self, config: InviteConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing table store
    ///
    /// The stores must publish to the bus passed to [`with_shared_event_bus`](Self::with_shared_event_bus);
    /// without a backend, in-memory tables are created on the builder's bus.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Create the change feed with the given channel capacity
    pub fn with_event_bus(mut self, capacity: usize) -> Self {
        self.event_bus = Some(EventBus::new(capacity));
        self
    }

    /// Use a bus shared with an externally built backend
    pub fn with_shared_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(self) -> Result<ServerHost> {
        let config = self
            .config
            .ok_or_else(|| anyhow::anyhow!("InviteConfig is required. Call .with_config()"))?;
        config.validate()?;

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(config.server.event_capacity));

        let backend = match self.backend {
            Some(backend) => backend,
            None => Self::default_backend(&event_bus)?,
        };

        Ok(ServerHost::new(config, backend, event_bus))
    }

    #[cfg(feature = "in-memory")]
    fn default_backend(event_bus: &EventBus) -> Result<Backend> {
        Ok(Backend::in_memory(event_bus.clone()))
    }

    #[cfg(not(feature = "in-memory"))]
    fn default_backend(_event_bus: &EventBus) -> Result<Backend> {
        Err(anyhow::anyhow!(
            "No backend configured. Call .with_backend() or enable the 'in-memory' feature"
        ))
    }

    /// Build the final router with REST, realtime and the HTTP layers
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        Self::router_for(host, custom_routes)
    }

    /// Build the router for an existing host
    pub fn router_for(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        #[allow(unused_mut)]
        let mut app = RestExposure::build_router(host.clone(), custom_routes)?;

        #[cfg(feature = "websocket")]
        {
            use super::exposure::WebSocketExposure;
            app = app.merge(WebSocketExposure::build_router(host)?);
        }

        Ok(app.layer(cors_layer()).layer(TraceLayer::new_for_http()))
    }

    /// Build the server and listen on `addr` until Ctrl+C or SIGTERM
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The pages are served from another origin and call the API from the browser
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("apikey"),
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ServerBuilder::new();
        assert!(builder.config.is_none());
        assert!(builder.backend.is_none());
        assert!(builder.custom_routes.is_empty());
        assert!(builder.event_bus.is_none());
    }

    #[test]
    fn test_with_custom_routes_appends_router() {
        let builder = ServerBuilder::default()
            .with_custom_routes(Router::new())
            .with_custom_routes(Router::new());
        assert_eq!(builder.custom_routes.len(), 2);
    }

    #[test]
    fn test_build_host_requires_config() {
        let err = ServerBuilder::new().build_host().err().expect("should fail");
        assert!(err.to_string().contains("InviteConfig is required"));
    }

    #[test]
    fn test_build_host_rejects_missing_api_key() {
        let mut config = InviteConfig::local("x");
        config.client.api_key.clear();
        assert!(ServerBuilder::new().with_config(config).build_host().is_err());
    }

    #[tokio::test]
    async fn test_default_backend_shares_bus() {
        let host = ServerBuilder::new()
            .with_config(InviteConfig::local("anon"))
            .with_event_bus(32)
            .build_host()
            .unwrap();

        let _sub = host.backend.invitations.subscribe().await.unwrap();
        assert_eq!(host.event_bus.receiver_count(), 1);
    }

    #[tokio::test]
    async fn test_build_router() {
        // The realtime exposure spawns its dispatch loop, so a runtime is required
        let router = ServerBuilder::new()
            .with_config(InviteConfig::local("anon"))
            .build();
        assert!(router.is_ok());
    }

    #[tokio::test]
    async fn test_custom_routes_skip_the_key_guard() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let router = ServerBuilder::new()
            .with_config(InviteConfig::local("anon"))
            .with_custom_routes(Router::new().route("/ping", axum::routing::get(|| async { "pong" })))
            .build()
            .unwrap();

        let response = router
            .clone()
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::get("/rest/v1/rsvp_messages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
