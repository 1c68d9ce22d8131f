//! # wedding-invite
//!
//! Server binary for the personalized wedding invitation:
//! - **REST API** under `/rest/v1` for `guest_invitations` and `rsvp_messages`
//! - **Realtime change feed** on `/realtime/v1/websocket`
//! - **Storage** in memory, or PostgreSQL when `DATABASE_URL` is set
//!
//! Usage: `wedding-invite [config.yaml]` (or `INVITE_CONFIG=config.yaml`).

use anyhow::Result;
use invite::config::InviteConfig;
use invite::core::events::EventBus;
use invite::core::service::Backend;
use invite::server::ServerBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the YAML configuration file
const ENV_CONFIG: &str = "INVITE_CONFIG";

const DEFAULT_FILTER: &str = "wedding_invite=info,invite=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    info!("Starting wedding-invite v{}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG).ok());
    let config = InviteConfig::load(path.as_deref())?;
    let addr = config.bind_addr()?;

    info!(
        couple = %config.wedding.couple,
        site_url = %config.client.site_url,
        target = %config.wedding.target,
        "Loaded configuration"
    );

    let event_bus = EventBus::new(config.server.event_capacity);
    let mut builder = ServerBuilder::new().with_shared_event_bus(event_bus.clone());

    if let Some(url) = config.server.database_url.as_deref() {
        if let Some(backend) = database_backend(url, event_bus).await? {
            builder = builder.with_backend(backend);
        }
    }

    builder.with_config(config).serve(&addr.to_string()).await
}

#[cfg(feature = "postgres")]
async fn database_backend(url: &str, event_bus: EventBus) -> Result<Option<Backend>> {
    use invite::core::model::{GuestInvitation, RsvpMessage};
    use invite::storage::PostgresRowService;
    use invite::storage::postgres::run_migrations;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    run_migrations(&pool).await?;
    info!("Connected to PostgreSQL");

    Ok(Some(Backend::new(
        Arc::new(PostgresRowService::<GuestInvitation>::new(
            pool.clone(),
            event_bus.clone(),
        )),
        Arc::new(PostgresRowService::<RsvpMessage>::new(pool, event_bus)),
    )))
}

#[cfg(not(feature = "postgres"))]
async fn database_backend(_url: &str, _event_bus: EventBus) -> Result<Option<Backend>> {
    tracing::warn!(
        "DATABASE_URL is set but the 'postgres' feature is disabled, using in-memory tables"
    );
    Ok(None)
}
