//! Server host for transport-agnostic API exposure
//!
//! `ServerHost` holds the state every exposure needs (configuration, the
//! table store and the change feed). It is completely agnostic to the
//! transport protocol and serves as the single source of truth for the
//! application state.

use crate::config::InviteConfig;
use crate::core::events::EventBus;
use crate::core::service::Backend;
use std::sync::Arc;

/// Host context containing all server state
///
/// # Example
///
/// ```rust,ignore
/// let bus = EventBus::new(1024);
/// let host = Arc::new(ServerHost::new(config, Backend::in_memory(bus.clone()), bus));
///
/// let rest_app = RestExposure::build_router(host.clone(), vec![])?;
/// let ws_app = WebSocketExposure::build_router(host)?;
/// ```
pub struct ServerHost {
    /// Validated configuration
    pub config: Arc<InviteConfig>,

    /// The two watched tables
    pub backend: Backend,

    /// Change feed the stores publish to
    ///
    /// The realtime exposure subscribes here. It must be the same bus the
    /// backend's stores were created with.
    pub event_bus: EventBus,
}

impl ServerHost {
    pub fn new(config: InviteConfig, backend: Backend, event_bus: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            event_bus,
        }
    }

    /// Public API key guarding REST and realtime routes
    pub fn api_key(&self) -> &str {
        &self.config.client.api_key
    }

    /// Origin used to build guest links
    pub fn site_url(&self) -> &str {
        &self.config.client.site_url
    }
}
