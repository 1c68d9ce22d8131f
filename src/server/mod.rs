//! Server module exposing the two tables over REST and a realtime websocket
//!
//! `ServerBuilder` assembles a `ServerHost` (configuration, table store and
//! change feed) and turns it into an axum router:
//! - table routes under `/rest/v1`
//! - the realtime change feed under `/realtime/v1/websocket`
//! - health routes at `/health` and `/healthz`

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use exposure::RestExposure;
#[cfg(feature = "websocket")]
pub use exposure::WebSocketExposure;
pub use host::ServerHost;
