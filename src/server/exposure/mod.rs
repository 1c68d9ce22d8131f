//! API exposure modules for different protocols
//!
//! Each exposure type consumes a `ServerHost` and produces a Router for that protocol.

pub mod rest;

pub use rest::RestExposure;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketExposure;
