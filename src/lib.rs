//! # wedding-invite
//!
//! A personalized wedding invitation service: a landing page with a countdown,
//! an RSVP form with a live message feed, and an admin page generating one
//! invitation link per guest.
//!
//! ## Features
//!
//! - **Two watched tables**: `guest_invitations` and `rsvp_messages`, with a
//!   publish/subscribe change feed
//! - **REST + realtime**: the tables under `/rest/v1` and their changes on a
//!   websocket, guarded by a public API key
//! - **Pluggable storage**: in memory or PostgreSQL (feature `postgres`)
//! - **Page state**: component-scoped state for the invitation and generator
//!   pages, usable against the in-process store or a remote server
//!   (feature `client`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use invite::prelude::*;
//!
//! let bus = EventBus::default();
//! let backend = Backend::in_memory(bus.clone());
//!
//! let mut generator = GeneratorPage::new("https://nikah.example.com");
//! generator.mount(backend.clone()).await?;
//! generator.guest_name = "Bapak/Ibu Sari".into();
//! generator.generate().await;
//!
//! let link = &generator.links().await[0].link;
//! let mut page = InvitationPage::new(WeddingConfig::default(), link);
//! page.mount(backend).await?;
//! assert_eq!(page.guest_name(), "Bapak/Ibu Sari");
//! ```

#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod core;
pub mod pages;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Attendance, Backend, ChangeEvent, ChangeKind, EventBus, EventEnvelope, GuestInvitation,
        InviteError, InviteResult, NewGuestInvitation, NewRsvpMessage, Row, RowChange,
        RowService, RsvpMessage, Subscription, Table,
        link::{build_invitation_link, guest_name_from_url, resolve_guest_name},
    };

    // === Storage ===
    pub use crate::storage::InMemoryRowService;
    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresRowService;

    // === Config ===
    pub use crate::config::{ClientConfig, InviteConfig, ServerConfig, WeddingConfig};

    // === Server ===
    pub use crate::server::{ServerBuilder, ServerHost};

    // === Pages ===
    pub use crate::pages::{
        Clipboard, Confirm, Countdown, GeneratorPage, InvitationPage, Lightbox, LiveList,
        MemoryClipboard, Notice, RsvpForm, RsvpStats, TimeLeft,
    };

    // === Client ===
    #[cfg(feature = "client")]
    pub use crate::client::RemoteBackend;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
