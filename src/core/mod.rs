//! Core module containing the data model, the change feed and the service traits

pub mod error;
pub mod events;
pub mod link;
pub mod model;
pub mod row;
pub mod service;

pub use error::{InviteError, InviteResult};
pub use events::{ChangeEvent, ChangeKind, EventBus, EventEnvelope};
pub use model::{
    Attendance, DEFAULT_GUEST_NAME, GuestInvitation, NewGuestInvitation, NewRsvpMessage,
    RsvpMessage, Table,
};
pub use row::{Row, RowChange, Subscription};
pub use service::{Backend, RowService};
