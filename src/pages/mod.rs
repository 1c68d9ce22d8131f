//! Page state for the two front ends
//!
//! Each page is a component-scoped state holder: it is created for one
//! visit, mounted on a [`Backend`](crate::core::service::Backend), and torn
//! down when the visit ends. Rendering is left to the front end.

pub mod countdown;
pub mod feed;
pub mod generator;
pub mod invitation;
pub mod lightbox;
pub mod notice;
pub mod rsvp;

pub use countdown::{COMPLETION_MESSAGE, Countdown, TimeLeft};
pub use feed::{LiveList, SharedList};
pub use generator::GeneratorPage;
pub use invitation::{AudioState, InvitationPage};
pub use lightbox::Lightbox;
pub use notice::{Clipboard, Confirm, MemoryClipboard, Notice};
#[cfg(feature = "clipboard")]
pub use notice::SystemClipboard;
pub use rsvp::{RsvpForm, RsvpStats};
