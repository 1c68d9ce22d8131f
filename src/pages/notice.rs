//! Blocking user notices and the interaction seams the pages depend on
//!
//! A [`Notice`] is what the front end shows in an alert box. Pages return
//! them instead of showing anything, so a front end decides how to render.

use crate::core::error::ClipboardError;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Confirmation prompt before deleting every generated link
pub const CONFIRM_CLEAR_LINKS: &str = "Apakah Anda yakin ingin menghapus semua link yang dibuat?";

/// Confirmation prompt before deleting every RSVP message
pub const CONFIRM_CLEAR_MESSAGES: &str =
    "Apakah Anda yakin ingin menghapus semua pesan dan konfirmasi kehadiran?";

/// A message shown to the user after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Generator: the guest name is empty
    MissingGuestName,
    /// Generator: the link could not be built
    LinkBuildFailed,
    /// Generator: insert rejected by the store
    InvitationSaveFailed,
    /// Generator: single delete rejected by the store
    InvitationDeleteFailed,
    /// Generator: bulk delete of links rejected by the store
    ClearLinksFailed,
    /// Generator: bulk delete of messages rejected by the store
    ClearMessagesFailed,
    /// Generator: every message was deleted
    MessagesCleared,
    /// Generator: the clipboard refused the link
    CopyFailed,
    /// Invitation: the RSVP was stored
    RsvpThanks,
    /// Invitation: the RSVP was rejected, with the store's error text
    RsvpFailed(String),
}

impl Notice {
    /// Whether the notice reports a failure
    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::MessagesCleared | Notice::RsvpThanks)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MissingGuestName => f.write_str("Mohon masukkan nama tamu terlebih dahulu"),
            Notice::LinkBuildFailed => {
                f.write_str("Terjadi kesalahan saat membuat link. Silakan coba lagi.")
            }
            Notice::InvitationSaveFailed => {
                f.write_str("Terjadi kesalahan saat menyimpan undangan. Silakan coba lagi.")
            }
            Notice::InvitationDeleteFailed => {
                f.write_str("Terjadi kesalahan saat menghapus undangan. Silakan coba lagi.")
            }
            Notice::ClearLinksFailed => {
                f.write_str("Terjadi kesalahan saat menghapus semua link. Silakan coba lagi.")
            }
            Notice::ClearMessagesFailed => {
                f.write_str("Terjadi kesalahan saat menghapus semua pesan. Silakan coba lagi.")
            }
            Notice::MessagesCleared => {
                f.write_str("Semua pesan dan konfirmasi kehadiran telah dihapus!")
            }
            Notice::CopyFailed => f.write_str("Gagal menyalin link"),
            Notice::RsvpThanks => f.write_str("Terima kasih atas konfirmasi kehadiran Anda!"),
            Notice::RsvpFailed(reason) => write!(
                f,
                "Terjadi kesalahan saat menyimpan pesan: {}. Silakan coba lagi.",
                reason
            ),
        }
    }
}

/// Blocking yes/no prompt
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// A fixed answer
impl Confirm for bool {
    fn confirm(&mut self, _prompt: &str) -> bool {
        *self
    }
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Destination of the copy action
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// In-process clipboard, for tests and headless front ends
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
    fail: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard rejecting every write
    pub fn unavailable() -> Self {
        Self {
            contents: Arc::default(),
            fail: true,
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.fail {
            return Err(ClipboardError {
                message: "clipboard is not available".to_string(),
            });
        }

        let mut contents = self.contents.lock().map_err(|e| ClipboardError {
            message: e.to_string(),
        })?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

/// The desktop clipboard
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = arboard::Clipboard::new().map_err(|e| ClipboardError {
            message: e.to_string(),
        })?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.inner.set_text(text).map_err(|e| ClipboardError {
            message: e.to_string(),
        })
    }
}
