//! RSVP form state and the statistics shown above the feed

use crate::core::model::{Attendance, DEFAULT_GUEST_NAME, NewRsvpMessage, RsvpMessage};
use serde::Serialize;

/// Number of messages the invitation page keeps in its feed
pub const FEED_LIMIT: usize = 20;

/// Number of messages rendered from the feed
pub const FEED_VISIBLE: usize = 10;

/// Guest count assumed when the field is blank or not a positive number
pub const DEFAULT_GUEST_COUNT: u32 = 1;

/// The RSVP form as the guest fills it in
///
/// `name` is read-only in the UI: it comes from the personalized link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpForm {
    pub name: String,
    pub attendance: Option<Attendance>,
    pub guests: String,
    pub message: String,
}

impl RsvpForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attendance: None,
            guests: String::new(),
            message: String::new(),
        }
    }

    /// The row to insert, or `None` when submitting must do nothing
    ///
    /// Nothing is submitted while the message is blank or no attendance has
    /// been chosen.
    pub fn submission(&self) -> Option<NewRsvpMessage> {
        let message = self.message.trim();
        if message.is_empty() {
            return None;
        }
        let attendance = self.attendance?;

        let name = match self.name.trim() {
            "" => DEFAULT_GUEST_NAME,
            name => name,
        };

        Some(NewRsvpMessage::new(
            name,
            attendance,
            parse_guest_count(&self.guests),
            message,
        ))
    }

    /// Clear everything but the name
    pub fn reset_after_submit(&mut self) {
        self.attendance = None;
        self.guests.clear();
        self.message.clear();
    }
}

/// Leading decimal digits of `raw`, or [`DEFAULT_GUEST_COUNT`]
///
/// "3 orang" reads as 3; blank, zero, negative and non-numeric input fall
/// back to the default.
pub fn parse_guest_count(raw: &str) -> u32 {
    let digits: String = raw
        .trim_start()
        .trim_start_matches('+')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<u32>() {
        Ok(0) | Err(_) => DEFAULT_GUEST_COUNT,
        Ok(count) => count,
    }
}

/// Counters above the message feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RsvpStats {
    /// "Akan Hadir"
    pub attending: usize,
    /// "Tidak Hadir"
    pub not_attending: usize,
    /// "Ragu-ragu"
    pub unsure: usize,
    /// "Total Tamu": guests brought by those attending
    pub total_guests: u64,
}

impl RsvpStats {
    pub fn from_messages(messages: &[RsvpMessage]) -> Self {
        messages.iter().fold(Self::default(), |mut stats, m| {
            match m.attendance {
                Attendance::Attending => stats.attending += 1,
                Attendance::NotAttending => stats.not_attending += 1,
                Attendance::Unsure => stats.unsure += 1,
            }
            if m.counts_toward_total() {
                stats.total_guests += u64::from(m.guest_count);
            }
            stats
        })
    }

    /// Label and value pairs in display order
    pub fn entries(&self) -> [(&'static str, u64); 4] {
        [
            ("Akan Hadir", self.attending as u64),
            ("Tidak Hadir", self.not_attending as u64),
            ("Ragu-ragu", self.unsure as u64),
            ("Total Tamu", self.total_guests),
        ]
    }
}

/// The part of the feed that is rendered
pub fn visible(messages: &[RsvpMessage]) -> &[RsvpMessage] {
    &messages[..messages.len().min(FEED_VISIBLE)]
}

/// Shown instead of the feed while it is empty
pub const EMPTY_FEED_TEXT: &str = "Belum ada konfirmasi. Jadilah yang pertama!";
