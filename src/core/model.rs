//! Persisted entities: guest invitations and RSVP messages
//!
//! Both tables are append/delete only. A row is never mutated after the
//! store has assigned its identity and creation timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Display name used when the invitation URL carries no personalization
pub const DEFAULT_GUEST_NAME: &str = "Tamu";

/// The two tables watched by the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    GuestInvitations,
    RsvpMessages,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::GuestInvitations, Table::RsvpMessages];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::GuestInvitations => "guest_invitations",
            Table::RsvpMessages => "rsvp_messages",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest_invitations" => Ok(Table::GuestInvitations),
            "rsvp_messages" => Ok(Table::RsvpMessages),
            other => Err(format!("Unknown table: {}", other)),
        }
    }
}

/// A guest's attendance answer
///
/// The wire values are the literal strings stored in the `attendance` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attendance {
    #[serde(rename = "hadir")]
    Attending,
    #[serde(rename = "tidak-hadir")]
    NotAttending,
    #[serde(rename = "ragu-ragu")]
    Unsure,
}

impl Attendance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attendance::Attending => "hadir",
            Attendance::NotAttending => "tidak-hadir",
            Attendance::Unsure => "ragu-ragu",
        }
    }

    /// Badge shown next to a message in the live feed
    pub fn label(&self) -> &'static str {
        match self {
            Attendance::Attending => "✓ Hadir",
            Attendance::NotAttending => "✗ Tidak Hadir",
            Attendance::Unsure => "🤔 Ragu-ragu",
        }
    }
}

impl fmt::Display for Attendance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attendance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hadir" => Ok(Attendance::Attending),
            "tidak-hadir" => Ok(Attendance::NotAttending),
            "ragu-ragu" => Ok(Attendance::Unsure),
            other => Err(format!("Unknown attendance value: '{}'", other)),
        }
    }
}

/// A generated, shareable invitation link for one guest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestInvitation {
    pub id: i64,
    pub guest_name: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `guest_invitations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewGuestInvitation {
    #[validate(length(max = 200), custom(function = "not_blank"))]
    pub guest_name: String,

    #[validate(url)]
    pub link: String,
}

/// A guest's recorded RSVP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsvpMessage {
    pub id: Uuid,
    pub guest_name: String,
    pub attendance: Attendance,
    pub guest_count: u32,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl RsvpMessage {
    /// Whether this entry contributes to the "Total Tamu" figure
    pub fn counts_toward_total(&self) -> bool {
        self.attendance == Attendance::Attending && self.guest_count > 0
    }
}

/// Insert payload for `rsvp_messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewRsvpMessage {
    #[validate(length(max = 200), custom(function = "not_blank"))]
    pub guest_name: String,

    pub attendance: Attendance,

    #[validate(range(max = 100))]
    #[serde(default)]
    pub guest_count: u32,

    #[validate(length(max = 2000), custom(function = "not_blank"))]
    pub message: String,
}

impl NewRsvpMessage {
    /// Build a message, forcing the guest count to zero unless attending
    pub fn new(
        guest_name: impl Into<String>,
        attendance: Attendance,
        guest_count: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            guest_name: guest_name.into(),
            attendance,
            guest_count,
            message: message.into(),
        }
        .normalized()
    }

    /// Re-apply the guest count invariant (payloads from the wire are untrusted)
    pub fn normalized(mut self) -> Self {
        if self.attendance != Attendance::Attending {
            self.guest_count = 0;
        }
        self
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendance_wire_values() {
        assert_eq!(
            serde_json::to_value(Attendance::NotAttending).unwrap(),
            "tidak-hadir"
        );
        let parsed: Attendance = serde_json::from_str("\"ragu-ragu\"").unwrap();
        assert_eq!(parsed, Attendance::Unsure);
        assert!("maybe".parse::<Attendance>().is_err());
    }

    #[test]
    fn test_table_names() {
        assert_eq!(Table::RsvpMessages.to_string(), "rsvp_messages");
        assert_eq!(
            "guest_invitations".parse::<Table>().unwrap(),
            Table::GuestInvitations
        );
        assert_eq!(
            serde_json::to_value(Table::GuestInvitations).unwrap(),
            "guest_invitations"
        );
    }

    #[test]
    fn test_guest_count_forced_to_zero_unless_attending() {
        let declined = NewRsvpMessage::new("Budi", Attendance::NotAttending, 4, "Maaf");
        assert_eq!(declined.guest_count, 0);

        let unsure = NewRsvpMessage::new("Budi", Attendance::Unsure, 2, "Semoga bisa");
        assert_eq!(unsure.guest_count, 0);

        let attending = NewRsvpMessage::new("Budi", Attendance::Attending, 3, "Hadir!");
        assert_eq!(attending.guest_count, 3);
    }

    #[test]
    fn test_blank_message_fails_validation() {
        let draft = NewRsvpMessage::new("Budi", Attendance::Attending, 1, "   ");
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_invitation_requires_absolute_link() {
        let ok = NewGuestInvitation {
            guest_name: "Sari".into(),
            link: "https://example.com/?guest=Sari".into(),
        };
        assert!(ok.validate().is_ok());

        let relative = NewGuestInvitation {
            guest_name: "Sari".into(),
            link: "?guest=Sari".into(),
        };
        assert!(relative.validate().is_err());
    }

    #[test]
    fn test_counts_toward_total() {
        let mut msg = RsvpMessage {
            id: Uuid::new_v4(),
            guest_name: "Ani".into(),
            attendance: Attendance::Attending,
            guest_count: 2,
            message: "Selamat".into(),
            created_at: Utc::now(),
        };
        assert!(msg.counts_toward_total());

        msg.guest_count = 0;
        assert!(!msg.counts_toward_total());
    }
}
