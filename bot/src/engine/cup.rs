use chrono::{DateTime, Utc};
use serde::Serialize;

/// Discord snowflake identifiers.
pub type UserId = u64;
pub type MessageId = u64;
pub type ChannelId = u64;
pub type GuildId = u64;

/// A chat user as the roster sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
    /// Automated accounts never join a roster.
    pub bot: bool,
}

impl UserIdentity {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bot: false,
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A message addressed by channel and id, which is what every REST call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }
}

/// Where the team announcement stands for the current fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// Nothing sent and nothing in flight.
    Absent,
    /// Formation fired; the platform has not returned a message id yet.
    Pending { formation: u64 },
    /// The announcement message is live.
    Posted { message: MessageRef },
}

/// The single active signup.
#[derive(Debug, Clone)]
pub struct Cup {
    pub signup: MessageRef,
    pub announcement: Announcement,
    /// Arrival order, unique by user id.
    pub confirmed: Vec<UserIdentity>,
    /// Disjoint from `confirmed`.
    pub maybe: Vec<UserIdentity>,
    pub opened_at: DateTime<Utc>,
}

impl Cup {
    pub fn new(signup: MessageRef) -> Self {
        Self {
            signup,
            announcement: Announcement::Absent,
            confirmed: Vec::new(),
            maybe: Vec::new(),
            opened_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self, user_id: UserId) -> bool {
        self.confirmed.iter().any(|u| u.id == user_id)
    }

    pub fn is_maybe(&self, user_id: UserId) -> bool {
        self.maybe.iter().any(|u| u.id == user_id)
    }

    pub fn announcement_message_id(&self) -> Option<MessageId> {
        match self.announcement {
            Announcement::Posted { message } => Some(message.message_id),
            _ => None,
        }
    }

    /// Remove a user from the confirmed list, keeping everyone else's order.
    pub(crate) fn take_confirmed(&mut self, user_id: UserId) -> Option<UserIdentity> {
        let pos = self.confirmed.iter().position(|u| u.id == user_id)?;
        Some(self.confirmed.remove(pos))
    }

    pub(crate) fn take_maybe(&mut self, user_id: UserId) -> Option<UserIdentity> {
        let pos = self.maybe.iter().position(|u| u.id == user_id)?;
        Some(self.maybe.remove(pos))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterState {
    Inactive,
    Accepting,
    Full,
}

/// Read-only view of the roster, used for display, pings and the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct RosterSnapshot {
    pub state: RosterState,
    pub team_size: usize,
    pub signup: Option<MessageRef>,
    pub announcement_message_id: Option<MessageId>,
    pub confirmed: Vec<UserIdentity>,
    pub maybe: Vec<UserIdentity>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl RosterSnapshot {
    pub fn open_slots(&self) -> usize {
        self.team_size.saturating_sub(self.confirmed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_confirmed_keeps_order() {
        let mut cup = Cup::new(MessageRef::new(1, 2));
        cup.confirmed = vec![
            UserIdentity::new(10, "a"),
            UserIdentity::new(11, "b"),
            UserIdentity::new(12, "c"),
        ];

        let removed = cup.take_confirmed(11).unwrap();
        assert_eq!(removed.name, "b");
        let ids: Vec<_> = cup.confirmed.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![10, 12]);
        assert!(cup.take_confirmed(11).is_none());
    }

    #[test]
    fn test_announcement_message_id_only_when_posted() {
        let mut cup = Cup::new(MessageRef::new(1, 2));
        assert_eq!(cup.announcement_message_id(), None);
        cup.announcement = Announcement::Pending { formation: 1 };
        assert_eq!(cup.announcement_message_id(), None);
        cup.announcement = Announcement::Posted {
            message: MessageRef::new(1, 99),
        };
        assert_eq!(cup.announcement_message_id(), Some(99));
    }

    #[test]
    fn test_mention() {
        assert_eq!(UserIdentity::new(42, "x").mention(), "<@42>");
    }
}
