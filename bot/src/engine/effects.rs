//! Side effects as data.
//!
//! Roster transitions never talk to Discord directly. They return a list of
//! `Effect`s and the engine executes them against the chat platform.

use serde::Serialize;

use super::cup::{MessageRef, UserId, UserIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Remove one user's reaction mark from a message.
    RemoveReaction {
        message: MessageRef,
        glyph: String,
        user_id: UserId,
    },

    /// Post the team announcement. The result is fed back through
    /// `RosterMachine::announcement_posted` or `announcement_failed`.
    AnnounceTeam {
        formation: u64,
        signup: MessageRef,
        members: Vec<UserIdentity>,
    },

    /// Delete a message the bot posted earlier.
    DeleteMessage { message: MessageRef },

    /// Change the activity shown on the bot's profile.
    SetPresence { activity: Activity },
}

/// What the bot displays as its current activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activity {
    /// No team formed; shows the configured idle activity.
    Idle,
    /// A team is formed or loaded.
    Team { players: Vec<String> },
}

impl Activity {
    pub fn team(members: &[UserIdentity]) -> Self {
        Activity::Team {
            players: members.iter().map(|u| u.name.clone()).collect(),
        }
    }

    /// Human readable status line. `idle` is the configured idle activity name.
    pub fn status_text(&self, idle: &str) -> String {
        match self {
            Activity::Idle => idle.to_string(),
            Activity::Team { players } => format!("Current Cup Team: {}", players.join(" ")),
        }
    }
}
