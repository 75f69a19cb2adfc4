//! Capabilities the cup engine needs from the chat platform.
//!
//! `DiscordRest` is the production implementation; tests use the recording
//! fake in `testing`.

pub mod discord;
pub mod snowflake;
#[cfg(test)]
pub mod testing;

use std::future::Future;

use crate::engine::cup::{ChannelId, MessageId, MessageRef, UserId, UserIdentity};
use crate::engine::effects::Activity;
use crate::error::CupError;

/// One reaction glyph on a message, as counted by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCount {
    pub glyph: String,
    pub count: usize,
    /// Whether the bot itself is one of the reactors.
    pub me: bool,
}

/// A message as fetched from the platform, with its reaction tallies.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub message: MessageRef,
    pub reactions: Vec<ReactionCount>,
}

impl FetchedMessage {
    /// Number of reactions with `glyph`, not counting the bot's own.
    pub fn human_count(&self, glyph: &str) -> usize {
        self.reactions
            .iter()
            .find(|r| r.glyph == glyph)
            .map(|r| r.count.saturating_sub(usize::from(r.me)))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub thumbnail_url: Option<String>,
    pub footer: Option<String>,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub attachment: Option<Attachment>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// The chat platform as seen by the cup engine. Every call is a network
/// round trip and may fail with `CupError::ExternalIo` or `CupError::NotFound`.
pub trait ChatPlatform: Send + Sync + 'static {
    fn fetch_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<UserIdentity, CupError>> + Send;

    fn fetch_message(
        &self,
        message: MessageRef,
    ) -> impl Future<Output = Result<FetchedMessage, CupError>> + Send;

    /// Everyone who reacted to `message` with `glyph`, bots included.
    fn fetch_reaction_users(
        &self,
        message: MessageRef,
        glyph: &str,
    ) -> impl Future<Output = Result<Vec<UserIdentity>, CupError>> + Send;

    fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> impl Future<Output = Result<MessageId, CupError>> + Send;

    /// Send a private message to a user.
    fn send_direct(
        &self,
        user_id: UserId,
        content: &str,
    ) -> impl Future<Output = Result<(), CupError>> + Send;

    fn delete_message(
        &self,
        message: MessageRef,
    ) -> impl Future<Output = Result<(), CupError>> + Send;

    /// React to `message` as the bot.
    fn add_reaction(
        &self,
        message: MessageRef,
        glyph: &str,
    ) -> impl Future<Output = Result<(), CupError>> + Send;

    fn remove_reaction(
        &self,
        message: MessageRef,
        glyph: &str,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), CupError>> + Send;

    fn set_presence(&self, activity: Activity)
    -> impl Future<Output = Result<(), CupError>> + Send;

    /// PNG bytes of the user's avatar.
    fn fetch_avatar(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<u8>, CupError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with(reactions: Vec<ReactionCount>) -> FetchedMessage {
        FetchedMessage {
            message: MessageRef::new(1, 2),
            reactions,
        }
    }

    #[test]
    fn test_human_count_excludes_bot_reaction() {
        let message = message_with(vec![
            ReactionCount {
                glyph: "✋".into(),
                count: 7,
                me: true,
            },
            ReactionCount {
                glyph: "Ⓜ️".into(),
                count: 2,
                me: false,
            },
        ]);
        assert_eq!(message.human_count("✋"), 6);
        assert_eq!(message.human_count("Ⓜ️"), 2);
        assert_eq!(message.human_count("🔥"), 0);
    }

    #[test]
    fn test_outgoing_message_builders() {
        let msg = OutgoingMessage::text("hi");
        assert_eq!(msg.content.as_deref(), Some("hi"));
        assert!(msg.embed.is_none());

        let msg = OutgoingMessage::embed(Embed::default()).with_attachment(Attachment {
            filename: "team.svg".into(),
            content_type: "image/svg+xml".into(),
            bytes: vec![1, 2],
        });
        assert!(msg.content.is_none());
        assert!(msg.embed.is_some());
        assert_eq!(msg.attachment.unwrap().filename, "team.svg");
    }
}
