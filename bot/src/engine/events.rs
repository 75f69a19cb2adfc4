use serde::{Deserialize, Serialize};

use super::cup::{ChannelId, GuildId, MessageId, MessageRef, UserId};
use crate::platform::snowflake;

/// Events forwarded by the gateway relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// The relay (re)connected to the gateway.
    Ready,
    /// A user added a reaction to a message.
    ReactionAdd(ReactionEvent),
    /// A user's reaction was removed, by them or by the bot.
    ReactionRemove(ReactionEvent),
    /// A message was posted; commands are parsed from these.
    MessageCreate(MessageEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    #[serde(default, with = "snowflake::option")]
    pub guild_id: Option<GuildId>,
    #[serde(with = "snowflake")]
    pub channel_id: ChannelId,
    #[serde(with = "snowflake")]
    pub message_id: MessageId,
    #[serde(with = "snowflake")]
    pub user_id: UserId,
    /// Unicode emoji, or `name:id` for custom emoji (the form the REST API takes).
    pub emoji: String,
}

impl ReactionEvent {
    pub fn message(&self) -> MessageRef {
        MessageRef::new(self.channel_id, self.message_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default, with = "snowflake::option")]
    pub guild_id: Option<GuildId>,
    #[serde(with = "snowflake")]
    pub channel_id: ChannelId,
    #[serde(with = "snowflake")]
    pub message_id: MessageId,
    #[serde(with = "snowflake")]
    pub author_id: UserId,
    #[serde(default)]
    pub author_bot: bool,
    pub content: String,
}

impl MessageEvent {
    pub fn message(&self) -> MessageRef {
        MessageRef::new(self.channel_id, self.message_id)
    }
}
