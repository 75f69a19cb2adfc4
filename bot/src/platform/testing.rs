//! In-memory `ChatPlatform` that records every call and tallies reactions
//! the way Discord does.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{ChatPlatform, FetchedMessage, OutgoingMessage, ReactionCount};
use crate::engine::cup::{ChannelId, MessageId, MessageRef, UserId, UserIdentity};
use crate::engine::effects::Activity;
use crate::error::CupError;

pub const BOT_USER_ID: UserId = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendMessage {
        channel_id: ChannelId,
        message_id: MessageId,
        message: OutgoingMessage,
    },
    SendDirect {
        user_id: UserId,
        content: String,
    },
    DeleteMessage(MessageRef),
    AddReaction {
        message: MessageRef,
        glyph: String,
    },
    RemoveReaction {
        message: MessageRef,
        glyph: String,
        user_id: UserId,
    },
    SetPresence(Activity),
    FetchAvatar(UserId),
}

/// Glyph to reactor ids, in the order glyphs were first used.
#[derive(Default)]
struct StoredMessage {
    reactions: Vec<(String, Vec<UserId>)>,
}

pub struct RecordingPlatform {
    users: Mutex<HashMap<UserId, UserIdentity>>,
    messages: Mutex<HashMap<MessageRef, StoredMessage>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    fail_announcements: AtomicBool,
    fail_avatars: AtomicBool,
    fail_reactions: AtomicBool,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        let platform = Self {
            users: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            fail_announcements: AtomicBool::new(false),
            fail_avatars: AtomicBool::new(false),
            fail_reactions: AtomicBool::new(false),
        };
        let mut bot = UserIdentity::new(BOT_USER_ID, "cupbot");
        bot.bot = true;
        platform.users.lock().unwrap().insert(BOT_USER_ID, bot);
        platform
    }
}

impl RecordingPlatform {
    pub fn add_user(&self, id: UserId, name: &str) -> UserIdentity {
        let user = UserIdentity::new(id, name);
        self.users.lock().unwrap().insert(id, user.clone());
        user
    }

    pub fn add_bot(&self, id: UserId, name: &str) -> UserIdentity {
        let mut user = UserIdentity::new(id, name);
        user.bot = true;
        self.users.lock().unwrap().insert(id, user.clone());
        user
    }

    /// Make a message exist upstream without the bot having posted it.
    pub fn insert_message(&self, message: MessageRef) {
        self.messages
            .lock()
            .unwrap()
            .insert(message, StoredMessage::default());
    }

    /// Record a user's reaction upstream, as Discord would before delivering the event.
    pub fn user_reacts(&self, message: MessageRef, glyph: &str, user_id: UserId) {
        let mut messages = self.messages.lock().unwrap();
        let stored = messages.entry(message).or_default();
        add_reactor(stored, glyph, user_id);
    }

    /// Drop a user's reaction upstream.
    pub fn user_unreacts(&self, message: MessageRef, glyph: &str, user_id: UserId) {
        let mut messages = self.messages.lock().unwrap();
        if let Some(stored) = messages.get_mut(&message) {
            remove_reactor(stored, glyph, user_id);
        }
    }

    pub fn fail_announcements(&self, fail: bool) {
        self.fail_announcements.store(fail, Ordering::SeqCst);
    }

    pub fn fail_avatars(&self, fail: bool) {
        self.fail_avatars.store(fail, Ordering::SeqCst);
    }

    /// Make the bot's own `add_reaction` calls fail.
    pub fn fail_reactions(&self, fail: bool) {
        self.fail_reactions.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Embeds sent so far, with the message id each one got.
    pub fn announcements(&self) -> Vec<(MessageId, OutgoingMessage)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendMessage {
                    message_id,
                    message,
                    ..
                } if message.embed.is_some() => Some((message_id, message)),
                _ => None,
            })
            .collect()
    }

    /// Plain text messages sent to channels.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendMessage { message, .. } => message.content,
                _ => None,
            })
            .collect()
    }

    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendDirect { user_id, content } => Some((user_id, content)),
                _ => None,
            })
            .collect()
    }

    pub fn removals(&self) -> Vec<(String, UserId)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RemoveReaction { glyph, user_id, .. } => Some((glyph, user_id)),
                _ => None,
            })
            .collect()
    }

    pub fn deletions(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteMessage(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn last_presence(&self) -> Option<Activity> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::SetPresence(a) => Some(a),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn add_reactor(stored: &mut StoredMessage, glyph: &str, user_id: UserId) {
    match stored.reactions.iter_mut().find(|(g, _)| g == glyph) {
        Some((_, users)) if !users.contains(&user_id) => users.push(user_id),
        Some(_) => {}
        None => stored.reactions.push((glyph.to_string(), vec![user_id])),
    }
}

fn remove_reactor(stored: &mut StoredMessage, glyph: &str, user_id: UserId) {
    if let Some((_, users)) = stored.reactions.iter_mut().find(|(g, _)| g == glyph) {
        users.retain(|u| *u != user_id);
    }
    stored.reactions.retain(|(_, users)| !users.is_empty());
}

impl ChatPlatform for RecordingPlatform {
    async fn fetch_user(&self, user_id: UserId) -> Result<UserIdentity, CupError> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| CupError::NotFound(format!("user {user_id}")))
    }

    async fn fetch_message(&self, message: MessageRef) -> Result<FetchedMessage, CupError> {
        let messages = self.messages.lock().unwrap();
        let stored = messages
            .get(&message)
            .ok_or_else(|| CupError::NotFound(format!("message {}", message.message_id)))?;
        Ok(FetchedMessage {
            message,
            reactions: stored
                .reactions
                .iter()
                .map(|(glyph, users)| ReactionCount {
                    glyph: glyph.clone(),
                    count: users.len(),
                    me: users.contains(&BOT_USER_ID),
                })
                .collect(),
        })
    }

    async fn fetch_reaction_users(
        &self,
        message: MessageRef,
        glyph: &str,
    ) -> Result<Vec<UserIdentity>, CupError> {
        let ids: Vec<UserId> = {
            let messages = self.messages.lock().unwrap();
            let stored = messages
                .get(&message)
                .ok_or_else(|| CupError::NotFound(format!("message {}", message.message_id)))?;
            stored
                .reactions
                .iter()
                .find(|(g, _)| g == glyph)
                .map(|(_, users)| users.clone())
                .unwrap_or_default()
        };
        let users = self.users.lock().unwrap();
        Ok(ids
            .into_iter()
            .filter_map(|id| users.get(&id).cloned())
            .collect())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, CupError> {
        if message.embed.is_some() && self.fail_announcements.load(Ordering::SeqCst) {
            return Err(CupError::ExternalIo("HTTP 503".into()));
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.insert_message(MessageRef::new(channel_id, message_id));
        self.record(Call::SendMessage {
            channel_id,
            message_id,
            message,
        });
        Ok(message_id)
    }

    async fn send_direct(&self, user_id: UserId, content: &str) -> Result<(), CupError> {
        self.record(Call::SendDirect {
            user_id,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), CupError> {
        self.messages.lock().unwrap().remove(&message);
        self.record(Call::DeleteMessage(message));
        Ok(())
    }

    async fn add_reaction(&self, message: MessageRef, glyph: &str) -> Result<(), CupError> {
        if self.fail_reactions.load(Ordering::SeqCst) {
            return Err(CupError::ExternalIo("HTTP 503".into()));
        }
        self.user_reacts(message, glyph, BOT_USER_ID);
        self.record(Call::AddReaction {
            message,
            glyph: glyph.to_string(),
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: MessageRef,
        glyph: &str,
        user_id: UserId,
    ) -> Result<(), CupError> {
        self.user_unreacts(message, glyph, user_id);
        self.record(Call::RemoveReaction {
            message,
            glyph: glyph.to_string(),
            user_id,
        });
        Ok(())
    }

    async fn set_presence(&self, activity: Activity) -> Result<(), CupError> {
        self.record(Call::SetPresence(activity));
        Ok(())
    }

    async fn fetch_avatar(&self, user_id: UserId) -> Result<Vec<u8>, CupError> {
        self.record(Call::FetchAvatar(user_id));
        if self.fail_avatars.load(Ordering::SeqCst) {
            return Err(CupError::ExternalIo(format!("avatar {user_id}: HTTP 404")));
        }
        Ok(vec![0x89, b'P', b'N', b'G', user_id as u8])
    }
}
