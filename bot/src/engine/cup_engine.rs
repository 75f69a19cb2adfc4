use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::try_join_all;
use tracing::{debug, error, info, warn};

use super::announcement::{self, cooldown_text, ping_text, roster_text, signup_text};
use super::collage;
use super::commands::Command;
use super::cup::{
    ChannelId, MessageId, MessageRef, RosterSnapshot, RosterState, UserId, UserIdentity,
};
use super::effects::{Activity, Effect};
use super::events::{InboundEvent, MessageEvent, ReactionEvent};
use super::rate_limiter::RateLimiter;
use super::roster::{AnnounceOutcome, RosterMachine, Seed};
use crate::config::{AnnouncementSection, BotConfig, CupSection};
use crate::error::CupError;
use crate::platform::{Attachment, ChatPlatform, OutgoingMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    Sent,
    /// Players are only pinged when exactly one spot is left.
    NotNeeded { open_slots: usize },
    Cooldown(Duration),
}

/// Runs the roster state machine against a chat platform.
///
/// Each transition happens under the roster lock and returns effects; the lock
/// is released before any effect touches the network, so effect I/O never
/// blocks the next event's mutation.
pub struct CupEngine<P> {
    platform: Arc<P>,
    roster: Mutex<RosterMachine>,
    cup: CupSection,
    announcement: AnnouncementSection,
    /// One `!ping` per channel per cooldown window.
    ping_limiter: RateLimiter,
}

impl<P: ChatPlatform> CupEngine<P> {
    pub fn new(platform: Arc<P>, config: &BotConfig) -> Self {
        Self {
            platform,
            roster: Mutex::new(RosterMachine::new(config.roster_settings())),
            cup: config.cup.clone(),
            announcement: config.announcement.clone(),
            ping_limiter: RateLimiter::new(1, config.cup.ping_cooldown_secs.max(1) as f64),
        }
    }

    fn with_roster<R>(&self, f: impl FnOnce(&mut RosterMachine) -> R) -> R {
        let mut roster = self.roster.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut roster)
    }

    pub fn roster(&self) -> RosterSnapshot {
        self.with_roster(|r| r.current_roster())
    }

    // ── Inbound events ──────────────────────────────────────────────

    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Ready => {
                info!("gateway relay ready");
                let snapshot = self.roster();
                let activity = match snapshot.announcement_message_id {
                    Some(_) => Activity::team(&snapshot.confirmed),
                    None => Activity::Idle,
                };
                self.execute(vec![Effect::SetPresence { activity }]).await;
            }
            InboundEvent::ReactionAdd(reaction) => self.reaction_added(reaction).await,
            InboundEvent::ReactionRemove(reaction) => self.reaction_removed(reaction).await,
            InboundEvent::MessageCreate(message) => self.handle_message(message).await,
        }
    }

    pub async fn reaction_added(&self, event: ReactionEvent) {
        let Some(user) = self.reacting_user(&event).await else {
            return;
        };

        // Only the confirm glyph is checked against the upstream count.
        let confirm_count = if event.emoji == self.cup.confirm_glyph {
            match self.confirm_count(event.message()).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(message_id = event.message_id, error = %e, "failed to count confirm reactions");
                    return;
                }
            }
        } else {
            0
        };

        let effects = self.with_roster(|r| r.apply_reaction_added(&event, &user, confirm_count));
        self.execute(effects).await;
    }

    pub async fn reaction_removed(&self, event: ReactionEvent) {
        let Some(user) = self.reacting_user(&event).await else {
            return;
        };
        let effects = self.with_roster(|r| r.apply_reaction_removed(&event, &user));
        self.execute(effects).await;
    }

    /// Confirm reactions on `signup` from non-bot users.
    ///
    /// The message tally only tells the bot's own reaction apart. When it
    /// reads over capacity, the reactor list is fetched so that other bots'
    /// marks, which are never admitted or removed, do not hold a slot.
    async fn confirm_count(&self, signup: MessageRef) -> Result<usize, CupError> {
        let glyph = &self.cup.confirm_glyph;
        let tally = self.platform.fetch_message(signup).await?.human_count(glyph);
        if tally <= self.cup.team_size {
            return Ok(tally);
        }
        let reactors = self.platform.fetch_reaction_users(signup, glyph).await?;
        let humans = reactors.iter().filter(|u| !u.bot).count();
        debug!(tally, humans, "recounted confirm reactions without bots");
        Ok(humans)
    }

    /// Cheap filtering before any I/O, then the user lookup. Bots and
    /// unknown users yield `None`.
    async fn reacting_user(&self, event: &ReactionEvent) -> Option<UserIdentity> {
        if event.guild_id != Some(self.cup.guild_id)
            || !self.with_roster(|r| r.is_signup_message(event.message_id))
        {
            return None;
        }

        match self.platform.fetch_user(event.user_id).await {
            Ok(user) if user.bot => None,
            Ok(user) => Some(user),
            Err(e) => {
                warn!(user_id = event.user_id, error = %e, "failed to fetch reacting user");
                None
            }
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    pub async fn handle_message(&self, message: MessageEvent) {
        if message.author_bot
            || message.guild_id != Some(self.cup.guild_id)
            || message.channel_id != self.cup.channel_id
        {
            return;
        }
        let Some(command) = Command::parse(&message.content, &self.cup.command_prefix) else {
            return;
        };
        debug!(?command, author_id = message.author_id, "command received");

        let author = message.author_id;
        let channel = message.channel_id;
        match command {
            Command::Cup => {
                if let Err(e) = self.open_cup(channel).await {
                    self.notify(author, &e.notice()).await;
                }
            }
            Command::EndCup => match self.close_cup().await {
                Ok(()) => self.say(channel, "The cup has now ended").await,
                Err(e) => self.notify(author, &e.notice()).await,
            },
            Command::LoadCup(id) => self.load_command(&message, id).await,
            Command::Ping => match self.ping(channel, author).await {
                Ok(PingOutcome::Cooldown(retry)) => self.say(channel, &cooldown_text(retry)).await,
                Ok(PingOutcome::Sent | PingOutcome::NotNeeded { .. }) => {}
                Err(e) => self.notify(author, &e.notice()).await,
            },
            Command::Team => match self.request_team().await {
                Ok(AnnounceOutcome::Fired(_)) => {}
                Ok(AnnounceOutcome::AlreadyAnnounced) => {
                    self.notify(author, "The team has already been announced")
                        .await
                }
                Ok(AnnounceOutcome::InFlight) => {
                    self.notify(author, "The team announcement is on its way")
                        .await
                }
                Ok(AnnounceOutcome::NotFull { missing }) => {
                    self.notify(
                        author,
                        &format!("The team still needs {missing} more player(s)"),
                    )
                    .await
                }
                Err(e) => self.notify(author, &e.notice()).await,
            },
            Command::Roster => self.say(channel, &roster_text(&self.roster())).await,
        }
    }

    async fn load_command(&self, message: &MessageEvent, id: Option<MessageId>) {
        if message.author_id != self.cup.admin_user_id {
            warn!(author_id = message.author_id, "ignoring loadcup from non-admin");
            return;
        }
        let Some(message_id) = id else {
            return;
        };

        match self
            .load_cup(MessageRef::new(message.channel_id, message_id))
            .await
        {
            Ok(_) => self.notify(message.author_id, "Loaded Cup!").await,
            Err(CupError::Conflict) => {
                self.notify(
                    message.author_id,
                    "Cannot load cup. There is a cup in progress",
                )
                .await
            }
            Err(e) => self.notify(message.author_id, &e.notice()).await,
        }

        if let Err(e) = self.platform.delete_message(message.message()).await {
            warn!(error = %e, "failed to delete loadcup command");
        }
    }

    // ── Administrative operations ───────────────────────────────────

    /// Post a fresh signup message in `channel_id` and open a cup on it.
    pub async fn open_cup(&self, channel_id: ChannelId) -> Result<MessageRef, CupError> {
        if self.with_roster(|r| r.is_active()) {
            return Err(CupError::Conflict);
        }

        let message_id = self
            .platform
            .send_message(channel_id, OutgoingMessage::text(signup_text(self.cup.role_id)))
            .await?;
        let signup = MessageRef::new(channel_id, message_id);

        let effects = match self.with_roster(|r| r.open(signup, None)) {
            Ok(effects) => effects,
            Err(e) => {
                if let Err(delete_err) = self.platform.delete_message(signup).await {
                    warn!(error = %delete_err, "failed to delete orphaned signup message");
                }
                return Err(e);
            }
        };
        self.execute(effects).await;

        // The cup is open from here on; a missing glyph only costs users a click.
        let mut glyphs = vec![&self.cup.confirm_glyph];
        if self.cup.maybe_enabled {
            glyphs.push(&self.cup.tentative_glyph);
        }
        for glyph in glyphs {
            if let Err(e) = self.platform.add_reaction(signup, glyph).await {
                warn!(message_id, %glyph, error = %e, "failed to add signup reaction");
            }
        }

        info!(message_id, "signup posted");
        Ok(signup)
    }

    pub async fn close_cup(&self) -> Result<(), CupError> {
        let effects = self.with_roster(|r| r.close())?;
        self.execute(effects).await;
        Ok(())
    }

    /// Rebuild the cup from the reactions on an existing signup message,
    /// typically after a restart.
    pub async fn load_cup(&self, signup: MessageRef) -> Result<RosterSnapshot, CupError> {
        if self.with_roster(|r| r.is_active()) {
            return Err(CupError::Conflict);
        }

        let fetched = self.platform.fetch_message(signup).await?;
        let confirmed = self
            .platform
            .fetch_reaction_users(signup, &self.cup.confirm_glyph)
            .await?;
        let maybe = if self.cup.maybe_enabled {
            self.platform
                .fetch_reaction_users(signup, &self.cup.tentative_glyph)
                .await?
        } else {
            Vec::new()
        };

        let mut effects = self.with_roster(|r| r.open(fetched.message, Some(Seed { confirmed, maybe })))?;
        let snapshot = self.roster();
        effects.insert(
            0,
            Effect::SetPresence {
                activity: Activity::team(&snapshot.confirmed),
            },
        );
        self.execute(effects).await;

        info!(
            message_id = signup.message_id,
            confirmed = snapshot.confirmed.len(),
            maybe = snapshot.maybe.len(),
            "cup loaded from existing message"
        );
        Ok(self.roster())
    }

    pub async fn ping(&self, channel_id: ChannelId, author_id: UserId) -> Result<PingOutcome, CupError> {
        if let Err(retry) = self.ping_limiter.check(&channel_id.to_string()) {
            return Ok(PingOutcome::Cooldown(retry));
        }

        let snapshot = self.roster();
        if snapshot.state == RosterState::Inactive {
            return Err(CupError::NoActiveCup);
        }
        let open_slots = snapshot.open_slots();
        if open_slots != 1 {
            debug!(open_slots, "ping skipped");
            return Ok(PingOutcome::NotNeeded { open_slots });
        }

        self.platform
            .send_message(
                channel_id,
                OutgoingMessage::text(ping_text(author_id, &snapshot.confirmed)),
            )
            .await?;
        Ok(PingOutcome::Sent)
    }

    /// Fire formation by hand, e.g. after an announcement failed.
    pub async fn request_team(&self) -> Result<AnnounceOutcome, CupError> {
        let outcome = self.with_roster(|r| r.request_announcement())?;
        if let AnnounceOutcome::Fired(effects) = &outcome {
            self.execute(effects.clone()).await;
        }
        Ok(outcome)
    }

    // ── Effect interpreter ──────────────────────────────────────────

    /// Execute effects in order. Effects may produce follow-up effects (an
    /// announcement landing sets presence), which run after the current batch.
    async fn execute(&self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            queue.extend(self.execute_effect(effect).await);
        }
    }

    async fn execute_effect(&self, effect: Effect) -> Vec<Effect> {
        match effect {
            Effect::RemoveReaction {
                message,
                glyph,
                user_id,
            } => {
                if let Err(e) = self.platform.remove_reaction(message, &glyph, user_id).await {
                    warn!(user_id, %glyph, error = %e, "failed to remove reaction");
                }
                Vec::new()
            }

            Effect::DeleteMessage { message } => {
                if let Err(e) = self.platform.delete_message(message).await {
                    warn!(message_id = message.message_id, error = %e, "failed to delete message");
                }
                Vec::new()
            }

            Effect::SetPresence { activity } => {
                if let Err(e) = self.platform.set_presence(activity).await {
                    warn!(error = %e, "failed to update presence");
                }
                Vec::new()
            }

            Effect::AnnounceTeam {
                formation,
                signup,
                members,
            } => match self.post_announcement(signup, &members).await {
                Ok(message_id) => self.with_roster(|r| {
                    r.announcement_posted(formation, MessageRef::new(signup.channel_id, message_id))
                }),
                Err(e) => {
                    error!(formation, error = %e, "team announcement failed");
                    self.with_roster(|r| r.announcement_failed(formation));
                    self.report_failure(&e).await;
                    Vec::new()
                }
            },
        }
    }

    async fn post_announcement(
        &self,
        signup: MessageRef,
        members: &[UserIdentity],
    ) -> Result<MessageId, CupError> {
        let embed = announcement::team_embed(&self.announcement, self.cup.guild_id, signup, members);
        let mut message = OutgoingMessage::embed(embed);

        if self.announcement.collage_enabled {
            let avatars =
                try_join_all(members.iter().map(|u| self.platform.fetch_avatar(u.id))).await?;
            message = message.with_attachment(Attachment {
                filename: collage::FILENAME.into(),
                content_type: collage::CONTENT_TYPE.into(),
                bytes: collage::render_svg(&avatars).into_bytes(),
            });
        }

        self.platform.send_message(signup.channel_id, message).await
    }

    async fn report_failure(&self, error: &CupError) {
        let Some(channel_id) = self.announcement.operator_channel_id else {
            return;
        };
        let text = format!(
            "Team announcement failed: {error}. Use {}team to retry.",
            self.cup.command_prefix
        );
        if let Err(e) = self
            .platform
            .send_message(channel_id, OutgoingMessage::text(text))
            .await
        {
            error!(error = %e, "failed to report announcement failure");
        }
    }

    async fn say(&self, channel_id: ChannelId, text: &str) {
        if let Err(e) = self
            .platform
            .send_message(channel_id, OutgoingMessage::text(text))
            .await
        {
            warn!(channel_id, error = %e, "failed to send message");
        }
    }

    /// Private notice to a single user.
    async fn notify(&self, user_id: UserId, text: &str) {
        if let Err(e) = self.platform.send_direct(user_id, text).await {
            warn!(user_id, error = %e, "failed to send private notice");
        }
    }
}
