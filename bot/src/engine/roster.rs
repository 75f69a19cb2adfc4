//! Roster reconciliation state machine.
//!
//! Owns the single active cup and applies every reaction event as a
//! transition. Transitions are synchronous and do no I/O: they mutate the cup
//! and return the effects the engine should execute.
//!
//! States: `Inactive` (no cup), `Accepting` (confirmed < team size) and `Full`.

use tracing::{debug, info, warn};

use super::capacity::{evaluate_fill, evaluate_retraction};
use super::cup::{
    Announcement, Cup, GuildId, MessageId, MessageRef, RosterSnapshot, RosterState, UserIdentity,
};
use super::effects::{Activity, Effect};
use super::events::ReactionEvent;
use crate::error::CupError;

/// Fixed parameters of the roster for the process lifetime.
#[derive(Debug, Clone)]
pub struct RosterSettings {
    pub guild_id: GuildId,
    pub team_size: usize,
    pub confirm_glyph: String,
    pub tentative_glyph: String,
    /// When false the tentative glyph is treated like any other noise reaction.
    pub maybe_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glyph {
    Confirm,
    Tentative,
    Other,
}

impl RosterSettings {
    fn classify(&self, emoji: &str) -> Glyph {
        if emoji == self.confirm_glyph {
            Glyph::Confirm
        } else if self.maybe_enabled && emoji == self.tentative_glyph {
            Glyph::Tentative
        } else {
            Glyph::Other
        }
    }
}

/// Users read off an existing signup message by the administrator load path.
#[derive(Debug, Clone, Default)]
pub struct Seed {
    pub confirmed: Vec<UserIdentity>,
    pub maybe: Vec<UserIdentity>,
}

/// Result of an explicit request to announce the team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Formation fired; execute these effects.
    Fired(Vec<Effect>),
    /// An announcement is already live.
    AlreadyAnnounced,
    /// An announcement is on its way.
    InFlight,
    NotFull { missing: usize },
}

pub struct RosterMachine {
    settings: RosterSettings,
    cup: Option<Cup>,
    /// Monotonic formation counter, never reset so stale results stay detectable.
    formations: u64,
}

impl RosterMachine {
    pub fn new(settings: RosterSettings) -> Self {
        Self {
            settings,
            cup: None,
            formations: 0,
        }
    }

    pub fn state(&self) -> RosterState {
        match &self.cup {
            None => RosterState::Inactive,
            Some(cup) if cup.confirmed.len() >= self.settings.team_size => RosterState::Full,
            Some(_) => RosterState::Accepting,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cup.is_some()
    }

    pub fn signup(&self) -> Option<MessageRef> {
        self.cup.as_ref().map(|c| c.signup)
    }

    pub fn is_signup_message(&self, message_id: MessageId) -> bool {
        self.cup
            .as_ref()
            .is_some_and(|c| c.signup.message_id == message_id)
    }

    pub fn current_roster(&self) -> RosterSnapshot {
        RosterSnapshot {
            state: self.state(),
            team_size: self.settings.team_size,
            signup: self.signup(),
            announcement_message_id: self.cup.as_ref().and_then(|c| c.announcement_message_id()),
            confirmed: self
                .cup
                .as_ref()
                .map(|c| c.confirmed.clone())
                .unwrap_or_default(),
            maybe: self
                .cup
                .as_ref()
                .map(|c| c.maybe.clone())
                .unwrap_or_default(),
            opened_at: self.cup.as_ref().map(|c| c.opened_at),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Start a cup on `signup`. Seeds are clipped so the invariants hold: bots
    /// are skipped, confirmed beyond the team size is dropped (and its mark
    /// removed), and a user in both seeds stays confirmed only.
    pub fn open(&mut self, signup: MessageRef, seed: Option<Seed>) -> Result<Vec<Effect>, CupError> {
        if let Some(cup) = &self.cup {
            warn!(
                active = cup.signup.message_id,
                requested = signup.message_id,
                "refusing to open a cup while one is active"
            );
            return Err(CupError::Conflict);
        }

        let mut cup = Cup::new(signup);
        let mut effects = match seed {
            Some(seed) => self.apply_seed(&mut cup, seed),
            None => Vec::new(),
        };

        effects.extend(evaluate_fill(
            &mut cup,
            self.settings.team_size,
            &mut self.formations,
        ));

        info!(
            message_id = signup.message_id,
            confirmed = cup.confirmed.len(),
            maybe = cup.maybe.len(),
            "cup opened"
        );
        self.cup = Some(cup);
        Ok(effects)
    }

    fn apply_seed(&self, cup: &mut Cup, seed: Seed) -> Vec<Effect> {
        let mut effects = Vec::new();

        for user in seed.confirmed {
            if user.bot || cup.is_confirmed(user.id) {
                continue;
            }
            if cup.confirmed.len() >= self.settings.team_size {
                warn!(user_id = user.id, "seed exceeds team size, dropping confirm mark");
                effects.push(Effect::RemoveReaction {
                    message: cup.signup,
                    glyph: self.settings.confirm_glyph.clone(),
                    user_id: user.id,
                });
                continue;
            }
            cup.confirmed.push(user);
        }

        if !self.settings.maybe_enabled {
            return effects;
        }

        for user in seed.maybe {
            if user.bot || cup.is_maybe(user.id) {
                continue;
            }
            if cup.is_confirmed(user.id) {
                effects.push(Effect::RemoveReaction {
                    message: cup.signup,
                    glyph: self.settings.tentative_glyph.clone(),
                    user_id: user.id,
                });
                continue;
            }
            cup.maybe.push(user);
        }

        effects
    }

    /// End the cup and forget everything about it.
    pub fn close(&mut self) -> Result<Vec<Effect>, CupError> {
        let Some(cup) = self.cup.take() else {
            return Err(CupError::NoActiveCup);
        };

        info!(
            message_id = cup.signup.message_id,
            confirmed = cup.confirmed.len(),
            "cup closed"
        );
        Ok(vec![Effect::SetPresence {
            activity: Activity::Idle,
        }])
    }

    // ── Reaction transitions ────────────────────────────────────────

    /// Apply a reaction added to a message.
    ///
    /// `confirm_count` is the number of non-bot confirm reactions on the signup
    /// message as fetched from Discord while handling this event. It is checked
    /// instead of the internal list because other adds may already be counted
    /// upstream but not yet applied here.
    pub fn apply_reaction_added(
        &mut self,
        event: &ReactionEvent,
        user: &UserIdentity,
        confirm_count: usize,
    ) -> Vec<Effect> {
        let settings = &self.settings;
        let Some(cup) = self.cup.as_mut() else {
            return Vec::new();
        };
        if !is_relevant(settings, cup, event, user) {
            return Vec::new();
        }

        let team_size = settings.team_size;
        let signup = cup.signup;
        let reject = |glyph: &str| Effect::RemoveReaction {
            message: signup,
            glyph: glyph.to_string(),
            user_id: user.id,
        };

        match settings.classify(&event.emoji) {
            Glyph::Confirm if cup.is_maybe(user.id) => {
                if cup.confirmed.len() >= team_size {
                    debug!(user_id = user.id, "promotion refused, team is full");
                    return vec![reject(&settings.confirm_glyph)];
                }
                let stale = reject(&settings.tentative_glyph);
                if let Some(promoted) = cup.take_maybe(user.id) {
                    cup.confirmed.push(promoted);
                }
                info!(user_id = user.id, "promoted from maybe to confirmed");

                let mut effects = vec![stale];
                effects.extend(evaluate_fill(cup, team_size, &mut self.formations));
                effects
            }

            Glyph::Tentative if cup.is_confirmed(user.id) => {
                let stale = reject(&settings.confirm_glyph);
                if let Some(demoted) = cup.take_confirmed(user.id) {
                    cup.maybe.push(demoted);
                }
                info!(user_id = user.id, "demoted from confirmed to maybe");

                let mut effects = vec![stale];
                effects.extend(evaluate_retraction(cup, team_size));
                effects
            }

            Glyph::Other => {
                debug!(user_id = user.id, emoji = %event.emoji, "removing unrecognised reaction");
                vec![reject(&event.emoji)]
            }

            Glyph::Tentative => {
                if !cup.is_maybe(user.id) {
                    cup.maybe.push(user.clone());
                    info!(user_id = user.id, "added to maybe");
                }
                Vec::new()
            }

            Glyph::Confirm if cup.is_confirmed(user.id) => Vec::new(),

            Glyph::Confirm if confirm_count > team_size => {
                info!(
                    user_id = user.id,
                    confirm_count, "confirm count above team size, rejecting reaction"
                );
                vec![reject(&settings.confirm_glyph)]
            }

            Glyph::Confirm if cup.confirmed.len() >= team_size => {
                debug!(user_id = user.id, error = %CupError::CapacityExceeded, "rejecting reaction");
                vec![reject(&settings.confirm_glyph)]
            }

            Glyph::Confirm => {
                cup.confirmed.push(user.clone());
                info!(
                    user_id = user.id,
                    confirmed = cup.confirmed.len(),
                    team_size,
                    "admitted to roster"
                );
                evaluate_fill(cup, team_size, &mut self.formations)
                    .into_iter()
                    .collect()
            }
        }
    }

    /// Apply a reaction removed from a message. Only the confirm glyph matters.
    pub fn apply_reaction_removed(&mut self, event: &ReactionEvent, user: &UserIdentity) -> Vec<Effect> {
        let settings = &self.settings;
        let Some(cup) = self.cup.as_mut() else {
            return Vec::new();
        };
        if !is_relevant(settings, cup, event, user)
            || settings.classify(&event.emoji) != Glyph::Confirm
        {
            return Vec::new();
        }

        if cup.take_confirmed(user.id).is_none() {
            return Vec::new();
        }
        info!(
            user_id = user.id,
            confirmed = cup.confirmed.len(),
            "removed from roster"
        );

        evaluate_retraction(cup, settings.team_size)
    }

    // ── Announcement lifecycle ──────────────────────────────────────

    /// Manually (re)fire formation, e.g. after a failed announcement.
    pub fn request_announcement(&mut self) -> Result<AnnounceOutcome, CupError> {
        let team_size = self.settings.team_size;
        let Some(cup) = self.cup.as_mut() else {
            return Err(CupError::NoActiveCup);
        };

        match cup.announcement {
            Announcement::Posted { .. } => Ok(AnnounceOutcome::AlreadyAnnounced),
            Announcement::Pending { .. } => Ok(AnnounceOutcome::InFlight),
            Announcement::Absent => match evaluate_fill(cup, team_size, &mut self.formations) {
                Some(effect) => Ok(AnnounceOutcome::Fired(vec![effect])),
                None => Ok(AnnounceOutcome::NotFull {
                    missing: team_size.saturating_sub(cup.confirmed.len()),
                }),
            },
        }
    }

    /// Record that the announcement for `formation` was posted as `message`.
    ///
    /// If the roster was retracted or closed while the announcement was in
    /// flight, the message is stale and gets deleted instead.
    pub fn announcement_posted(&mut self, formation: u64, message: MessageRef) -> Vec<Effect> {
        match self.cup.as_mut() {
            Some(cup) if cup.announcement == (Announcement::Pending { formation }) => {
                cup.announcement = Announcement::Posted { message };
                info!(formation, message_id = message.message_id, "team announced");
                vec![Effect::SetPresence {
                    activity: Activity::team(&cup.confirmed),
                }]
            }
            _ => {
                info!(formation, message_id = message.message_id, "deleting stale announcement");
                vec![Effect::DeleteMessage { message }]
            }
        }
    }

    /// Record that the announcement for `formation` could not be posted. The
    /// roster stays as it is; the trigger re-arms on the next qualifying
    /// mutation or an explicit request.
    pub fn announcement_failed(&mut self, formation: u64) {
        if let Some(cup) = self.cup.as_mut()
            && cup.announcement == (Announcement::Pending { formation })
        {
            cup.announcement = Announcement::Absent;
        }
    }
}

/// Event filter shared by both reaction transitions.
fn is_relevant(
    settings: &RosterSettings,
    cup: &Cup,
    event: &ReactionEvent,
    user: &UserIdentity,
) -> bool {
    !user.bot
        && user.id == event.user_id
        && event.message_id == cup.signup.message_id
        && event.guild_id == Some(settings.guild_id)
}
