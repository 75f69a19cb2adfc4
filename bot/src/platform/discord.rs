//! Discord REST v10 implementation of `ChatPlatform`.
//!
//! Gateway events arrive through the relay endpoint; everything the bot does
//! in response goes out through here. Presence is gateway-only, so it is
//! published on a watch channel that the relay polls via `GET /presence`.

use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Attachment, ChatPlatform, FetchedMessage, OutgoingMessage, ReactionCount, snowflake};
use crate::config::DiscordSection;
use crate::engine::cup::{ChannelId, MessageId, MessageRef, UserId, UserIdentity};
use crate::engine::effects::Activity;
use crate::error::CupError;

/// Discord caps reaction user pages at 100.
const REACTION_PAGE_LIMIT: usize = 100;
/// Longest rate-limit wait honoured before giving up.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);
const AVATAR_SIZE: u32 = 128;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct ApiUser {
    #[serde(with = "snowflake")]
    id: UserId,
    username: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    bot: bool,
}

impl ApiUser {
    fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            name: self.username.clone(),
            bot: self.bot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEmoji {
    id: Option<String>,
    name: Option<String>,
}

impl ApiEmoji {
    /// The form reaction endpoints and relay events use: the unicode
    /// character, or `name:id` for custom emoji.
    fn glyph(&self) -> String {
        let name = self.name.as_deref().unwrap_or_default();
        match &self.id {
            Some(id) => format!("{name}:{id}"),
            None => name.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiReaction {
    count: usize,
    #[serde(default)]
    me: bool,
    emoji: ApiEmoji,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(with = "snowflake")]
    id: MessageId,
    #[serde(with = "snowflake")]
    channel_id: ChannelId,
    #[serde(default)]
    reactions: Vec<ApiReaction>,
}

impl ApiMessage {
    fn into_fetched(self) -> FetchedMessage {
        FetchedMessage {
            message: MessageRef::new(self.channel_id, self.id),
            reactions: self
                .reactions
                .into_iter()
                .map(|r| ReactionCount {
                    glyph: r.emoji.glyph(),
                    count: r.count,
                    me: r.me,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChannel {
    #[serde(with = "snowflake")]
    id: ChannelId,
}

/// JSON body for a create-message call.
fn message_payload(message: &OutgoingMessage) -> Value {
    let mut payload = json!({ "allowed_mentions": { "parse": ["users", "roles"] } });
    if let Some(content) = &message.content {
        payload["content"] = json!(content);
    }
    if let Some(embed) = &message.embed {
        let mut body = json!({
            "title": embed.title,
            "description": embed.description,
            "color": embed.color,
            "fields": embed
                .fields
                .iter()
                .map(|f| json!({ "name": f.name, "value": f.value, "inline": f.inline }))
                .collect::<Vec<_>>(),
        });
        if let Some(url) = &embed.thumbnail_url {
            body["thumbnail"] = json!({ "url": url });
        }
        if let Some(text) = &embed.footer {
            body["footer"] = json!({ "text": text });
        }
        payload["embeds"] = json!([body]);
    }
    if let Some(attachment) = &message.attachment {
        payload["attachments"] = json!([{ "id": 0, "filename": attachment.filename }]);
    }
    payload
}

fn multipart_form(payload: &Value, attachment: &Attachment) -> reqwest::Result<Form> {
    let file = Part::bytes(attachment.bytes.clone())
        .file_name(attachment.filename.clone())
        .mime_str(&attachment.content_type)?;
    Ok(Form::new()
        .text("payload_json", payload.to_string())
        .part("files[0]", file))
}

fn default_avatar_index(user_id: UserId) -> u64 {
    (user_id >> 22) % 6
}

fn retry_after(response: &Response) -> Duration {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_secs(1))
        .min(MAX_RETRY_AFTER)
}

fn io_error(what: &str, e: impl std::fmt::Display) -> CupError {
    CupError::ExternalIo(format!("{what}: {e}"))
}

// ── Client ──────────────────────────────────────────────────────────

pub struct DiscordRest {
    client: reqwest::Client,
    api_base: String,
    cdn_base: String,
    token: String,
    users: DashMap<UserId, ApiUser>,
    /// Recipient to DM channel.
    dm_channels: DashMap<UserId, ChannelId>,
    presence: watch::Sender<Activity>,
}

impl DiscordRest {
    pub fn new(config: &DiscordSection) -> Self {
        let (presence, _) = watch::channel(Activity::Idle);
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cdn_base: config.cdn_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            users: DashMap::new(),
            dm_channels: DashMap::new(),
            presence,
        }
    }

    /// Activity changes, for the relay to apply over the gateway.
    pub fn presence(&self) -> watch::Receiver<Activity> {
        self.presence.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn reaction_path(message: MessageRef, glyph: &str) -> String {
        format!(
            "/channels/{}/messages/{}/reactions/{}",
            message.channel_id,
            message.message_id,
            urlencoding::encode(glyph)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    /// Send an authorized request, retrying once if Discord rate limits it.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, CupError> {
        let mut retry = request.try_clone();
        self.send_retrying(request, move || retry.take(), what)
            .await
    }

    /// Send `request`; on 429, wait and send whatever `rebuild` returns.
    /// Multipart bodies cannot be cloned, so their callers rebuild the form.
    async fn send_retrying(
        &self,
        request: RequestBuilder,
        mut rebuild: impl FnMut() -> Option<RequestBuilder> + Send,
        what: &str,
    ) -> Result<Response, CupError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| io_error(what, e))?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS
            && let Some(retry) = rebuild()
        {
            let wait = retry_after(&response);
            warn!(what, wait_ms = wait.as_millis() as u64, "rate limited by Discord, retrying");
            tokio::time::sleep(wait).await;
            let response = self
                .authorize(retry)
                .send()
                .await
                .map_err(|e| io_error(what, e))?;
            return check_status(response, what);
        }
        check_status(response, what)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, CupError> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| io_error(what, e))
    }

    async fn api_user(&self, user_id: UserId) -> Result<ApiUser, CupError> {
        if let Some(user) = self.users.get(&user_id) {
            return Ok(user.value().clone());
        }
        let user: ApiUser = self
            .send_json(
                self.client.get(self.url(&format!("/users/{user_id}"))),
                &format!("user {user_id}"),
            )
            .await?;
        self.users.insert(user_id, user.clone());
        Ok(user)
    }

    async fn dm_channel(&self, user_id: UserId) -> Result<ChannelId, CupError> {
        if let Some(channel_id) = self.dm_channels.get(&user_id) {
            return Ok(*channel_id.value());
        }
        let channel: ApiChannel = self
            .send_json(
                self.client
                    .post(self.url("/users/@me/channels"))
                    .json(&json!({ "recipient_id": user_id.to_string() })),
                &format!("DM channel for {user_id}"),
            )
            .await?;
        self.dm_channels.insert(user_id, channel.id);
        Ok(channel.id)
    }

    fn avatar_url(&self, user: &ApiUser) -> String {
        match &user.avatar {
            Some(hash) => format!(
                "{}/avatars/{}/{hash}.png?size={AVATAR_SIZE}",
                self.cdn_base, user.id
            ),
            None => format!(
                "{}/embed/avatars/{}.png",
                self.cdn_base,
                default_avatar_index(user.id)
            ),
        }
    }
}

fn check_status(response: Response, what: &str) -> Result<Response, CupError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(CupError::NotFound(what.to_string()))
    } else {
        Err(CupError::ExternalIo(format!("{what}: HTTP {}", status.as_u16())))
    }
}

impl ChatPlatform for DiscordRest {
    async fn fetch_user(&self, user_id: UserId) -> Result<UserIdentity, CupError> {
        Ok(self.api_user(user_id).await?.identity())
    }

    async fn fetch_message(&self, message: MessageRef) -> Result<FetchedMessage, CupError> {
        let fetched: ApiMessage = self
            .send_json(
                self.client.get(self.url(&format!(
                    "/channels/{}/messages/{}",
                    message.channel_id, message.message_id
                ))),
                &format!("message {}", message.message_id),
            )
            .await?;
        Ok(fetched.into_fetched())
    }

    async fn fetch_reaction_users(
        &self,
        message: MessageRef,
        glyph: &str,
    ) -> Result<Vec<UserIdentity>, CupError> {
        let path = Self::reaction_path(message, glyph);
        let what = format!("{glyph} reactions on {}", message.message_id);
        let mut users = Vec::new();
        let mut after: Option<UserId> = None;

        loop {
            let mut request = self
                .client
                .get(self.url(&path))
                .query(&[("limit", REACTION_PAGE_LIMIT.to_string())]);
            if let Some(after) = after {
                request = request.query(&[("after", after.to_string())]);
            }

            let page: Vec<ApiUser> = self.send_json(request, &what).await?;
            let page_len = page.len();
            after = page.last().map(|u| u.id);
            for user in page {
                users.push(user.identity());
                self.users.insert(user.id, user);
            }
            if page_len < REACTION_PAGE_LIMIT {
                break;
            }
        }

        debug!(message_id = message.message_id, %glyph, count = users.len(), "fetched reaction users");
        Ok(users)
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, CupError> {
        let what = format!("send to channel {channel_id}");
        let payload = message_payload(&message);
        let url = self.url(&format!("/channels/{channel_id}/messages"));

        let response = match &message.attachment {
            Some(attachment) => {
                let form = multipart_form(&payload, attachment).map_err(|e| io_error(&what, e))?;
                let rebuild = || {
                    multipart_form(&payload, attachment)
                        .ok()
                        .map(|form| self.client.post(&url).multipart(form))
                };
                self.send_retrying(self.client.post(&url).multipart(form), rebuild, &what)
                    .await?
            }
            None => self.send(self.client.post(&url).json(&payload), &what).await?,
        };

        let sent: ApiMessage = response.json().await.map_err(|e| io_error(&what, e))?;
        Ok(sent.id)
    }

    async fn send_direct(&self, user_id: UserId, content: &str) -> Result<(), CupError> {
        let channel_id = self.dm_channel(user_id).await?;
        self.send_message(channel_id, OutgoingMessage::text(content))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), CupError> {
        self.send(
            self.client.delete(self.url(&format!(
                "/channels/{}/messages/{}",
                message.channel_id, message.message_id
            ))),
            &format!("delete message {}", message.message_id),
        )
        .await?;
        Ok(())
    }

    async fn add_reaction(&self, message: MessageRef, glyph: &str) -> Result<(), CupError> {
        let path = format!("{}/@me", Self::reaction_path(message, glyph));
        self.send(
            self.client.put(self.url(&path)),
            &format!("add {glyph} to {}", message.message_id),
        )
        .await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: MessageRef,
        glyph: &str,
        user_id: UserId,
    ) -> Result<(), CupError> {
        let path = format!("{}/{user_id}", Self::reaction_path(message, glyph));
        self.send(
            self.client.delete(self.url(&path)),
            &format!("remove {glyph} of {user_id}"),
        )
        .await?;
        Ok(())
    }

    async fn set_presence(&self, activity: Activity) -> Result<(), CupError> {
        self.presence.send_replace(activity);
        Ok(())
    }

    async fn fetch_avatar(&self, user_id: UserId) -> Result<Vec<u8>, CupError> {
        let user = self.api_user(user_id).await?;
        let what = format!("avatar of {user_id}");
        let response = self
            .client
            .get(self.avatar_url(&user))
            .send()
            .await
            .map_err(|e| io_error(&what, e))?;
        let bytes = check_status(response, &what)?
            .bytes()
            .await
            .map_err(|e| io_error(&what, e))?;
        Ok(bytes.to_vec())
    }
}
