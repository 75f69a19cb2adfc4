use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::engine::cup::{ChannelId, GuildId, UserId};
use crate::engine::roster::RosterSettings;

/// Top-level bot configuration, loaded from cupbot.toml.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    pub discord: DiscordSection,
    pub cup: CupSection,
    pub announcement: AnnouncementSection,
    pub presence: PresenceSection,
    pub relay: RelaySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordSection {
    pub token: String,
    pub api_base: String,
    pub cdn_base: String,
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://discord.com/api/v10".into(),
            cdn_base: "https://cdn.discordapp.com".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CupSection {
    pub guild_id: GuildId,
    /// Commands are only accepted in this channel.
    pub channel_id: ChannelId,
    /// Role mentioned by the signup message.
    pub role_id: u64,
    /// The only user allowed to `!loadcup`.
    pub admin_user_id: UserId,
    pub team_size: usize,
    pub confirm_glyph: String,
    pub tentative_glyph: String,
    /// Disable to run with a single confirm glyph and no maybe pool.
    pub maybe_enabled: bool,
    pub command_prefix: String,
    pub ping_cooldown_secs: u64,
}

impl Default for CupSection {
    fn default() -> Self {
        Self {
            guild_id: 0,
            channel_id: 0,
            role_id: 0,
            admin_user_id: 0,
            team_size: 6,
            confirm_glyph: "✋".into(),
            tentative_glyph: "Ⓜ️".into(),
            maybe_enabled: true,
            command_prefix: "!".into(),
            ping_cooldown_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnouncementSection {
    pub title: String,
    pub color: u32,
    pub thumbnail_url: Option<String>,
    pub footer: Option<String>,
    /// Attach an avatar collage to the announcement.
    pub collage_enabled: bool,
    /// Where announcement failures are reported. Logged only when unset.
    pub operator_channel_id: Option<ChannelId>,
}

impl Default for AnnouncementSection {
    fn default() -> Self {
        Self {
            title: "Cup Team".into(),
            color: 0xffbb00,
            thumbnail_url: None,
            footer: None,
            collage_enabled: false,
            operator_channel_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenceSection {
    /// Activity shown while no team is formed.
    pub idle_name: String,
    /// Shown as a streaming activity when set.
    pub idle_url: Option<String>,
}

impl Default for PresenceSection {
    fn default() -> Self {
        Self {
            idle_name: "Cup signups".into(),
            idle_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    pub listen_address: String,
    /// Shared secret the gateway relay sends in `x-relay-token`.
    pub token: String,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".into(),
            token: String::new(),
        }
    }
}

impl BotConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self, String> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read config file {path}: {e}"))?;
            Self::from_toml(&contents)
                .map_err(|e| format!("failed to parse config file {path}: {e}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("DISCORD_TOKEN") {
            self.discord.token = v;
        }
        if let Some(v) = var("GUILD_ID")
            && let Ok(id) = v.parse()
        {
            self.cup.guild_id = id;
        }
        if let Some(v) = var("CUP_CHANNEL_ID")
            && let Ok(id) = v.parse()
        {
            self.cup.channel_id = id;
        }
        if let Some(v) = var("CUP_ROLE")
            && let Ok(id) = v.parse()
        {
            self.cup.role_id = id;
        }
        if let Some(v) = var("ADMIN_USER_ID")
            && let Ok(id) = v.parse()
        {
            self.cup.admin_user_id = id;
        }
        if let Some(v) = var("TEAM_SIZE")
            && let Ok(size) = v.parse()
        {
            self.cup.team_size = size;
        }
        if let Some(v) = var("MAYBE_ENABLED")
            && let Ok(enabled) = v.parse()
        {
            self.cup.maybe_enabled = enabled;
        }
        if let Some(v) = var("COLLAGE_ENABLED")
            && let Ok(enabled) = v.parse()
        {
            self.announcement.collage_enabled = enabled;
        }
        if let Some(v) = var("OPERATOR_CHANNEL_ID")
            && let Ok(id) = v.parse()
        {
            self.announcement.operator_channel_id = Some(id);
        }
        if let Some(v) = var("RELAY_ADDRESS") {
            self.relay.listen_address = v;
        }
        if let Some(v) = var("RELAY_TOKEN") {
            self.relay.token = v;
        }
    }

    /// Check the settings the bot cannot run without.
    pub fn validate(&self) -> Result<(), String> {
        if self.discord.token.is_empty() {
            return Err("DISCORD_TOKEN is not set".into());
        }
        if self.relay.token.is_empty() {
            return Err("RELAY_TOKEN is not set".into());
        }
        if self.cup.guild_id == 0 || self.cup.channel_id == 0 {
            return Err("GUILD_ID and CUP_CHANNEL_ID must be set".into());
        }
        if self.cup.admin_user_id == 0 {
            return Err("ADMIN_USER_ID must be set".into());
        }
        if self.cup.team_size == 0 {
            return Err("Team size must be at least 1".into());
        }
        if self.cup.confirm_glyph.is_empty() {
            return Err("Confirm glyph cannot be empty".into());
        }
        if self.cup.maybe_enabled && self.cup.confirm_glyph == self.cup.tentative_glyph {
            return Err("Confirm and tentative glyphs must differ".into());
        }
        if self.cup.command_prefix.is_empty() {
            return Err("Command prefix cannot be empty".into());
        }
        Ok(())
    }

    pub fn roster_settings(&self) -> RosterSettings {
        RosterSettings {
            guild_id: self.cup.guild_id,
            team_size: self.cup.team_size,
            confirm_glyph: self.cup.confirm_glyph.clone(),
            tentative_glyph: self.cup.tentative_glyph.clone(),
            maybe_enabled: self.cup.maybe_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid() -> BotConfig {
        let mut config = BotConfig::default();
        config.discord.token = "token".into();
        config.relay.token = "secret".into();
        config.cup.guild_id = 1;
        config.cup.channel_id = 2;
        config.cup.admin_user_id = 3;
        config
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.cup.team_size, 6);
        assert_eq!(config.cup.confirm_glyph, "✋");
        assert_eq!(config.cup.tentative_glyph, "Ⓜ️");
        assert!(config.cup.maybe_enabled);
        assert!(!config.announcement.collage_enabled);
        assert_eq!(config.cup.ping_cooldown_secs, 30);
        assert_eq!(config.discord.api_base, "https://discord.com/api/v10");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BotConfig::from_toml(
            r#"
            [cup]
            guild_id = 123
            team_size = 5
            maybe_enabled = false

            [announcement]
            title = "Weekend Cup"
            collage_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.cup.guild_id, 123);
        assert_eq!(config.cup.team_size, 5);
        assert!(!config.cup.maybe_enabled);
        assert_eq!(config.cup.confirm_glyph, "✋");
        assert_eq!(config.announcement.title, "Weekend Cup");
        assert!(config.announcement.collage_enabled);
        assert_eq!(config.relay.listen_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DISCORD_TOKEN", "abc"),
            ("GUILD_ID", "42"),
            ("CUP_CHANNEL_ID", "43"),
            ("ADMIN_USER_ID", "44"),
            ("TEAM_SIZE", "3"),
            ("COLLAGE_ENABLED", "true"),
            ("OPERATOR_CHANNEL_ID", "45"),
            ("MAYBE_ENABLED", "not-a-bool"),
        ]);
        let mut config = BotConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.cup.guild_id, 42);
        assert_eq!(config.cup.channel_id, 43);
        assert_eq!(config.cup.admin_user_id, 44);
        assert_eq!(config.cup.team_size, 3);
        assert!(config.announcement.collage_enabled);
        assert_eq!(config.announcement.operator_channel_id, Some(45));
        // Unparsable values leave the default alone.
        assert!(config.cup.maybe_enabled);
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let mut c = valid();
        c.cup.team_size = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.cup.tentative_glyph = c.cup.confirm_glyph.clone();
        assert!(c.validate().is_err());
        c.cup.maybe_enabled = false;
        assert!(c.validate().is_ok());

        let mut c = valid();
        c.discord.token.clear();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.cup.guild_id = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.cup.admin_user_id = 0;
        assert_eq!(c.validate(), Err("ADMIN_USER_ID must be set".to_string()));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = BotConfig::load("/nonexistent/cupbot.toml").unwrap();
        assert_eq!(config.cup.command_prefix, "!");
    }
}
