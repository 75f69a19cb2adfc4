//! Text and embeds the bot posts.

use super::cup::{GuildId, MessageRef, RosterSnapshot, RosterState, UserId, UserIdentity};
use crate::config::AnnouncementSection;
use crate::platform::{Embed, EmbedField};

pub fn jump_url(guild_id: GuildId, message: MessageRef) -> String {
    format!(
        "https://discord.com/channels/{guild_id}/{}/{}",
        message.channel_id, message.message_id
    )
}

/// The signup message body.
pub fn signup_text(role_id: u64) -> String {
    format!("<@&{role_id}> Please react to this if you want to play in the cup.")
}

/// The team announcement: one field per player in roster order.
pub fn team_embed(
    settings: &AnnouncementSection,
    guild_id: GuildId,
    signup: MessageRef,
    members: &[UserIdentity],
) -> Embed {
    Embed {
        title: settings.title.clone(),
        description: format!(
            "The [team]({}) will consist of:",
            jump_url(guild_id, signup)
        ),
        color: settings.color,
        thumbnail_url: settings.thumbnail_url.clone(),
        footer: settings.footer.clone(),
        fields: members
            .iter()
            .enumerate()
            .map(|(i, user)| EmbedField {
                name: format!("Player {}", i + 1),
                value: user.name.clone(),
                inline: false,
            })
            .collect(),
    }
}

pub fn ping_text(author_id: UserId, members: &[UserIdentity]) -> String {
    let mut text = format!("You have been pinged by <@{author_id}>:\n");
    for user in members {
        text.push_str(&user.mention());
        text.push_str(" \n");
    }
    text
}

pub fn roster_text(snapshot: &RosterSnapshot) -> String {
    if snapshot.state == RosterState::Inactive {
        return "There is currently no cup in progress".into();
    }

    let names = |users: &[UserIdentity]| {
        if users.is_empty() {
            "nobody yet".to_string()
        } else {
            users
                .iter()
                .map(|u| u.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    let mut text = format!(
        "Confirmed ({}/{}): {}",
        snapshot.confirmed.len(),
        snapshot.team_size,
        names(&snapshot.confirmed)
    );
    if !snapshot.maybe.is_empty() {
        text.push_str(&format!("\nMaybe: {}", names(&snapshot.maybe)));
    }
    text
}

pub fn cooldown_text(retry_after: std::time::Duration) -> String {
    format!(
        "**Still on cooldown**, please try again in {:.2}s",
        retry_after.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<UserIdentity> {
        vec![UserIdentity::new(11, "alice"), UserIdentity::new(12, "bob")]
    }

    #[test]
    fn test_team_embed_lists_players_in_order() {
        let embed = team_embed(
            &AnnouncementSection::default(),
            1,
            MessageRef::new(2, 3),
            &members(),
        );
        assert_eq!(
            embed.description,
            "The [team](https://discord.com/channels/1/2/3) will consist of:"
        );
        assert_eq!(embed.color, 0xffbb00);
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[0].name, "Player 1");
        assert_eq!(embed.fields[0].value, "alice");
        assert_eq!(embed.fields[1].name, "Player 2");
        assert!(!embed.fields[1].inline);
    }

    #[test]
    fn test_ping_text() {
        assert_eq!(
            ping_text(5, &members()),
            "You have been pinged by <@5>:\n<@11> \n<@12> \n"
        );
    }

    #[test]
    fn test_signup_text_mentions_role() {
        assert_eq!(
            signup_text(77),
            "<@&77> Please react to this if you want to play in the cup."
        );
    }

    #[test]
    fn test_roster_text() {
        let snapshot = RosterSnapshot {
            state: RosterState::Accepting,
            team_size: 6,
            signup: Some(MessageRef::new(1, 2)),
            announcement_message_id: None,
            confirmed: members(),
            maybe: vec![UserIdentity::new(13, "carol")],
            opened_at: None,
        };
        assert_eq!(
            roster_text(&snapshot),
            "Confirmed (2/6): alice, bob\nMaybe: carol"
        );
    }

    #[test]
    fn test_cooldown_text() {
        assert_eq!(
            cooldown_text(std::time::Duration::from_millis(12_500)),
            "**Still on cooldown**, please try again in 12.50s"
        );
    }
}
