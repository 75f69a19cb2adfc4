use super::cup::MessageId;

/// A chat command addressed to the bot.
///
/// Wire format: `<prefix><name> [args...]`, e.g. `!loadcup 1183046215139627089`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a new cup with a fresh signup message.
    Cup,
    /// Close the active cup.
    EndCup,
    /// Rebuild the cup from an existing signup message. The id is `None` when
    /// missing or unparsable; the command is then ignored.
    LoadCup(Option<MessageId>),
    /// Ping confirmed players when one spot is left.
    Ping,
    /// Ask for the team announcement to be (re)posted.
    Team,
    /// Show the current roster.
    Roster,
}

impl Command {
    /// Parse a message body. Returns `None` for anything that isn't a known
    /// command with the given prefix.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let rest = content.trim().strip_prefix(prefix)?;
        let mut words = rest.split_whitespace();
        let name = words.next()?.to_lowercase();

        let command = match name.as_str() {
            "cup" => Command::Cup,
            "endcup" => Command::EndCup,
            "loadcup" => Command::LoadCup(words.next().and_then(|id| id.parse().ok())),
            "ping" => Command::Ping,
            "team" => Command::Team,
            "roster" => Command::Roster,
            _ => return None,
        };
        Some(command)
    }
}
