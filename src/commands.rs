//! Prefix-based command routing for chat messages.

use strum::IntoStaticStr;

const CLEAR_TOKEN: &str = "cm";
const SOURCE_TOKEN: &str = "source";
const CHAT_TOKEN: &str = "ai";

/// What a message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    /// Forget this channel's conversation.
    ClearHistory,
    /// Post the source code link.
    ShowSource,
    /// Ask the assistant. The prompt is already trimmed and may be empty.
    Chat(String),
    /// Not addressed to the bot.
    Ignore,
}

/// Classifies `text` against `<prefix>cm`, `<prefix>source` and `<prefix>ai`.
///
/// A token only matches when followed by whitespace or the end of the text,
/// and the first matching token wins.
pub fn route(text: &str, prefix: &str) -> Command {
    let text = text.trim_start();
    let Some(rest) = text.strip_prefix(prefix) else {
        return Command::Ignore;
    };

    if match_token(rest, CLEAR_TOKEN).is_some() {
        Command::ClearHistory
    } else if match_token(rest, SOURCE_TOKEN).is_some() {
        Command::ShowSource
    } else if let Some(prompt) = match_token(rest, CHAT_TOKEN) {
        Command::Chat(prompt.trim().to_string())
    } else {
        Command::Ignore
    }
}

/// Returns the text after `token` if it ends at a word boundary.
fn match_token<'a>(text: &'a str, token: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(token)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}
