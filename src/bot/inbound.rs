//! Conversion of Discord messages into pipeline input.

use poise::serenity_prelude::Message as SerenityMessage;

use crate::types::{Author, ChannelId, InboundMessage, UserId};

/// Builds the pipeline's view of a Discord message.
///
/// The display name prefers the server nickname, then the global name, then
/// the username.
pub fn to_inbound_message(message: &SerenityMessage) -> InboundMessage {
    let user = &message.author;
    let display_name = message
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| user.global_name.clone())
        .unwrap_or_else(|| user.name.clone());

    InboundMessage {
        content: message.content.clone(),
        channel_id: ChannelId(message.channel_id.get()),
        author: Author {
            id: UserId(user.id.get()),
            display_name,
        },
    }
}
