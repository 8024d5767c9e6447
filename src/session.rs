//! Per-message pipeline: routing, history bookkeeping, completion and reply.

use std::future::Future;

use log::{debug, error, info, warn};

use crate::commands::{Command, route};
use crate::completion::CompletionClient;
use crate::error::{CompletionError, SendError};
use crate::history::HistoryStore;
use crate::types::{Author, ChannelId, InboundMessage, Turn};

/// Outbound side of the chat platform.
pub trait ReplySink: Sync {
    fn send_reply(
        &self,
        channel_id: ChannelId,
        text: &str,
    ) -> impl Future<Output = Result<(), SendError>> + Send;

    /// Best-effort "bot is typing" signal before a slow operation.
    fn start_typing(&self, _channel_id: ChannelId) -> impl Future<Output = ()> + Send {
        async {}
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub command_prefix: String,
    pub max_history_pairs: usize,
    pub max_reply_chars: usize,
    pub source_url: String,
}

/// Terminal state reached for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    HistoryCleared,
    SourceShown,
    PromptRequired,
    Replied,
    ErrorReplied(CompletionError),
}

/// Instruction preamble placed at the start of every channel conversation.
pub fn system_prompt(max_reply_chars: usize) -> String {
    format!(
        "You are a helpful assistant in a shared chat channel. \
         Each user message starts with the speaker's name and ID, so several people may talk to you in one conversation. \
         Answer the latest speaker directly and never prefix your answer with a name or ID. \
         Your whole answer MUST stay under {max_reply_chars} characters; longer answers are cut off."
    )
}

/// Cuts `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// User turn content that lets the model tell speakers apart.
fn tag_prompt(author: &Author, prompt: &str) -> String {
    format!("{} (ID: {}): {}", author.display_name, author.id, prompt)
}

pub struct SessionPipeline {
    history: HistoryStore,
    completion: CompletionClient,
    settings: PipelineSettings,
}

impl SessionPipeline {
    pub fn new(completion: CompletionClient, settings: PipelineSettings) -> Self {
        Self {
            history: HistoryStore::new(system_prompt(settings.max_reply_chars)),
            completion,
            settings,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs one inbound message to completion. Never fails: every error ends
    /// as a channel reply or a log line.
    pub async fn handle<S: ReplySink>(&self, message: &InboundMessage, sink: &S) -> Outcome {
        if message.content.trim().is_empty() {
            return Outcome::Ignored;
        }

        let command = route(&message.content, &self.settings.command_prefix);
        if command != Command::Ignore {
            let intent: &'static str = (&command).into();
            info!(
                "Received {intent} from {} in channel {}",
                message.author.display_name, message.channel_id
            );
        }

        match command {
            Command::Ignore => Outcome::Ignored,
            Command::ClearHistory => {
                self.history.clear(message.channel_id).await;
                self.reply(sink, message, "Conversation memory cleared.")
                    .await;
                Outcome::HistoryCleared
            }
            Command::ShowSource => {
                let text = format!("My source code: {}", self.settings.source_url);
                self.reply(sink, message, &text).await;
                Outcome::SourceShown
            }
            Command::Chat(prompt) if prompt.is_empty() => {
                let text = format!(
                    "Please enter a question after `{}ai`.",
                    self.settings.command_prefix
                );
                self.reply(sink, message, &text).await;
                Outcome::PromptRequired
            }
            Command::Chat(prompt) => self.chat(sink, message, &prompt).await,
        }
    }

    async fn chat<S: ReplySink>(&self, sink: &S, message: &InboundMessage, prompt: &str) -> Outcome {
        let handle = self.history.get_or_create(message.channel_id).await;

        // Held across the call so same-channel turns stay in order.
        let mut conversation = handle.lock().await;
        conversation.push(Turn::user(tag_prompt(&message.author, prompt)));
        conversation.trim(self.settings.max_history_pairs);
        debug!(
            "Conversation for channel {} has {} turns",
            message.channel_id,
            conversation.len()
        );

        sink.start_typing(message.channel_id).await;

        match self.completion.complete(conversation.turns()).await {
            Ok(reply) => {
                conversation.push(Turn::assistant(reply.as_str()));
                drop(conversation);
                self.reply(sink, message, &reply).await;
                Outcome::Replied
            }
            Err(e) => {
                // The user turn stays in history without an answer.
                drop(conversation);
                error!(
                    "Completion failed ({}) for {} in channel {}: {e}",
                    e.kind(),
                    message.author.display_name,
                    message.channel_id
                );
                self.reply(sink, message, &e.user_message()).await;
                Outcome::ErrorReplied(e)
            }
        }
    }

    async fn reply<S: ReplySink>(&self, sink: &S, message: &InboundMessage, body: &str) {
        let composed = format!("{} {body}", message.author.mention());
        let text = truncate_chars(&composed, self.settings.max_reply_chars);

        match sink.send_reply(message.channel_id, &text).await {
            Ok(()) => info!(
                "Replied to {} in channel {} ({} characters)",
                message.author.display_name,
                message.channel_id,
                text.chars().count()
            ),
            Err(e) => warn!(
                "Failed to send reply in channel {}: {e}",
                message.channel_id
            ),
        }
    }
}
