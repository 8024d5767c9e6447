//! Per-channel conversation memory.
//!
//! The registry lock only guards the channel map. Each conversation sits
//! behind its own async mutex, which the session pipeline holds for the whole
//! append, call, append sequence so turns from one channel never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::error::HistoryError;
use crate::types::{ChannelId, MessageRole, Turn};

pub const DEFAULT_MAX_PAIRS: usize = 10;

/// Ordered transcript of one channel, always starting with the system turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends a user or assistant turn. System turns are rejected so the
    /// preamble stays unique.
    pub fn push(&mut self, turn: Turn) {
        if turn.role == MessageRole::System {
            warn!("Ignoring attempt to append a second system turn");
            return;
        }
        self.turns.push(turn);
    }

    /// Keeps the system turn plus the newest `max_pairs` exchanges.
    pub fn trim(&mut self, max_pairs: usize) {
        let limit = 2 * max_pairs + 1;
        if self.turns.len() <= limit {
            return;
        }

        let excess = self.turns.len() - limit;
        self.turns.drain(1..=excess);
        debug!("Trimmed {excess} turns from conversation");
    }
}

/// Shared handle to one channel's conversation.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

/// Process-wide map from channel to conversation.
pub struct HistoryStore {
    system_prompt: String,
    channels: Mutex<HashMap<ChannelId, ConversationHandle>>,
}

impl HistoryStore {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns the channel's conversation, creating it on first use.
    pub async fn get_or_create(&self, channel_id: ChannelId) -> ConversationHandle {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel_id)
            .or_insert_with(|| {
                debug!("Creating conversation for channel {channel_id}");
                Arc::new(Mutex::new(Conversation::new(self.system_prompt.as_str())))
            })
            .clone()
    }

    pub async fn get(&self, channel_id: ChannelId) -> Option<ConversationHandle> {
        self.channels.lock().await.get(&channel_id).cloned()
    }

    pub async fn append(
        &self,
        channel_id: ChannelId,
        turn: Turn,
    ) -> std::result::Result<(), HistoryError> {
        let handle = self
            .get(channel_id)
            .await
            .ok_or(HistoryError::UnknownChannel(channel_id))?;
        handle.lock().await.push(turn);
        Ok(())
    }

    /// Drops the channel's conversation. Clearing an unknown channel is fine.
    pub async fn clear(&self, channel_id: ChannelId) {
        if self.channels.lock().await.remove(&channel_id).is_some() {
            debug!("Cleared conversation for channel {channel_id}");
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "You are a helpful bot.";

    fn conversation_with_pairs(pairs: usize) -> Conversation {
        let mut conversation = Conversation::new(PROMPT);
        for i in 0..pairs {
            conversation.push(Turn::user(format!("question {i}")));
            conversation.push(Turn::assistant(format!("answer {i}")));
        }
        conversation
    }

    #[test]
    fn trim_keeps_system_turn_and_bound() {
        for pairs in 0..25 {
            for max_pairs in 1..12 {
                let mut conversation = conversation_with_pairs(pairs);
                conversation.trim(max_pairs);
                assert!(conversation.len() <= 2 * max_pairs + 1);
                assert_eq!(conversation.turns()[0], Turn::system(PROMPT));
            }
        }
    }

    #[test]
    fn trim_drops_oldest_turns_only() {
        let mut conversation = conversation_with_pairs(DEFAULT_MAX_PAIRS);
        assert_eq!(conversation.len(), 21);

        conversation.push(Turn::user("newest"));
        assert_eq!(conversation.len(), 22);
        conversation.trim(DEFAULT_MAX_PAIRS);

        assert_eq!(conversation.len(), 21);
        assert_eq!(conversation.turns()[0].role, MessageRole::System);
        assert_eq!(conversation.turns()[1], Turn::assistant("answer 0"));
        assert_eq!(conversation.turns()[20], Turn::user("newest"));
    }

    #[test]
    fn trim_is_noop_within_bound() {
        let mut conversation = conversation_with_pairs(3);
        let before = conversation.clone();
        conversation.trim(DEFAULT_MAX_PAIRS);
        assert_eq!(conversation, before);
    }

    #[test]
    fn push_ignores_extra_system_turns() {
        let mut conversation = Conversation::new(PROMPT);
        conversation.push(Turn::system("again"));
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn append_preserves_order_and_content() {
        let store = HistoryStore::new(PROMPT);
        let channel = ChannelId(1);
        let handle = store.get_or_create(channel).await;
        let before = handle.lock().await.len();

        store
            .append(channel, Turn::user("héllo  \u{1f980}"))
            .await
            .expect("channel exists");
        store
            .append(channel, Turn::assistant("hi"))
            .await
            .expect("channel exists");

        let conversation = handle.lock().await;
        assert_eq!(conversation.len(), before + 2);
        assert_eq!(conversation.turns()[before], Turn::user("héllo  \u{1f980}"));
        assert_eq!(conversation.turns()[before + 1], Turn::assistant("hi"));
    }

    #[tokio::test]
    async fn append_to_unknown_channel_errors() {
        let store = HistoryStore::new(PROMPT);
        let err = store
            .append(ChannelId(9), Turn::user("hi"))
            .await
            .expect_err("channel was never created");
        assert_eq!(err, HistoryError::UnknownChannel(ChannelId(9)));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = HistoryStore::new(PROMPT);
        store.clear(ChannelId(3)).await;

        store.get_or_create(ChannelId(3)).await;
        store.clear(ChannelId(3)).await;
        store.clear(ChannelId(3)).await;

        assert!(store.get(ChannelId(3)).await.is_none());
    }

    #[tokio::test]
    async fn clear_then_access_starts_fresh() {
        let store = HistoryStore::new(PROMPT);
        let channel = ChannelId(4);
        store.get_or_create(channel).await;
        store
            .append(channel, Turn::user("old"))
            .await
            .expect("channel exists");

        store.clear(channel).await;
        let handle = store.get_or_create(channel).await;
        assert_eq!(handle.lock().await.turns(), [Turn::system(PROMPT)]);
    }

    #[tokio::test]
    async fn concurrent_creation_yields_one_conversation() {
        let store = Arc::new(HistoryStore::new(PROMPT));
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.get_or_create(ChannelId(7)).await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.expect("task completed"));
        }

        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(store.channel_count().await, 1);
    }
}
