use thiserror::Error;

use crate::types::ChannelId;

/// Process-level errors. Any of these stops the bot before or during startup.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Serenity error: {0}")]
    Serenity(Box<poise::serenity_prelude::Error>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl From<poise::serenity_prelude::Error> for BotError {
    fn from(err: poise::serenity_prelude::Error) -> Self {
        BotError::Serenity(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

/// Failure of a single completion call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion server unreachable: {0}")]
    Unreachable(String),

    #[error("completion request timed out")]
    Timeout,

    #[error("completion API rejected the API key")]
    Unauthorized,

    #[error("completion API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl CompletionError {
    /// Returns a user-friendly error message suitable for displaying in the channel
    pub fn user_message(&self) -> String {
        match self {
            CompletionError::Unreachable(_) => {
                "Sorry, I can't reach the AI server. Please check the configured API URL.".to_string()
            }
            CompletionError::Timeout => {
                "Sorry, the connection to the AI server timed out. Please try again.".to_string()
            }
            CompletionError::Unauthorized => {
                "Sorry, the AI service rejected my API key. Please contact the bot administrator.".to_string()
            }
            CompletionError::ApiError { status, body } => {
                format!("The AI service returned error `{status}`: `{body}`")
            }
        }
    }

    /// Short name of the failure kind, used in logs and outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Unreachable(_) => "unreachable",
            CompletionError::Timeout => "timeout",
            CompletionError::Unauthorized => "unauthorized",
            CompletionError::ApiError { .. } => "api_error",
        }
    }
}

/// Failure to deliver a reply to the chat platform.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("platform rejected the reply: {0}")]
    Platform(String),

    #[error("reply delivery timed out")]
    Timeout,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistoryError {
    #[error("no conversation exists for channel {0}")]
    UnknownChannel(ChannelId),
}
