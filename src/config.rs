use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, error, info};
use url::Url;

use crate::error::{BotError, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_PREFIX: &str = "s.";
const DEFAULT_MAX_HISTORY_PAIRS: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_REPLY_CHARS: usize = 2048;
const DEFAULT_SOURCE_URL: &str = "https://github.com/chatrelay/chatrelay";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub api_key: String,
    pub api_base_url: Url,
    pub model: String,
    pub command_prefix: String,
    pub max_history_pairs: usize,
    pub completion_timeout: Duration,
    pub max_reply_chars: usize,
    pub source_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key))
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, env::VarError>,
    {
        let required = |key: &str| {
            lookup(key).map_err(|e| {
                error!("Failed to load {key} from environment: {e}");
                BotError::EnvVar(e)
            })
        };
        let optional = |key: &str| lookup(key).ok().filter(|v| !v.trim().is_empty());

        let discord_token = required("DISCORD_TOKEN")?;
        let api_key = required("COMPLETION_API_KEY")?;
        let api_base_url = parse_base_url(&required("COMPLETION_API_BASE_URL")?)?;

        let model = optional("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let command_prefix =
            optional("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let max_history_pairs = parse_positive(
            "MAX_HISTORY_PAIRS",
            optional("MAX_HISTORY_PAIRS"),
            DEFAULT_MAX_HISTORY_PAIRS,
        )?;
        let timeout_secs = parse_positive(
            "COMPLETION_TIMEOUT_SECS",
            optional("COMPLETION_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;
        let max_reply_chars = parse_positive(
            "MAX_REPLY_CHARS",
            optional("MAX_REPLY_CHARS"),
            DEFAULT_MAX_REPLY_CHARS,
        )?;
        let source_url = optional("SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());

        info!("Configuration loaded successfully");
        debug!("Discord token length: {} characters", discord_token.len());
        debug!("Completion API key length: {} characters", api_key.len());
        debug!("Completion API base URL: {api_base_url}");
        debug!("Completion model: {model}");
        debug!("Command prefix: {command_prefix}");

        Ok(Self {
            discord_token,
            api_key,
            api_base_url,
            model,
            command_prefix,
            max_history_pairs,
            completion_timeout: Duration::from_secs(timeout_secs),
            max_reply_chars,
            source_url,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BotError::Config(format!("COMPLETION_API_BASE_URL is invalid: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(BotError::Config(format!(
            "COMPLETION_API_BASE_URL must use http or https, got {scheme}"
        ))),
    }
}

fn parse_positive<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(BotError::Config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> std::result::Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "token"),
        ("COMPLETION_API_KEY", "key"),
        ("COMPLETION_API_BASE_URL", "https://llm.example.com"),
    ];

    #[test]
    fn defaults_apply_when_optional_values_missing() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).expect("valid config");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.command_prefix, "s.");
        assert_eq!(config.max_history_pairs, 10);
        assert_eq!(config.max_reply_chars, 2048);
        assert_eq!(config.completion_timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_api_key_is_an_env_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("COMPLETION_API_BASE_URL", "https://llm.example.com"),
        ]))
        .expect_err("api key is required");
        assert!(matches!(err, BotError::EnvVar(env::VarError::NotPresent)));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("COMPLETION_API_BASE_URL", "ftp://llm.example.com");
        let err = Config::from_lookup(lookup_from(&pairs)).expect_err("bad scheme");
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn rejects_zero_history_pairs() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_HISTORY_PAIRS", "0"));
        let err = Config::from_lookup(lookup_from(&pairs)).expect_err("zero pairs");
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn reads_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("COMMAND_PREFIX", "!"),
            ("MAX_HISTORY_PAIRS", "4"),
            ("COMPLETION_TIMEOUT_SECS", "30"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).expect("valid config");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.max_history_pairs, 4);
        assert_eq!(config.completion_timeout, Duration::from_secs(30));
    }
}
