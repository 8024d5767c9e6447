use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CompletionError, Result};
use crate::types::Turn;

const COMPLETIONS_PATH: &str = "api/chat/completions";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Builds the HTTP client shared by every completion call.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(client)
}

pub struct CompletionClient {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl CompletionClient {
    pub fn new(client: reqwest::Client, base_url: &Url, api_key: String, model: String) -> Self {
        let endpoint = format!(
            "{}/{COMPLETIONS_PATH}",
            base_url.as_str().trim_end_matches('/')
        );
        Self {
            api_key,
            client,
            endpoint,
            model,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the full turn sequence and returns the assistant's reply text.
    ///
    /// Exactly one request is made; failures are classified, never retried.
    pub async fn complete(&self, messages: &[Turn]) -> std::result::Result<String, CompletionError> {
        debug!(
            "Sending request to completion API with {} messages",
            messages.len()
        );

        let request = CompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport_error)?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(CompletionError::Unauthorized);
        }

        if !status.is_success() {
            return Err(CompletionError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let reply = parse_reply(&body).map_err(|reason| {
            warn!("Malformed completion response: {reason}");
            CompletionError::ApiError {
                status: status.as_u16(),
                body: reason,
            }
        })?;

        debug!("Received response from completion API");
        Ok(reply)
    }
}

/// Extracts `choices[0].message.content`; a missing content field is an empty reply.
fn parse_reply(body: &str) -> std::result::Result<String, String> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| format!("unexpected response body: {e}"))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| "unexpected response body: no choices".to_string())?;

    Ok(choice.message.content.unwrap_or_default())
}

fn classify_transport_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Unreachable(err.to_string())
    }
}
