//! AI chat client.
//!
//! The endpoint receives `{"prompt": "..."}` and answers `{"msg": "..."}`. The
//! reply is generated markup and is handed out as [`UntrustedMarkup`]; callers
//! pick between the escaped text and the raw markup explicitly.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_CHAT_ENDPOINT;
use crate::error::ChatError;

/// Instructions sent ahead of every user prompt.
pub const CONTEXT_PREAMBLE: &str = "Your response shall start with <div>, code only. Add 100vw and background color inline css. No text, explanation, or other response, just div element. Make it aesthetic and laptop/desktop responsive design, inline css/js only. ";

/// Markup produced by the chat endpoint. Not safe to render as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UntrustedMarkup(String);

impl UntrustedMarkup {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    /// The markup with HTML special characters escaped, for display as text.
    pub fn escaped(&self) -> Cow<'_, str> {
        html_escape::encode_text(&self.0)
    }

    /// The raw markup. Rendering it runs whatever it contains.
    pub fn as_raw(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    msg: Option<String>,
}

/// Build the full prompt: preamble, user input, then the current output so the
/// model can revise it.
pub fn build_prompt(input: &str, existing_markup: &str) -> String {
    format!(
        "{}\n {} \n Existing Code (when sending send all new updated code): {}",
        CONTEXT_PREAMBLE, input, existing_markup
    )
}

/// Strip a leading ```` ```html ```` (or ```` ``` ````) fence and a trailing
/// ```` ``` ```` fence.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```html")
        .or_else(|| trimmed.strip_prefix("```htm"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_ENDPOINT)
    }
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one prompt and return the fence-stripped reply.
    pub async fn ask(
        &self,
        input: &str,
        existing_markup: &str,
    ) -> Result<UntrustedMarkup, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        let prompt = build_prompt(input, existing_markup);
        tracing::debug!(endpoint = %self.endpoint, chars = prompt.len(), "Sending chat prompt");
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { prompt: &prompt })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }
        let body: ChatResponse = resp.json().await?;
        let reply = body.msg.unwrap_or_default();
        Ok(UntrustedMarkup::new(strip_code_fences(&reply)))
    }
}

/// A chat conversation that keeps the latest reply as its output.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    client: ChatClient,
    output: UntrustedMarkup,
}

impl ChatSession {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            output: UntrustedMarkup::default(),
        }
    }

    pub fn output(&self) -> &UntrustedMarkup {
        &self.output
    }

    /// Send `input` along with the current output. Blank input does nothing
    /// and returns `Ok(false)`. On failure the previous output is kept.
    pub async fn send(&mut self, input: &str) -> Result<bool, ChatError> {
        if input.trim().is_empty() {
            return Ok(false);
        }
        match self.client.ask(input, self.output.as_raw()).await {
            Ok(reply) => {
                self.output = reply;
                Ok(true)
            }
            Err(error) => {
                tracing::error!(error = %error, "Error communicating with chat backend");
                Err(error)
            }
        }
    }
}
