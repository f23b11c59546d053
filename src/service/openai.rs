//! OpenAI chat-completions client

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CorrectionService, ServiceError};
use crate::config::Config;

/// Placeholder replaced with the selected text in the prompt template
pub const TEXT_PLACEHOLDER: &str = "{text}";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiService {
    client: reqwest::Client,
    endpoint: String,
    probe_url: String,
    probe_timeout: Duration,
    model: String,
    prompt: String,
}

impl OpenAiService {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timings.request_timeout())
            .build()
            .map_err(|err| ServiceError::Client(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            probe_url: config.probe_url.clone(),
            probe_timeout: config.timings.probe_timeout(),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
        })
    }

    fn render_prompt(&self, text: &str) -> String {
        if self.prompt.contains(TEXT_PLACEHOLDER) {
            self.prompt.replace(TEXT_PLACEHOLDER, text)
        } else {
            format!("{}\n{}", self.prompt, text)
        }
    }
}

impl CorrectionService for OpenAiService {
    async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(&self.probe_url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!(status = %response.status(), "connectivity probe answered");
                true
            }
            Err(err) => {
                warn!(error = %err, url = %self.probe_url, "connectivity probe failed");
                false
            }
        }
    }

    async fn correct(&self, text: &str, api_key: &str) -> Result<String, ServiceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: self.render_prompt(text),
            }],
            temperature: 0.0,
        };

        info!(model = %self.model, chars = text.chars().count(), "requesting correction");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let choice = reply.choices.into_iter().next().ok_or(ServiceError::EmptyReply)?;
        let corrected = choice.message.content.unwrap_or_default().trim().to_string();

        debug!(chars = corrected.chars().count(), "correction received");
        Ok(corrected)
    }
}
