use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::config::GeminiConfig;
use crate::dispatch::ChatSession;
use crate::prompt::{ImagePayload, PromptPart};

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "inlineData")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blob {
    #[serde(alias = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl From<&PromptPart> for Part {
    fn from(part: &PromptPart) -> Self {
        match part {
            PromptPart::Text(text) => Part {
                text: Some(text.clone()),
                inline_data: None,
            },
            PromptPart::Image(ImagePayload { mime_type, data }) => Part {
                text: None,
                inline_data: Some(Blob {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
            },
        }
    }
}

impl Content {
    pub fn user(parts: &[PromptPart]) -> Self {
        Content {
            role: "user".to_string(),
            parts: parts.iter().map(Part::from).collect(),
        }
    }

    pub fn model(text: &str) -> Self {
        Content {
            role: "model".to_string(),
            parts: vec![Part {
                text: Some(text.to_string()),
                inline_data: None,
            }],
        }
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

impl GenerateContentResponse {
    fn reply_text(&self) -> Result<String> {
        if let Some(candidate) = self.candidates.first() {
            let text = candidate.content.as_ref().map(Content::text).unwrap_or_default();
            if !text.is_empty() {
                return Ok(text);
            }
            if let Some(reason) = &candidate.finish_reason {
                return Err(anyhow!("The model returned no text (finish reason: {})", reason));
            }
        }

        match self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            Some(reason) => Err(anyhow!("The prompt was blocked ({})", reason)),
            None => Err(anyhow!("The model returned an empty response")),
        }
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn with_config(config: &GeminiConfig, api_key: String) -> Self {
        GeminiClient {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn get_model(&self) -> &str {
        &self.model
    }

    /// Starts a conversation seeded with `history`.
    pub fn start_chat(&self, history: Vec<Content>) -> GeminiSession {
        GeminiSession {
            client: self.clone(),
            history,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// A conversation with the model. The session owns the turn history and
/// extends it only after a successful reply.
pub struct GeminiSession {
    client: GeminiClient,
    history: Vec<Content>,
}

impl GeminiSession {
    #[cfg(test)]
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    async fn generate(&mut self, parts: Vec<PromptPart>) -> Result<String> {
        let user = Content::user(&parts);
        let mut contents = self.history.clone();
        contents.push(user.clone());

        tracing::debug!(
            "Sending {} part(s) to {} with {} prior turn(s)",
            parts.len(),
            self.client.model,
            self.history.len()
        );

        let response = self
            .client
            .client
            .post(self.client.endpoint())
            .header("x-goog-api-key", &self.client.api_key)
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error ({}): {}", status, api_error_message(&body)));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.reply_text()?;

        self.history.push(user);
        self.history.push(Content::model(&text));
        Ok(text)
    }
}

impl ChatSession for GeminiSession {
    fn send(&mut self, parts: Vec<PromptPart>) -> impl Future<Output = Result<String>> + Send + '_ {
        self.generate(parts)
    }
}
