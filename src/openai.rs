//! OpenAI Responses transport in JSON mode.
//!
//! Endpoint: `POST {base}/responses` with bearer auth. Requests ask for
//! `text.format = json_object` and are never stored server side.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;

pub fn responses_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/responses")
}

#[derive(Debug, Serialize)]
struct TextFormat {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct TextOptions {
    format: TextFormat,
}

#[derive(Debug, Serialize)]
struct JsonModeRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
    text: TextOptions,
    store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for JSON-mode completions against one configured model.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    http: reqwest::Client,
    endpoint: String,
    config: OpenAiConfig,
}

impl ResponsesClient {
    pub fn new(http: reqwest::Client, config: OpenAiConfig) -> Self {
        Self {
            http,
            endpoint: responses_endpoint(&config.base_url),
            config,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the concatenated `output_text` of the reply. The text is not
    /// validated as JSON here.
    pub async fn json_object(&self, instructions: &str, input: &str) -> anyhow::Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
        let request = self.request(instructions, input);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read OpenAI response body")?;
        if !status.is_success() {
            let message = error_message(&raw).unwrap_or(raw);
            anyhow::bail!("OpenAI API error ({status}): {message}");
        }

        let reply: ResponsesReply = serde_json::from_str(&raw).context("parse OpenAI response")?;
        output_text(reply)
    }

    fn request<'a>(&'a self, instructions: &'a str, input: &'a str) -> JsonModeRequest<'a> {
        JsonModeRequest {
            model: &self.config.model,
            instructions,
            input,
            text: TextOptions {
                format: TextFormat {
                    r#type: "json_object",
                },
            },
            store: false,
            temperature: accepts_temperature(&self.config.model).then_some(self.config.temperature),
        }
    }
}

/// Reasoning models (`gpt-5*`, `o*`) reject sampling parameters.
fn accepts_temperature(model: &str) -> bool {
    let reasoning = model.starts_with("gpt-5")
        || (model.starts_with('o') && model[1..].starts_with(|c: char| c.is_ascii_digit()));
    !reasoning
}

fn error_message(raw: &str) -> Option<String> {
    serde_json::from_str::<ErrorReply>(raw)
        .ok()
        .map(|reply| reply.error.message)
}

fn output_text(reply: ResponsesReply) -> anyhow::Result<String> {
    let text: String = reply
        .output
        .into_iter()
        .filter_map(|item| match item {
            OutputItem::Message { content } => Some(content),
            OutputItem::Other => None,
        })
        .flatten()
        .filter_map(|part| match part {
            ContentPart::OutputText { text } => Some(text),
            ContentPart::Other => None,
        })
        .collect();

    if text.trim().is_empty() {
        anyhow::bail!("OpenAI output text is empty");
    }
    Ok(text)
}
