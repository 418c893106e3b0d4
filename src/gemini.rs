//! Gemini `generateContent` image transport.
//!
//! Endpoint: `POST {base}/models/{model}:generateContent`, authenticated with
//! the `x-goog-api-key` header. Reference images travel as `inlineData` parts
//! ahead of the text prompt.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::model::AspectRatio;

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload without a `data:` prefix.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<&'a InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default, alias = "inline_data", rename = "inlineData")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(default, alias = "mime_type", rename = "mimeType")]
    mime_type: Option<String>,
    data: String,
}

/// Requests one image and returns it as a `data:` URI, or `None` when the
/// response carries no image part.
pub async fn generate_image(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    prompt: &str,
    reference: Option<&InlineData>,
    aspect_ratio: AspectRatio,
) -> anyhow::Result<Option<String>> {
    let mut parts = Vec::with_capacity(2);
    if let Some(reference) = reference {
        parts.push(RequestPart {
            inline_data: Some(reference),
            text: None,
        });
    }
    parts.push(RequestPart {
        inline_data: None,
        text: Some(prompt),
    });

    let body = GenerateContentRequest {
        contents: vec![RequestContent { parts }],
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE"],
            image_config: ImageConfig {
                aspect_ratio: aspect_ratio.as_str(),
            },
        },
    };

    let response = client
        .post(endpoint)
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("POST {endpoint}"))?;

    let status = response.status();
    let raw = response.text().await.context("read Gemini response body")?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
        anyhow::bail!("Gemini API error ({status}): {message}");
    }

    let value: GenerateContentResponse =
        serde_json::from_str(&raw).context("parse Gemini response")?;
    Ok(first_image_data_uri(value))
}

fn first_image_data_uri(response: GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.into_iter().next()?;
    candidate
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.inline_data)
        .find(|inline| !inline.data.is_empty())
        .map(|inline| {
            let mime = inline.mime_type.as_deref().unwrap_or("image/png");
            format!("data:{mime};base64,{}", inline.data)
        })
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model() {
        assert_eq!(
            generate_content_endpoint("http://x/v1beta/", "gemini-2.5-flash-image"),
            "http://x/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn request_puts_reference_before_text() {
        let reference = InlineData {
            mime_type: "image/jpeg".to_owned(),
            data: "QUJD".to_owned(),
        };
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart {
                        inline_data: Some(&reference),
                        text: None,
                    },
                    RequestPart {
                        inline_data: None,
                        text: Some("prompt"),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: AspectRatio::Vertical.as_str(),
                },
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(value["contents"][0]["parts"][1]["text"], "prompt");
        assert_eq!(
            value["generationConfig"]["imageConfig"]["aspectRatio"],
            "9:16"
        );
    }

    #[test]
    fn first_inline_part_becomes_data_uri() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/webp", "data": "AAAA" } }
            ]}}]
        }))
        .unwrap();
        assert_eq!(
            first_image_data_uri(response).as_deref(),
            Some("data:image/webp;base64,AAAA")
        );
    }

    #[test]
    fn text_only_response_has_no_image() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        }))
        .unwrap();
        assert_eq!(first_image_data_uri(response), None);

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_image_data_uri(empty), None);
    }
}
