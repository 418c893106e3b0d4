use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use url::Url;

use crate::config::GeminiConfig;
use crate::gemini::{self, InlineData};
use crate::model::AspectRatio;

const MAX_REFERENCE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_REFERENCE_MIME: &str = "image/jpeg";

/// Reference image already downloaded and base64-encoded.
pub type ReferenceImage = InlineData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub reference: Option<ReferenceImage>,
    pub aspect_ratio: AspectRatio,
}

/// Image model returning a `data:` URI or hosted URL. `Ok(None)` means the
/// model answered without an image.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct GeminiImageModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiImageModel {
    pub fn new(client: reqwest::Client, config: &GeminiConfig) -> Self {
        Self {
            client,
            endpoint: gemini::generate_content_endpoint(&config.base_url, &config.model),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ImageModel for GeminiImageModel {
    async fn generate_image(&self, request: &ImageRequest) -> anyhow::Result<Option<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
        gemini::generate_image(
            &self.client,
            &self.endpoint,
            api_key,
            &request.prompt,
            request.reference.as_ref(),
            request.aspect_ratio,
        )
        .await
    }
}

/// Best-effort image generation. Nothing here returns an error: failures are
/// logged and surface as `None`.
#[derive(Clone)]
pub struct ImageGenerator {
    client: reqwest::Client,
    model: Arc<dyn ImageModel>,
}

impl ImageGenerator {
    pub fn new(client: reqwest::Client, model: Arc<dyn ImageModel>) -> Self {
        Self { client, model }
    }

    /// `subject` is the book title, used to name the reference in the prompt.
    pub async fn generate(
        &self,
        prompt: &str,
        reference_url: Option<&str>,
        aspect_ratio: AspectRatio,
        subject: Option<&str>,
    ) -> Option<String> {
        let reference = match reference_url {
            Some(url) => self.fetch_reference(url).await,
            None => None,
        };
        self.generate_with_reference(prompt, reference.as_ref(), aspect_ratio, subject)
            .await
    }

    pub async fn generate_with_reference(
        &self,
        prompt: &str,
        reference: Option<&ReferenceImage>,
        aspect_ratio: AspectRatio,
        subject: Option<&str>,
    ) -> Option<String> {
        let request = ImageRequest {
            prompt: compose_prompt(prompt, reference.is_some(), aspect_ratio, subject),
            reference: reference.cloned(),
            aspect_ratio,
        };

        match self.model.generate_image(&request).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                tracing::warn!(aspect_ratio = aspect_ratio.as_str(), "no image in model response");
                None
            }
            Err(err) => {
                tracing::warn!(?err, aspect_ratio = aspect_ratio.as_str(), "image generation failed");
                None
            }
        }
    }

    /// Downloads and base64-encodes a reference image. Any failure yields
    /// `None` so callers fall back to text-only generation.
    pub async fn fetch_reference(&self, url: &str) -> Option<ReferenceImage> {
        match fetch_reference_inner(&self.client, url).await {
            Ok(reference) => Some(reference),
            Err(err) => {
                tracing::warn!(?err, url, "could not fetch reference image, continuing without it");
                None
            }
        }
    }
}

async fn fetch_reference_inner(
    client: &reqwest::Client,
    raw_url: &str,
) -> anyhow::Result<ReferenceImage> {
    let url = Url::parse(raw_url.trim()).context("parse reference url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("reference url must be http/https: {url}");
    }

    let mut response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("reference image request failed: {}", response.status());
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| v.starts_with("image/"))
        .unwrap_or(DEFAULT_REFERENCE_MIME)
        .to_owned();

    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await.context("read reference chunk")? {
        if bytes.len() + chunk.len() > MAX_REFERENCE_BYTES {
            anyhow::bail!("reference image exceeds {MAX_REFERENCE_BYTES} bytes");
        }
        bytes.extend_from_slice(&chunk);
    }
    if bytes.is_empty() {
        anyhow::bail!("reference image is empty");
    }

    Ok(ReferenceImage {
        mime_type,
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}

/// Rewrites `prompt` so the model keeps the reference subject. Without a
/// reference the prompt is sent unchanged.
pub fn compose_prompt(
    prompt: &str,
    has_reference: bool,
    aspect_ratio: AspectRatio,
    subject: Option<&str>,
) -> String {
    if !has_reference {
        return prompt.to_owned();
    }

    let header = match subject {
        Some(title) => format!("[Reference Image: Book cover for \"{title}\"]"),
        None => "[Reference Image Provided]".to_owned(),
    };

    match aspect_ratio {
        AspectRatio::Square => format!(
            "{header}\n\
\n\
Create a beautiful Instagram post image featuring this book.\n\
\n\
IMPORTANT:\n\
- Include the book cover from the reference image in the scene\n\
- Place it on an aesthetic surface (wooden table, marble counter, or cozy reading nook)\n\
- Add atmospheric elements: soft natural lighting, coffee/tea cup, reading glasses, bookmark, cozy blanket, plants\n\
- Style: Professional product photography, Instagram aesthetic, warm and inviting\n\
\n\
Scene idea: {prompt}"
        ),
        AspectRatio::Vertical => format!(
            "{header}\n\
\n\
Instruction: Generate a scene for a video storyboard.\n\
CRITICAL: If the book is present in the scene, it MUST look exactly like the reference image provided. Maintain the cover art and title text fidelity.\n\
\n\
Prompt: {prompt}"
        ),
    }
}
