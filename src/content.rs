use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::OpenAiConfig;
use crate::model::{Book, ContentType, GeneratedContent, Scene};
use crate::openai::ResponsesClient;

pub const MIN_SCENES: usize = 4;
pub const MAX_SCENES: usize = 5;

/// Text model that answers with a JSON document.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete_json(&self, instructions: &str, input: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct OpenAiTextModel {
    client: ResponsesClient,
}

impl OpenAiTextModel {
    pub fn new(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self {
            client: ResponsesClient::new(client, config),
        }
    }
}

#[async_trait]
impl TextModel for OpenAiTextModel {
    async fn complete_json(&self, instructions: &str, input: &str) -> anyhow::Result<String> {
        self.client.json_object(instructions, input).await
    }
}

#[derive(Clone)]
pub struct ContentGenerator {
    model: Arc<dyn TextModel>,
}

impl ContentGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Fails only when the model call fails. A reply that does not match the
    /// requested schema degrades to its raw text as `content`.
    pub async fn generate(
        &self,
        book: &Book,
        content_type: ContentType,
    ) -> anyhow::Result<GeneratedContent> {
        let (instructions, input) = prompts(book, content_type);
        tracing::info!(
            content_type = %content_type,
            rank = book.rank,
            title = %book.title,
            "generate social content"
        );

        let raw = self
            .model
            .complete_json(&instructions, &input)
            .await
            .context("Failed to generate content")?;

        let mut content = GeneratedContent {
            content_type,
            content: String::new(),
            scenes: None,
            hashtags: Vec::new(),
            image_prompt: None,
            image_url: None,
            original_cover_url: book.cover_url.clone(),
        };

        let parsed = match content_type {
            ContentType::InstagramPost => parse_post(&raw).map(|post| {
                content.content = post.flattened();
                content.hashtags = post.hashtags;
                content.image_prompt = non_empty(post.image_prompt);
            }),
            ContentType::ReelsScript => parse_reels(&raw).map(|scenes| {
                content.content = flatten_scenes(&scenes);
                content.scenes = Some(scenes);
            }),
        };

        if let Err(err) = parsed {
            tracing::warn!(?err, content_type = %content_type, "failed to parse model JSON, keeping raw text");
            content.content = if raw.trim().is_empty() {
                "Generation failed".to_owned()
            } else {
                raw
            };
        }

        Ok(content)
    }
}

/// `[timeRange] Scene N\nVisual: ...\nAudio: ...` per scene, blank-line separated.
pub fn flatten_scenes(scenes: &[Scene]) -> String {
    scenes
        .iter()
        .map(|scene| {
            format!(
                "[{}] Scene {}\nVisual: {}\nAudio: {}",
                scene.time_range, scene.scene_number, scene.visual_description, scene.audio_script
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Hashtags {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostPayload {
    caption: String,
    hashtags: Option<Hashtags>,
    #[serde(default)]
    image_prompt: String,
}

struct Post {
    caption: String,
    hashtags: Vec<String>,
    image_prompt: String,
}

impl Post {
    fn flattened(&self) -> String {
        if self.hashtags.is_empty() {
            self.caption.clone()
        } else {
            format!("{}\n\n{}", self.caption, self.hashtags.join(" "))
        }
    }
}

fn parse_post(raw: &str) -> anyhow::Result<Post> {
    let payload: PostPayload = serde_json::from_str(raw).context("parse post JSON")?;
    if payload.caption.trim().is_empty() {
        anyhow::bail!("post caption is empty");
    }
    let tags = match payload.hashtags {
        Some(Hashtags::Text(text)) => text.split_whitespace().map(str::to_owned).collect(),
        Some(Hashtags::List(list)) => list,
        None => Vec::new(),
    };
    let hashtags = tags
        .into_iter()
        .map(|tag| tag.trim().trim_start_matches('#').to_owned())
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("#{tag}"))
        .collect();

    Ok(Post {
        caption: payload.caption.trim().to_owned(),
        hashtags,
        image_prompt: payload.image_prompt,
    })
}

#[derive(Debug, Deserialize)]
struct ReelsPayload {
    #[serde(default)]
    scenes: Vec<ScenePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenePayload {
    #[serde(default)]
    time_range: String,
    #[serde(default)]
    visual_description: String,
    #[serde(default)]
    audio_script: String,
    #[serde(default)]
    image_prompt: String,
}

fn parse_reels(raw: &str) -> anyhow::Result<Vec<Scene>> {
    let payload: ReelsPayload = serde_json::from_str(raw).context("parse reels JSON")?;
    if payload.scenes.len() < MIN_SCENES {
        anyhow::bail!(
            "reels script has {} scenes, expected at least {MIN_SCENES}",
            payload.scenes.len()
        );
    }
    if payload.scenes.len() > MAX_SCENES {
        tracing::warn!(
            scenes = payload.scenes.len(),
            max = MAX_SCENES,
            "reels script has too many scenes, truncating"
        );
    }

    // Scene numbers are renumbered so they stay 1-based and sequential.
    let scenes = payload
        .scenes
        .into_iter()
        .take(MAX_SCENES)
        .enumerate()
        .map(|(index, scene)| Scene {
            scene_number: index as u32 + 1,
            time_range: scene.time_range,
            visual_description: scene.visual_description,
            audio_script: scene.audio_script,
            image_prompt: scene.image_prompt,
            image_url: None,
        })
        .collect();
    Ok(scenes)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn visual_context(book: &Book) -> String {
    match book.cover_description.as_deref() {
        Some(desc) => format!("The book cover looks like: \"{desc}\"."),
        None => String::new(),
    }
}

fn prompts(book: &Book, content_type: ContentType) -> (String, String) {
    let visual_context = visual_context(book);
    match content_type {
        ContentType::InstagramPost => (
            "You are a professional \"Book Curator\" or \"Bookstore Editor\" creating Instagram posts.\n\
\n\
IMPORTANT TONE & STYLE GUIDE (Korean):\n\
- Do NOT write a personal review (e.g., do not say \"I read this\", \"I felt\", \"My opinion is\").\n\
- Write it as a formal yet engaging \"Book Introduction\" or \"Recommendation\".\n\
- The tone should be objective, informative, and curatorial (using polite \"존댓말\" like ~해요, ~입니다).\n\
- Focus on the book's key themes, why it's popular, and the target audience.\n"
                .to_owned(),
            format!(
                "Create an Instagram Post for the book: \"{title}\" by {author}.\n\
The book is currently a bestseller in Korea.\n\
{visual_context}\n\
\n\
Return a JSON object with:\n\
{{\n\
  \"caption\": \"The full post text including Hook, Body, and Closing\",\n\
  \"hashtags\": \"A string of 10-15 relevant Korean hashtags\",\n\
  \"imagePrompt\": \"A high-quality English prompt to generate an aesthetic book cover photo. Must explicitly state to display the book cover clearly in the center or as the hero object. Style it artistically (e.g. soft lighting, on a wooden desk, with coffee, or a modern minimalist background).\"\n\
}}\n",
                title = book.title,
                author = book.author,
            ),
        ),
        ContentType::ReelsScript => (
            "You are a viral content creator specializing in short-form video content.\n".to_owned(),
            format!(
                "Create a 30-second Instagram Reels Script for the book: \"{title}\" by {author}.\n\
{visual_context}\n\
Divide the script into {MIN_SCENES}-{MAX_SCENES} distinct scenes.\n\
\n\
Return a JSON object with:\n\
{{\n\
  \"scenes\": [\n\
    {{\n\
      \"sceneNumber\": 1,\n\
      \"timeRange\": \"0-5s\",\n\
      \"visualDescription\": \"Detailed description in Korean\",\n\
      \"audioScript\": \"The voiceover text in Korean\",\n\
      \"imagePrompt\": \"A high-quality English prompt to generate an image for this scene. If the scene mentions the book, include the book cover prominently.\"\n\
    }}\n\
  ]\n\
}}\n",
                title = book.title,
                author = book.author,
            ),
        ),
    }
}
