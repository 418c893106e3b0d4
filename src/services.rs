use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::bestseller::{AladinSource, BestsellerProvider};
use crate::config::Config;
use crate::content::{ContentGenerator, OpenAiTextModel};
use crate::daily_cache::{CacheStore, DailyCache, LocalFsCacheStore};
use crate::image::{GeminiImageModel, ImageGenerator};
use crate::model::{BestsellerResult, Book, ContentType, GeneratedContent, ImageTarget, merge_image};
use crate::scenes::SceneBatchGenerator;

/// Everything a front-end needs, wired from [`Config`].
pub struct Services {
    pub bestsellers: BestsellerProvider,
    pub cache: DailyCache,
    pub content: ContentGenerator,
    pub images: ImageGenerator,
    pub scenes: SceneBatchGenerator,
}

impl Services {
    pub fn from_config(config: &Config, cache_dir: &Path) -> anyhow::Result<Self> {
        let client = config.http_client()?;
        let store: Arc<dyn CacheStore> = Arc::new(LocalFsCacheStore::new(cache_dir));

        let images = ImageGenerator::new(
            client.clone(),
            Arc::new(GeminiImageModel::new(client.clone(), &config.gemini)),
        );
        Ok(Self {
            bestsellers: BestsellerProvider::new(AladinSource::new(
                client.clone(),
                config.aladin.clone(),
            )),
            cache: DailyCache::new(store),
            content: ContentGenerator::new(Arc::new(OpenAiTextModel::new(
                client,
                config.openai.clone(),
            ))),
            scenes: SceneBatchGenerator::new(images.clone()),
            images,
        })
    }

    pub async fn bestsellers(&self, today: NaiveDate) -> BestsellerResult {
        self.cache
            .get_or_fetch(today, || self.bestsellers.fetch())
            .await
    }

    /// Fills in the images of freshly generated content. Never fails; images
    /// that could not be generated stay unset.
    pub async fn attach_images(&self, book: &Book, content: GeneratedContent) -> GeneratedContent {
        let reference = book.cover_url.as_deref();
        match content.content_type {
            ContentType::InstagramPost => {
                let Some(prompt) = content.image_prompt.clone() else {
                    return content;
                };
                let url = self
                    .images
                    .generate(
                        &prompt,
                        reference,
                        ContentType::InstagramPost.aspect_ratio(),
                        Some(&book.title),
                    )
                    .await;
                merge_image(content, ImageTarget::Post, url)
            }
            ContentType::ReelsScript => {
                let Some(scenes) = content.scenes.as_deref().filter(|s| !s.is_empty()) else {
                    return content;
                };
                let updated = self
                    .scenes
                    .generate_all(scenes, reference, Some(&book.title))
                    .await;
                GeneratedContent {
                    scenes: Some(updated),
                    ..content
                }
            }
        }
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
