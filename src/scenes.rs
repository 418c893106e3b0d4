use std::sync::Arc;

use tokio::task::JoinSet;

use crate::image::ImageGenerator;
use crate::model::{AspectRatio, Scene};

#[derive(Clone)]
pub struct SceneBatchGenerator {
    images: ImageGenerator,
}

impl SceneBatchGenerator {
    pub fn new(images: ImageGenerator) -> Self {
        Self { images }
    }

    /// Generates one vertical image per scene and returns the scenes in input
    /// order. A failed scene comes back exactly as it went in.
    ///
    /// The reference image is fetched once and shared by every scene task.
    /// Returns only after every task has settled.
    pub async fn generate_all(
        &self,
        scenes: &[Scene],
        reference_url: Option<&str>,
        subject: Option<&str>,
    ) -> Vec<Scene> {
        if scenes.is_empty() {
            return Vec::new();
        }

        let reference = match reference_url {
            Some(url) => self.images.fetch_reference(url).await.map(Arc::new),
            None => None,
        };
        let subject: Option<Arc<str>> = subject.map(Arc::from);

        let mut join_set = JoinSet::new();
        for (index, scene) in scenes.iter().enumerate() {
            let images = self.images.clone();
            let reference = reference.clone();
            let subject = subject.clone();
            let prompt = scene.image_prompt.clone();
            let scene_number = scene.scene_number;
            join_set.spawn(async move {
                let url = images
                    .generate_with_reference(
                        &prompt,
                        reference.as_deref(),
                        AspectRatio::Vertical,
                        subject.as_deref(),
                    )
                    .await;
                if url.is_none() {
                    tracing::warn!(scene = scene_number, "failed to generate scene image");
                }
                (index, url)
            });
        }

        let mut updated = scenes.to_vec();
        let mut generated = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Some(url))) => {
                    updated[index].image_url = Some(url);
                    generated += 1;
                }
                Ok((_, None)) => {}
                Err(err) => tracing::warn!(?err, "scene image task did not complete"),
            }
        }

        tracing::info!(scenes = scenes.len(), generated, "scene image batch finished");
        updated
    }
}
