use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Stable surrogate key for a [`Book`]; titles alone are not unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn for_book(title: &str, isbn: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"\n");
        hasher.update(isbn.unwrap_or_default().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..12].to_owned())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == 12 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub title: String,
    pub author: String,
    pub description: String,
    /// 1-based position in the list.
    pub rank: u32,
    /// Short genre tag.
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_description: Option<String>,
}

impl Book {
    pub fn id(&self) -> BookId {
        BookId::for_book(&self.title, self.isbn.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestsellerResult {
    pub books: Vec<Book>,
    pub source_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl BestsellerResult {
    pub fn find(&self, id: &BookId) -> Option<&Book> {
        self.books.iter().find(|book| &book.id() == id)
    }

    pub fn find_by_rank(&self, rank: u32) -> Option<&Book> {
        self.books.iter().find(|book| book.rank == rank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub scene_number: u32,
    /// Free-form display string, e.g. `0-5s`.
    pub time_range: String,
    pub visual_description: String,
    pub audio_script: String,
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[value(name = "instagram_post", alias = "post")]
    InstagramPost,
    #[value(name = "reels_script", alias = "reels")]
    ReelsScript,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InstagramPost => "instagram_post",
            Self::ReelsScript => "reels_script",
        }
    }

    /// Aspect ratio used for images accompanying this content type.
    pub fn aspect_ratio(self) -> AspectRatio {
        match self {
            Self::InstagramPost => AspectRatio::Square,
            Self::ReelsScript => AspectRatio::Vertical,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    #[value(name = "square", alias = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    #[value(name = "vertical", alias = "9:16")]
    Vertical,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Vertical => "9:16",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Flattened human-readable text.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenes: Option<Vec<Scene>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_cover_url: Option<String>,
}

/// Where an asynchronously generated image lands in a [`GeneratedContent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Post,
    /// 0-based position in `scenes`.
    Scene(usize),
}

/// Applies one image result to `content`.
///
/// `None` leaves the placeholder state untouched. For scenes only `image_url`
/// of the addressed index changes; other indices are returned as they were.
pub fn merge_image(
    mut content: GeneratedContent,
    target: ImageTarget,
    image_url: Option<String>,
) -> GeneratedContent {
    let Some(image_url) = image_url else {
        return content;
    };
    match target {
        ImageTarget::Post => content.image_url = Some(image_url),
        ImageTarget::Scene(index) => {
            if let Some(scene) = content
                .scenes
                .as_mut()
                .and_then(|scenes| scenes.get_mut(index))
            {
                scene.image_url = Some(image_url);
            }
        }
    }
    content
}
