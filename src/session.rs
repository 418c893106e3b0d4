use serde::{Deserialize, Serialize};

use crate::model::{
    BestsellerResult, Book, BookId, ContentType, GeneratedContent, ImageTarget, Scene, merge_image,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Searching,
    Selecting,
    Generating,
    Result,
    Error,
}

/// Image results produced after the session reached [`SessionState::Result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Post(Option<String>),
    /// Whole batch, delivered once every scene has settled.
    Scenes(Vec<Scene>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpdate {
    pub generation: u64,
    pub payload: ImagePayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    state: SessionState,
    books: Vec<Book>,
    source_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<BookId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<GeneratedContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    images_pending: bool,
    /// Bumped whenever in-flight work must be ignored.
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            books: Vec::new(),
            source_urls: Vec::new(),
            selected: None,
            result: None,
            error: None,
            images_pending: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn result(&self) -> Option<&GeneratedContent> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn images_pending(&self) -> bool {
        self.images_pending
    }

    pub fn selected_book(&self) -> Option<&Book> {
        let id = self.selected.as_ref()?;
        self.books.iter().find(|book| &book.id() == id)
    }

    fn expect_state(&self, allowed: &[SessionState], action: &str) -> anyhow::Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            anyhow::bail!("cannot {action} while session is {:?}", self.state)
        }
    }

    pub fn begin_search(&mut self) -> anyhow::Result<()> {
        self.expect_state(&[SessionState::Idle], "search")?;
        self.state = SessionState::Searching;
        self.error = None;
        Ok(())
    }

    pub fn finish_search(&mut self, result: BestsellerResult) -> anyhow::Result<()> {
        self.expect_state(&[SessionState::Searching], "finish search")?;
        self.books = result.books;
        self.source_urls = result.source_urls;
        self.state = SessionState::Selecting;
        Ok(())
    }

    pub fn fail_search(&mut self, message: impl Into<String>) -> anyhow::Result<()> {
        self.expect_state(&[SessionState::Searching], "fail search")?;
        self.error = Some(message.into());
        self.state = SessionState::Error;
        Ok(())
    }

    pub fn select_book(&mut self, id: &BookId) -> anyhow::Result<&Book> {
        self.expect_state(&[SessionState::Selecting], "select a book")?;
        let Some(index) = self.books.iter().position(|book| &book.id() == id) else {
            anyhow::bail!("unknown book: {id}");
        };
        self.selected = Some(id.clone());
        Ok(&self.books[index])
    }

    /// Moves to `Generating` and returns the book plus the generation token
    /// that later updates must carry.
    pub fn begin_generation(&mut self, content_type: ContentType) -> anyhow::Result<(Book, u64)> {
        self.expect_state(&[SessionState::Selecting], "generate")?;
        let book = self
            .selected_book()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no book selected"))?;
        self.generation += 1;
        self.state = SessionState::Generating;
        self.result = None;
        self.images_pending = false;
        tracing::debug!(content_type = %content_type, generation = self.generation, "begin generation");
        Ok((book, self.generation))
    }

    pub fn finish_generation(
        &mut self,
        generation: u64,
        content: GeneratedContent,
        images_pending: bool,
    ) -> anyhow::Result<()> {
        self.expect_state(&[SessionState::Generating], "finish generation")?;
        if generation != self.generation {
            anyhow::bail!("stale generation {generation}");
        }
        self.result = Some(content);
        self.images_pending = images_pending;
        self.state = SessionState::Result;
        Ok(())
    }

    pub fn fail_generation(
        &mut self,
        generation: u64,
        message: impl Into<String>,
    ) -> anyhow::Result<()> {
        self.expect_state(&[SessionState::Generating], "fail generation")?;
        if generation != self.generation {
            anyhow::bail!("stale generation {generation}");
        }
        self.error = Some(message.into());
        self.state = SessionState::Error;
        Ok(())
    }

    /// Applies a background image result. Returns `false` when the update is
    /// stale (a reset happened since it was started) and was discarded.
    pub fn apply_image_update(&mut self, update: ImageUpdate) -> bool {
        if update.generation != self.generation || self.state != SessionState::Result {
            return false;
        }
        let Some(current) = self.result.take() else {
            return false;
        };

        let merged = match update.payload {
            ImagePayload::Post(url) => merge_image(current, ImageTarget::Post, url),
            ImagePayload::Scenes(scenes) => scenes
                .into_iter()
                .enumerate()
                .fold(current, |content, (index, scene)| {
                    merge_image(content, ImageTarget::Scene(index), scene.image_url)
                }),
        };
        self.result = Some(merged);
        self.images_pending = false;
        true
    }

    /// Back to `Selecting`, keeping the fetched list.
    pub fn soft_reset(&mut self) -> anyhow::Result<()> {
        self.expect_state(&[SessionState::Result], "return to selection")?;
        self.generation += 1;
        self.result = None;
        self.images_pending = false;
        self.state = SessionState::Selecting;
        Ok(())
    }

    pub fn full_reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new();
        self.generation = generation;
    }
}
