use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app::AppState;
use crate::app::session_store::SessionEntry;
use crate::model::{AspectRatio, BestsellerResult, Book, BookId, ContentType, GeneratedContent};
use crate::services;
use crate::session::{ImagePayload, ImageUpdate, Session, SessionState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/bestsellers", get(get_bestsellers))
        .route("/api/generate-content", post(generate_content))
        .route("/api/generate-image", post(generate_image))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/search", post(search))
        .route("/api/sessions/:id/generate", post(generate))
        .route("/api/sessions/:id/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>, message: Option<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            message,
        }),
    )
}

fn session_not_found(id: &Uuid) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Session not found", Some(id.to_string()))
}

fn conflict(err: anyhow::Error) -> ApiError {
    api_error(StatusCode::CONFLICT, "Invalid session state", Some(format!("{err:#}")))
}

#[derive(Debug, Default, Deserialize)]
struct DateQuery {
    /// Calendar date for the daily cache; defaults to the local date.
    date: Option<NaiveDate>,
}

impl DateQuery {
    fn today(&self) -> NaiveDate {
        self.date.unwrap_or_else(services::today)
    }
}

async fn get_bestsellers(
    State(state): State<AppState>,
    Query(q): Query<DateQuery>,
) -> Json<BestsellerResult> {
    Json(state.services.bestsellers(q.today()).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    book: Book,
    content_type: ContentType,
}

async fn generate_content(
    State(state): State<AppState>,
    Json(req): Json<GenerateContentRequest>,
) -> Result<Json<GeneratedContent>, ApiError> {
    state
        .services
        .content
        .generate(&req.book, req.content_type)
        .await
        .map(Json)
        .map_err(|err| {
            tracing::error!(content_type = %req.content_type, "generation failed: {err:#}");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate content",
                Some(format!("{err:#}")),
            )
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageRequest {
    prompt: String,
    #[serde(default)]
    reference_image_url: Option<String>,
    #[serde(default)]
    book_title: Option<String>,
    #[serde(default)]
    aspect_ratio: AspectRatio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageResponse {
    image_url: String,
}

async fn generate_image(
    State(state): State<AppState>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "prompt is required", None));
    }

    let image_url = state
        .services
        .images
        .generate(
            &req.prompt,
            req.reference_image_url.as_deref(),
            req.aspect_ratio,
            req.book_title.as_deref(),
        )
        .await
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "No image generated", None))?;
    Ok(Json(GenerateImageResponse { image_url }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub session: Session,
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let (session_id, session) = state.sessions.create();
    tracing::info!(%session_id, "session created");
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            session,
        }),
    )
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(&id).ok_or_else(|| session_not_found(&id))?;
    Ok(Json(SessionResponse {
        session_id: id,
        session,
    }))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if !state.sessions.remove(&id) {
        return StatusCode::NOT_FOUND;
    }
    tracing::info!(session_id = %id, "session deleted");
    StatusCode::NO_CONTENT
}

async fn search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<DateQuery>,
) -> Result<Json<SessionResponse>, ApiError> {
    state
        .sessions
        .with_entry(&id, |entry| entry.session.begin_search())
        .ok_or_else(|| session_not_found(&id))?
        .map_err(conflict)?;

    let today = q.today();
    tracing::info!(session_id = %id, %today, "searching bestsellers");
    let result = state.services.bestsellers(today).await;

    let session = state
        .sessions
        .with_entry(&id, |entry| -> anyhow::Result<Session> {
            entry.session.finish_search(result)?;
            Ok(entry.session.clone())
        })
        .ok_or_else(|| session_not_found(&id))?
        .map_err(conflict)?;
    Ok(Json(SessionResponse {
        session_id: id,
        session,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionGenerateRequest {
    book_id: BookId,
    #[serde(rename = "type")]
    content_type: ContentType,
}

async fn generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SessionGenerateRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (book, generation) = state
        .sessions
        .with_entry(&id, |entry| begin_generation(entry, &req))
        .ok_or_else(|| session_not_found(&id))??;

    let content = match state.services.content.generate(&book, req.content_type).await {
        Ok(content) => content,
        Err(err) => {
            tracing::error!(session_id = %id, content_type = %req.content_type, "generation failed: {err:#}");
            let message = format!("{err:#}");
            let recorded = state
                .sessions
                .with_entry(&id, |entry| entry.session.fail_generation(generation, message.clone()));
            if let Some(Err(stale)) = recorded {
                tracing::debug!(session_id = %id, "generation failure not recorded: {stale:#}");
            }
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate content",
                Some(message),
            ));
        }
    };

    let images_pending = has_image_work(&content);
    let session = state
        .sessions
        .with_entry(&id, |entry| -> anyhow::Result<Session> {
            entry
                .session
                .finish_generation(generation, content.clone(), images_pending)?;
            if images_pending {
                entry.image_job = Some(spawn_image_job(&state, id, generation, book, content));
            }
            Ok(entry.session.clone())
        })
        .ok_or_else(|| session_not_found(&id))?
        .map_err(conflict)?;

    Ok(Json(SessionResponse {
        session_id: id,
        session,
    }))
}

fn begin_generation(
    entry: &mut SessionEntry,
    req: &SessionGenerateRequest,
) -> Result<(Book, u64), ApiError> {
    if entry.session.state() != SessionState::Selecting {
        return Err(conflict(anyhow::anyhow!(
            "cannot generate while session is {:?}",
            entry.session.state()
        )));
    }
    if !entry.session.books().iter().any(|book| book.id() == req.book_id) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "Book not found",
            Some(req.book_id.to_string()),
        ));
    }
    entry.abort_image_job();
    entry.session.select_book(&req.book_id).map_err(conflict)?;
    entry
        .session
        .begin_generation(req.content_type)
        .map_err(conflict)
}

fn has_image_work(content: &GeneratedContent) -> bool {
    match content.content_type {
        ContentType::InstagramPost => content.image_prompt.is_some(),
        ContentType::ReelsScript => content.scenes.as_ref().is_some_and(|s| !s.is_empty()),
    }
}

fn spawn_image_job(
    state: &AppState,
    session_id: Uuid,
    generation: u64,
    book: Book,
    content: GeneratedContent,
) -> tokio::task::AbortHandle {
    let services = Arc::clone(&state.services);
    let updates = state.image_updates();
    state.queue.spawn(async move {
        let content = services.attach_images(&book, content).await;
        let payload = match content.content_type {
            ContentType::InstagramPost => ImagePayload::Post(content.image_url),
            ContentType::ReelsScript => ImagePayload::Scenes(content.scenes.unwrap_or_default()),
        };
        if updates
            .send((session_id, ImageUpdate { generation, payload }))
            .is_err()
        {
            tracing::warn!(%session_id, "image update channel closed");
        }
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ResetMode {
    /// Back to book selection, keeping the fetched list.
    Soft,
    #[default]
    Full,
}

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    #[serde(default)]
    mode: ResetMode,
}

async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<ResetRequest>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mode = req.map(|Json(req)| req.mode).unwrap_or_default();
    let session = state
        .sessions
        .with_entry(&id, |entry| -> anyhow::Result<Session> {
            match mode {
                ResetMode::Soft => entry.session.soft_reset()?,
                ResetMode::Full => entry.session.full_reset(),
            }
            entry.abort_image_job();
            Ok(entry.session.clone())
        })
        .ok_or_else(|| session_not_found(&id))?
        .map_err(conflict)?;
    tracing::info!(session_id = %id, ?mode, "session reset");

    Ok(Json(SessionResponse {
        session_id: id,
        session,
    }))
}
