pub mod queue;
pub mod routes;
pub mod session_store;

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::services::Services;
use crate::session::ImageUpdate;

use self::queue::InProcessQueue;
use self::session_store::SessionStore;

pub use self::routes::router;

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub sessions: Arc<SessionStore>,
    pub queue: InProcessQueue,
    updates: mpsc::UnboundedSender<(Uuid, ImageUpdate)>,
}

impl AppState {
    /// Must be called inside a tokio runtime: spawns the task that applies
    /// background image results to their sessions.
    pub fn new(services: Services, max_concurrency: usize) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let (updates, rx) = mpsc::unbounded_channel();
        tokio::spawn(apply_image_updates(Arc::clone(&sessions), rx));

        Self {
            services: Arc::new(services),
            sessions,
            queue: InProcessQueue::new(max_concurrency),
            updates,
        }
    }

    pub(crate) fn image_updates(&self) -> mpsc::UnboundedSender<(Uuid, ImageUpdate)> {
        self.updates.clone()
    }
}

async fn apply_image_updates(
    sessions: Arc<SessionStore>,
    mut rx: mpsc::UnboundedReceiver<(Uuid, ImageUpdate)>,
) {
    while let Some((session_id, update)) = rx.recv().await {
        if sessions.apply_image_update(&session_id, update) {
            tracing::info!(%session_id, "images applied");
        }
    }
}
