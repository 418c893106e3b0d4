use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::session::{ImageUpdate, Session};

#[derive(Debug, Default)]
pub struct SessionEntry {
    pub session: Session,
    /// Background image job of the current generation, if any.
    pub image_job: Option<AbortHandle>,
}

impl SessionEntry {
    pub fn abort_image_job(&mut self) {
        if let Some(handle) = self.image_job.take() {
            handle.abort();
        }
    }
}

/// In-memory sessions. Every access happens under one short-lived lock and
/// never across an `.await`.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> (Uuid, Session) {
        let id = Uuid::new_v4();
        let entry = SessionEntry::default();
        let session = entry.session.clone();
        self.lock().insert(id, entry);
        (id, session)
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.lock().get(id).map(|entry| entry.session.clone())
    }

    /// Drops the session and aborts its image job. Returns whether it existed.
    pub fn remove(&self, id: &Uuid) -> bool {
        let Some(mut entry) = self.lock().remove(id) else {
            return false;
        };
        entry.abort_image_job();
        true
    }

    /// Runs `f` on the entry. Returns `None` when the session does not exist.
    pub fn with_entry<R>(&self, id: &Uuid, f: impl FnOnce(&mut SessionEntry) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    /// Applies a background image result; returns whether it was accepted.
    pub fn apply_image_update(&self, id: &Uuid, update: ImageUpdate) -> bool {
        self.with_entry(id, |entry| {
            let generation = update.generation;
            let applied = entry.session.apply_image_update(update);
            if applied {
                entry.image_job = None;
            } else {
                tracing::debug!(session_id = %id, generation, "discarded stale image update");
            }
            applied
        })
        .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
