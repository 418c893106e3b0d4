use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::AbortHandle;

/// Background image jobs, bounded by a semaphore.
#[derive(Debug, Clone)]
pub struct InProcessQueue {
    semaphore: Arc<Semaphore>,
}

impl InProcessQueue {
    pub fn new(max_concurrency: usize) -> Self {
        let permits = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Spawns `fut` once a permit is free. Aborting the returned handle drops
    /// the job whether it is still waiting or already running.
    pub fn spawn<F>(&self, fut: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                tracing::warn!("image queue closed; dropping job");
                return;
            };
            fut.await;
        })
        .abort_handle()
    }
}
